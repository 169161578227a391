//! Runs long-lived processes side by side and shuts them down together.
//!
//! - processes run concurrently until one fails or SIGTERM/SIGINT arrives
//! - on cancellation the remaining processes get a grace period to return
//! - closers run afterwards, whatever the outcome, bounded by a timeout
//!
//! # Example
//!
//! ```no_run
//! use runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Runner::new()
//!         .with_app_process(|ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Cleaning up resources");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A process takes the shared cancellation token and runs until it is cancelled
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Cleanup step executed once all processes have stopped
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    shutdown_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Closer timeout and shutdown grace period both default to 10 seconds
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = format!("process_{}", self.app_processes.len());
        self.with_named_process(name, Box::new(|token| Box::pin(process(token))))
    }

    /// Register an already boxed process under a name used in logs
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push((name.into(), process));
        self
    }

    /// Closers run after every process has stopped; one failing does not stop the others
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// How long cancelled processes may keep running before they are aborted
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Use an externally owned token, e.g. to stop the runner from a test
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run until a process fails or a shutdown signal arrives, then run the closers.
    ///
    /// Returns the first process error, if any. Closer failures are logged only.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                debug!(process = %name, "Starting app process");
                (name, process(process_token).await)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut first_error = None;
        loop {
            let result = tokio::select! {
                _ = token.cancelled() => break,
                next = join_set.join_next() => match next {
                    Some(result) => result,
                    None => break,
                },
            };

            match result {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "App process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        error!(process = %name, error = %format!("{:#}", err), "App process failed");
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!(error = %err, "App process panicked");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("app process panicked: {}", err));
                    }
                    token.cancel();
                }
            }
        }

        if !join_set.is_empty() {
            debug!(remaining = join_set.len(), "Waiting for app processes to stop");
            let drained = tokio::time::timeout(self.shutdown_timeout, drain(&mut join_set)).await;
            if drained.is_err() {
                error!(
                    timeout = ?self.shutdown_timeout,
                    remaining = join_set.len(),
                    "App processes did not stop in time, aborting"
                );
                join_set.shutdown().await;
            }
        }

        if !self.closers.is_empty() {
            info!(timeout = ?self.closer_timeout, "Running closers");
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => info!("All closers completed"),
                Err(_) => error!(timeout = ?self.closer_timeout, "Closers timed out"),
            }
        }

        match first_error {
            Some(err) => {
                error!(error = %format!("{:#}", err), "Application exiting with error");
                Err(err)
            }
            None => {
                info!("Application exiting normally");
                Ok(())
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "Failed to listen for ctrl-c"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => error!(error = %err, "Failed to set up SIGTERM handler"),
        }
    });
}

async fn drain(join_set: &mut JoinSet<(String, anyhow::Result<()>)>) {
    while let Some(result) = join_set.join_next().await {
        match result {
            Ok((name, Ok(()))) => debug!(process = %name, "App process stopped"),
            Ok((name, Err(err))) => error!(
                process = %name,
                error = %format!("{:#}", err),
                "App process failed during shutdown"
            ),
            Err(err) => error!(error = %err, "App process panicked during shutdown"),
        }
    }
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(async move { closer().await });
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => debug!("Closer completed"),
            Ok(Err(err)) => error!(error = %format!("{:#}", err), "Closer failed"),
            Err(err) => error!(error = %err, "Closer panicked"),
        }
    }
}
