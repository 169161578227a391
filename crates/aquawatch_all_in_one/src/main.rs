mod config;

use alarm_worker::{AlarmWorker, AlarmWorkerConfig, TracingNotificationSender};
use common::memory::{DirectorySnapshot, InMemoryDirectoryRepository, InMemoryReadingRepository};
use common::nats::NatsClient;
use common::telemetry::{init_telemetry, TelemetryConfig};
use common::AlarmClassifier;
use crate::config::ServiceConfig;
use runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "aquawatch-all-in-one".to_string(),
        log_level: config.log_level.clone(),
        log_format: config.log_format,
    }) {
        eprintln!("Failed to initialize telemetry: {:#}", e);
        std::process::exit(1);
    }

    info!(nats_url = %config.nats_url, "Starting aquawatch-all-in-one service");
    debug!("Configuration: {:?}", config);

    let classifier = match config.load_thresholds() {
        Ok(thresholds) => Arc::new(AlarmClassifier::new(thresholds)),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to load threshold table");
            std::process::exit(1);
        }
    };

    let directory = match load_directory(&config) {
        Ok(snapshot) => Arc::new(InMemoryDirectoryRepository::new(snapshot)),
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to load directory snapshot");
            std::process::exit(1);
        }
    };
    let readings = Arc::new(InMemoryReadingRepository::with_max_per_device(
        config.max_readings_per_device,
    ));

    let nats_client = match initialize_nats(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to initialize NATS");
            std::process::exit(1);
        }
    };

    let alarm_worker = match AlarmWorker::new(
        readings,
        directory,
        Arc::new(TracingNotificationSender::new(config.mail_from.clone())),
        classifier,
        nats_client.create_consumer_client(),
        AlarmWorkerConfig {
            readings_stream: config.nats_readings_stream.clone(),
            readings_subject: config.nats_readings_subject.clone(),
            consumer_name: config.nats_consumer_name.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            notification_cooldown: config.notification_cooldown(),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to initialize alarm worker");
            std::process::exit(1);
        }
    };

    let runner = Runner::new()
        .with_named_process("alarm_worker", alarm_worker.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            nats_client.close().await;
            info!("Cleanup complete");
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    if runner.run().await.is_err() {
        std::process::exit(1);
    }
}

fn load_directory(config: &ServiceConfig) -> anyhow::Result<DirectorySnapshot> {
    match &config.directory_path {
        Some(path) => {
            info!(path = %path, "Loading directory snapshot");
            DirectorySnapshot::load(path)
        }
        None => {
            warn!("No directory snapshot configured, notifications will find no recipients");
            Ok(DirectorySnapshot::default())
        }
    }
}

async fn initialize_nats(config: &ServiceConfig) -> anyhow::Result<NatsClient> {
    info!("Initializing NATS...");
    let client = NatsClient::connect(&config.nats_url, config.startup_timeout()).await?;
    client
        .ensure_stream(&config.nats_readings_stream, &config.nats_readings_subject)
        .await?;
    Ok(client)
}
