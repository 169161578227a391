use crate::nats::traits::{JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, Message};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of processing a batch, by message index
#[derive(Debug, Default, PartialEq)]
pub struct ProcessingResult {
    /// Indices to acknowledge
    pub ack: Vec<usize>,
    /// Indices to reject for redelivery, with optional error details
    pub nak: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            nak: Vec::new(),
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            nak: (0..count).map(|i| (i, error.clone())).collect(),
        }
    }

    pub fn new(ack: Vec<usize>, nak: Vec<(usize, Option<String>)>) -> Self {
        Self { ack, nak }
    }
}

/// Batch processor: decodes the raw messages and returns which to ack/nak.
/// Decoding happens synchronously while the slice is borrowed.
pub type BatchProcessor =
    Box<dyn Fn(&[Message]) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Durable JetStream pull consumer driving a [`BatchProcessor`]
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    stream_name: String,
    consumer_name: String,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let config = jetstream::consumer::pull::Config {
            name: Some(consumer_name.to_string()),
            durable_name: Some(consumer_name.to_string()),
            filter_subject: subject_filter.to_string(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            stream_name: stream_name.to_string(),
            consumer_name: consumer_name.to_string(),
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.stream_name,
            consumer = %self.consumer_name,
            "Starting consumer loop"
        );

        // A started batch always runs to completion; the fetch itself is bounded by max_wait
        while !ctx.is_cancelled() {
            if let Err(e) = self.fetch_and_process_batch().await {
                error!(consumer = %self.consumer_name, error = %e, "Error processing batch");
                tokio::select! {
                    _ = ctx.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
        info!(consumer = %self.consumer_name, "Received shutdown signal, stopping consumer");

        info!(consumer = %self.consumer_name, "Consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        debug!(
            batch_size = self.batch_size,
            max_wait_secs = self.max_wait.as_secs(),
            "Fetching message batch"
        );

        let raw_messages = self
            .consumer
            .fetch_messages(self.batch_size, self.max_wait)
            .await?;

        if raw_messages.is_empty() {
            debug!("No messages in batch");
            return Ok(());
        }

        debug!(message_count = raw_messages.len(), "Received message batch");

        let processing_result = match (self.processor)(&raw_messages).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Processor returned error, rejecting all messages");
                ProcessingResult::nak_all(raw_messages.len(), Some(e.to_string()))
            }
        };

        let ack_count = processing_result.ack.len();
        for idx in processing_result.ack {
            match raw_messages.get(idx) {
                Some(msg) => {
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, message_index = idx, "Failed to acknowledge message");
                    }
                }
                None => warn!(
                    message_index = idx,
                    batch_size = raw_messages.len(),
                    "Invalid ack index in ProcessingResult"
                ),
            }
        }
        if ack_count > 0 {
            debug!(ack_count, "Acknowledged messages");
        }

        let nak_count = processing_result.nak.len();
        for (idx, error_msg) in processing_result.nak {
            let Some(msg) = raw_messages.get(idx) else {
                warn!(
                    message_index = idx,
                    batch_size = raw_messages.len(),
                    "Invalid nak index in ProcessingResult"
                );
                continue;
            };

            match error_msg {
                Some(err) => error!(
                    message_index = idx,
                    subject = %msg.subject,
                    error = %err,
                    "Rejecting message due to processing error"
                ),
                None => warn!(message_index = idx, subject = %msg.subject, "Rejecting message"),
            }

            if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                error!(error = %e, message_index = idx, "Failed to reject message");
            }
        }
        if nak_count > 0 {
            debug!(nak_count, "Rejected messages for redelivery");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::traits::{MockJetStreamConsumer, MockPullConsumer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_processor(calls: Arc<AtomicUsize>) -> BatchProcessor {
        Box::new(move |messages: &[Message]| {
            calls.fetch_add(1, Ordering::SeqCst);
            let count = messages.len();
            Box::pin(async move { Ok(ProcessingResult::ack_all(count)) })
        })
    }

    #[test]
    fn test_processing_result_constructors() {
        assert_eq!(ProcessingResult::ack_all(3).ack, vec![0, 1, 2]);

        let nak = ProcessingResult::nak_all(2, Some("boom".to_string()));
        assert!(nak.ack.is_empty());
        assert_eq!(
            nak.nak,
            vec![(0, Some("boom".to_string())), (1, Some("boom".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_consumer_creation_uses_durable_explicit_ack_config() {
        let mut mock_jetstream = MockJetStreamConsumer::new();
        mock_jetstream
            .expect_create_consumer()
            .withf(
                |config: &jetstream::consumer::pull::Config, stream_name: &str| {
                    config.durable_name.as_deref() == Some("alarm-worker")
                    && config.filter_subject == "sensor_readings.>"
                    && matches!(config.ack_policy, jetstream::consumer::AckPolicy::Explicit)
                    && stream_name == "sensor_readings"
                },
            )
            .times(1)
            .returning(|_, _| Ok(Box::new(MockPullConsumer::new())));

        let result = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            10,
            5,
            counting_processor(Arc::new(AtomicUsize::new(0))),
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_consumer_creation_failure() {
        let mut mock_jetstream = MockJetStreamConsumer::new();
        mock_jetstream
            .expect_create_consumer()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("stream not found")));

        let result = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            10,
            5,
            counting_processor(Arc::new(AtomicUsize::new(0))),
        )
        .await;

        let err = result.err().unwrap();
        assert!(err.to_string().contains("Failed to create consumer"));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_processor() {
        let mut mock_jetstream = MockJetStreamConsumer::new();
        mock_jetstream
            .expect_create_consumer()
            .times(1)
            .returning(|_, _| {
                let mut pull = MockPullConsumer::new();
                pull.expect_fetch_messages()
                    .withf(|max, expires| *max == 25 && *expires == Duration::from_secs(2))
                    .times(1)
                    .returning(|_, _| Ok(vec![]));
                Ok(Box::new(pull))
            });

        let calls = Arc::new(AtomicUsize::new(0));
        let consumer = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            25,
            2,
            counting_processor(calls.clone()),
        )
        .await
        .unwrap();

        consumer.fetch_and_process_batch().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let mut mock_jetstream = MockJetStreamConsumer::new();
        mock_jetstream.expect_create_consumer().returning(|_, _| {
            let mut pull = MockPullConsumer::new();
            pull.expect_fetch_messages()
                .returning(|_, _| Err(anyhow::anyhow!("connection reset")));
            Ok(Box::new(pull))
        });

        let consumer = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            10,
            1,
            counting_processor(Arc::new(AtomicUsize::new(0))),
        )
        .await
        .unwrap();

        assert!(consumer.fetch_and_process_batch().await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let mut mock_jetstream = MockJetStreamConsumer::new();
        mock_jetstream.expect_create_consumer().returning(|_, _| {
            let mut pull = MockPullConsumer::new();
            pull.expect_fetch_messages().returning(|_, _| Ok(vec![]));
            Ok(Box::new(pull))
        });

        let consumer = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            10,
            1,
            counting_processor(Arc::new(AtomicUsize::new(0))),
        )
        .await
        .unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();
        assert!(consumer.run(ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_during_batch_finishes_it_then_stops() {
        let ctx = CancellationToken::new();
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut mock_jetstream = MockJetStreamConsumer::new();
        let token = ctx.clone();
        let counter = fetches.clone();
        mock_jetstream
            .expect_create_consumer()
            .returning(move |_, _| {
                let token = token.clone();
                let counter = counter.clone();
                let mut pull = MockPullConsumer::new();
                pull.expect_fetch_messages().times(1).returning(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    token.cancel();
                    Ok(vec![])
                });
                Ok(Box::new(pull))
            });

        let consumer = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            10,
            1,
            counting_processor(Arc::new(AtomicUsize::new(0))),
        )
        .await
        .unwrap();

        assert!(consumer.run(ctx).await.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_error_backoff() {
        let ctx = CancellationToken::new();

        let mut mock_jetstream = MockJetStreamConsumer::new();
        let token = ctx.clone();
        mock_jetstream
            .expect_create_consumer()
            .returning(move |_, _| {
                let token = token.clone();
                let mut pull = MockPullConsumer::new();
                pull.expect_fetch_messages().times(1).returning(move |_, _| {
                    token.cancel();
                    Err(anyhow::anyhow!("connection reset"))
                });
                Ok(Box::new(pull))
            });

        let consumer = NatsConsumer::new(
            Arc::new(mock_jetstream),
            "sensor_readings",
            "alarm-worker",
            "sensor_readings.>",
            10,
            1,
            counting_processor(Arc::new(AtomicUsize::new(0))),
        )
        .await
        .unwrap();

        let stopped = tokio::time::timeout(Duration::from_millis(500), consumer.run(ctx)).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }
}
