use crate::domain::{
    InMemoryNotificationStateStore, NotificationDeduplicator, NotificationDispatcher,
    ReadingIngestionService,
};
use crate::nats::create_reading_processor;
use common::domain::{DirectoryRepository, NotificationSender, ReadingRepository};
use common::nats::{JetStreamConsumer, NatsConsumer};
use common::AlarmClassifier;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct AlarmWorkerConfig {
    pub readings_stream: String,
    pub readings_subject: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub notification_cooldown: Duration,
}

pub type RunnerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// Ingestion path: consumes sensor readings, classifies them, and notifies
pub struct AlarmWorker {
    consumer: NatsConsumer,
    ingestion_service: Arc<ReadingIngestionService>,
}

impl AlarmWorker {
    pub async fn new(
        reading_repository: Arc<dyn ReadingRepository>,
        directory_repository: Arc<dyn DirectoryRepository>,
        notification_sender: Arc<dyn NotificationSender>,
        classifier: Arc<AlarmClassifier>,
        jetstream: Arc<dyn JetStreamConsumer>,
        config: AlarmWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing alarm worker");

        let deduplicator = Arc::new(NotificationDeduplicator::new(
            Arc::new(InMemoryNotificationStateStore::new()),
            config.notification_cooldown,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            directory_repository,
            notification_sender,
        ));
        let ingestion_service = Arc::new(ReadingIngestionService::new(
            reading_repository,
            classifier,
            deduplicator,
            dispatcher,
        ));

        let consumer = NatsConsumer::new(
            jetstream,
            &config.readings_stream,
            &config.consumer_name,
            &config.readings_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            create_reading_processor(ingestion_service.clone()),
        )
        .await?;

        info!(
            cooldown_secs = config.notification_cooldown.as_secs(),
            "Alarm worker initialized"
        );

        Ok(Self {
            consumer,
            ingestion_service,
        })
    }

    /// Service behind the consumer, for ingestion paths other than NATS
    pub fn ingestion_service(&self) -> Arc<ReadingIngestionService> {
        self.ingestion_service.clone()
    }

    pub fn into_runner_process(self) -> RunnerProcess {
        let consumer = self.consumer;
        Box::new(move |ctx| Box::pin(async move { consumer.run(ctx).await }))
    }
}
