use crate::domain::{
    DispatchOutcome, NotificationDecision, NotificationDeduplicator, NotificationDispatcher,
};
use chrono::{DateTime, Utc};
use common::domain::{ClassifiedAlarm, DomainResult, Reading, ReadingRepository};
use common::AlarmClassifier;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Result of evaluating one reading on the ingestion path
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub alarm: ClassifiedAlarm,
    /// `None` when the notification state could not be read or written
    pub decision: Option<NotificationDecision>,
    /// Present only when a notification was due
    pub dispatch: Option<DispatchOutcome>,
}

/// Entry point for newly persisted readings.
///
/// Flow:
/// 1. Classify the reading
/// 2. Ask the deduplicator whether to notify (state is recorded here)
/// 3. Dispatch ALERT or ALL_CLEAR to the location's recipients
pub struct ReadingIngestionService {
    reading_repository: Arc<dyn ReadingRepository>,
    classifier: Arc<AlarmClassifier>,
    deduplicator: Arc<NotificationDeduplicator>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ReadingIngestionService {
    pub fn new(
        reading_repository: Arc<dyn ReadingRepository>,
        classifier: Arc<AlarmClassifier>,
        deduplicator: Arc<NotificationDeduplicator>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            reading_repository,
            classifier,
            deduplicator,
            dispatcher,
        }
    }

    /// Persist then evaluate. Only the store can fail; evaluation never does.
    #[instrument(skip(self, reading), fields(reading_id = %reading.id, device_id = %reading.device_id))]
    pub async fn ingest_reading(&self, reading: Reading) -> DomainResult<IngestOutcome> {
        self.reading_repository.store_reading(reading.clone()).await?;
        Ok(self.on_new_reading(&reading).await)
    }

    pub async fn on_new_reading(&self, reading: &Reading) -> IngestOutcome {
        self.on_new_reading_at(reading, Utc::now()).await
    }

    /// Evaluate a reading as of `now`. Duplicate deliveries are evaluated independently.
    #[instrument(skip(self, reading), fields(reading_id = %reading.id, device_id = %reading.device_id))]
    pub async fn on_new_reading_at(&self, reading: &Reading, now: DateTime<Utc>) -> IngestOutcome {
        let alarm = self.classifier.classify(reading);

        debug!(
            severity = %alarm.severity,
            is_anomalous = alarm.is_anomalous,
            message = %alarm.message,
            "Classified reading"
        );

        let decision = match self
            .deduplicator
            .decide(&reading.device_id, alarm.is_anomalous, now)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, "Failed to update notification state, skipping notification");
                return IngestOutcome {
                    alarm,
                    decision: None,
                    dispatch: None,
                };
            }
        };

        let dispatch = match decision {
            NotificationDecision::Send(reason) => {
                let notification_type = alarm.notification_type();
                info!(
                    reason = ?reason,
                    notification_type = %notification_type,
                    severity = %alarm.severity,
                    "Notification due"
                );
                Some(self.dispatcher.dispatch(&alarm, notification_type).await)
            }
            NotificationDecision::Suppress => {
                debug!("Notification suppressed within cooldown");
                None
            }
        };

        IngestOutcome {
            alarm,
            decision: Some(decision),
            dispatch,
        }
    }
}
