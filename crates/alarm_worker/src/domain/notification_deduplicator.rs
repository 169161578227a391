use chrono::{DateTime, Utc};
use common::domain::{DeviceNotificationState, DomainResult, NotificationStateStore};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationReason {
    /// No state recorded for the device yet
    FirstReading,
    /// Anomalous/normal flipped since the last notification
    StateChanged,
    /// Same state, but the cooldown has passed since the last notification
    CooldownElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    Send(NotificationReason),
    Suppress,
}

impl NotificationDecision {
    pub fn should_send(&self) -> bool {
        matches!(self, NotificationDecision::Send(_))
    }
}

/// Per-device state machine deciding whether a classified reading notifies.
///
/// The read-modify-write of a device's state runs under that device's lock,
/// so concurrent readings for one device are serialized while different
/// devices proceed in parallel.
pub struct NotificationDeduplicator {
    store: Arc<dyn NotificationStateStore>,
    cooldown: Duration,
    device_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NotificationDeduplicator {
    pub fn new(store: Arc<dyn NotificationStateStore>, cooldown: Duration) -> Self {
        Self {
            store,
            cooldown,
            device_locks: DashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn device_lock(&self, device_id: &str) -> Arc<Mutex<()>> {
        self.device_locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Decide and, when sending, record `(is_anomalous, now)` before returning
    #[instrument(skip(self), fields(device_id = %device_id))]
    pub async fn decide(
        &self,
        device_id: &str,
        is_anomalous: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<NotificationDecision> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;

        let decision = match self.store.get(device_id).await? {
            None => NotificationDecision::Send(NotificationReason::FirstReading),
            Some(prev) if prev.is_anomalous != is_anomalous => {
                NotificationDecision::Send(NotificationReason::StateChanged)
            }
            Some(prev) if self.cooldown_elapsed(prev.last_notified_at, now) => {
                NotificationDecision::Send(NotificationReason::CooldownElapsed)
            }
            Some(_) => NotificationDecision::Suppress,
        };

        if decision.should_send() {
            self.store
                .put(
                    device_id.to_string(),
                    DeviceNotificationState {
                        is_anomalous,
                        last_notified_at: now,
                    },
                )
                .await?;
        }

        debug!(is_anomalous, decision = ?decision, "Notification decision");
        Ok(decision)
    }

    // strictly greater; a clock that went backwards never elapses
    fn cooldown_elapsed(&self, last_notified_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_notified_at)
            .to_std()
            .map(|elapsed| elapsed > self.cooldown)
            .unwrap_or(false)
    }
}
