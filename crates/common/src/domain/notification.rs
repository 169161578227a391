use crate::domain::alarm::{ClassifiedAlarm, NotificationType};
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One outbound notification for one recipient
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub recipient_email: String,
    pub alarm: ClassifiedAlarm,
    pub location_name: String,
    pub notification_type: NotificationType,
}

/// Outbound mail transport collaborator. The core observes the result only for logging.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_notification(&self, request: &NotificationRequest) -> DomainResult<()>;
}

/// Last notified state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNotificationState {
    pub is_anomalous: bool,
    pub last_notified_at: DateTime<Utc>,
}

/// Store for per-device notification state
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationStateStore: Send + Sync {
    /// Get the recorded state for a device
    async fn get(&self, device_id: &str) -> DomainResult<Option<DeviceNotificationState>>;

    /// Insert or replace the recorded state for a device
    async fn put(&self, device_id: String, state: DeviceNotificationState) -> DomainResult<()>;
}
