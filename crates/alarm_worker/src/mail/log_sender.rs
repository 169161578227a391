use crate::mail::template::render_notification;
use async_trait::async_trait;
use common::domain::{DomainResult, NotificationRequest, NotificationSender};
use tracing::info;

/// Mail transport that writes rendered notifications to the log instead of
/// delivering them
pub struct TracingNotificationSender {
    from: String,
}

impl TracingNotificationSender {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl NotificationSender for TracingNotificationSender {
    async fn send_notification(&self, request: &NotificationRequest) -> DomainResult<()> {
        let email = render_notification(request);
        info!(
            from = %self.from,
            to = %request.recipient_email,
            subject = %email.subject,
            body = %email.body,
            device_id = %request.alarm.device_id,
            notification_type = %request.notification_type,
            "Notification email"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{NotificationType, Reading};
    use common::AlarmClassifier;

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = TracingNotificationSender::new("alarms@aquawatch.test");
        let request = NotificationRequest {
            recipient_email: "contact@acme.test".to_string(),
            alarm: AlarmClassifier::default().classify(&Reading::new("r-1", "dev-1", Utc::now())),
            location_name: "North Reservoir".to_string(),
            notification_type: NotificationType::AllClear,
        };
        assert!(sender.send_notification(&request).await.is_ok());
    }
}
