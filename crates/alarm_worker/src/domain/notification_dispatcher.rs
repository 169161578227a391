use common::domain::{
    ClassifiedAlarm, DirectoryRepository, NotificationRequest, NotificationSender,
    NotificationType, User,
};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No location is bound to the device
    NoLocation,
    /// Location resolved but it has no active contacts and no company admin
    NoRecipients,
    /// Directory lookup failed; nothing was sent
    DirectoryUnavailable,
    Delivered { attempted: usize, failed: usize },
}

/// Resolves recipients for a device and fans out one notification each.
/// Never fails: every problem is logged and reported in the outcome.
pub struct NotificationDispatcher {
    directory: Arc<dyn DirectoryRepository>,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self { directory, sender }
    }

    #[instrument(
        skip(self, alarm, notification_type),
        fields(
            device_id = %alarm.device_id,
            reading_id = %alarm.reading_id,
            notification_type = %notification_type
        )
    )]
    pub async fn dispatch(
        &self,
        alarm: &ClassifiedAlarm,
        notification_type: NotificationType,
    ) -> DispatchOutcome {
        let details = match self
            .directory
            .get_location_by_device_id(&alarm.device_id)
            .await
        {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!(
                    device_id = %alarm.device_id,
                    "No location bound to device, skipping notification"
                );
                return DispatchOutcome::NoLocation;
            }
            Err(e) => {
                error!(
                    device_id = %alarm.device_id,
                    error = %e,
                    "Failed to resolve location for device, skipping notification"
                );
                return DispatchOutcome::DirectoryUnavailable;
            }
        };

        let recipients = recipients(details.location_contacts(), details.company_admin());
        if recipients.is_empty() {
            warn!(
                location_id = %details.location.id,
                "Location has no notification recipients"
            );
            return DispatchOutcome::NoRecipients;
        }

        let requests: Vec<NotificationRequest> = recipients
            .iter()
            .map(|user| NotificationRequest {
                recipient_email: user.email.clone(),
                alarm: alarm.clone(),
                location_name: details.location.name.clone(),
                notification_type,
            })
            .collect();

        debug!(
            recipient_count = requests.len(),
            location_id = %details.location.id,
            "Sending notifications"
        );

        let results = join_all(
            requests
                .iter()
                .map(|request| self.sender.send_notification(request)),
        )
        .await;

        let mut failed = 0;
        for (request, result) in requests.iter().zip(results) {
            if let Err(e) = result {
                failed += 1;
                error!(
                    recipient = %request.recipient_email,
                    error = %e,
                    "Failed to send notification"
                );
            }
        }

        info!(
            attempted = requests.len(),
            failed,
            location = %details.location.name,
            "Notifications dispatched"
        );

        DispatchOutcome::Delivered {
            attempted: requests.len(),
            failed,
        }
    }
}

/// Location contacts plus the company admin, each user at most once
fn recipients<'a>(contacts: Vec<&'a User>, admin: Option<&'a User>) -> Vec<&'a User> {
    let mut seen = BTreeSet::new();
    contacts
        .into_iter()
        .chain(admin)
        .filter(|user| seen.insert(user.id.as_str()))
        .collect()
}
