use common::domain::{NotificationRequest, NotificationType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

/// Plain-text alarm email. Reminders sent after the cooldown use the same
/// template as the first notification for a state.
pub fn render_notification(request: &NotificationRequest) -> RenderedEmail {
    let alarm = &request.alarm;

    let subject = match request.notification_type {
        NotificationType::Alert => format!(
            "{} alarm at {}",
            alarm.severity.prefix(),
            request.location_name
        ),
        NotificationType::AllClear => format!("✅ All clear at {}", request.location_name),
    };

    let headline = match request.notification_type {
        NotificationType::Alert => "A new alarm has been triggered.",
        NotificationType::AllClear => "Readings have returned to normal.",
    };

    let types = alarm
        .alarm_types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let body = [
        headline.to_string(),
        String::new(),
        format!("Location:  {}", request.location_name),
        format!("Device:    {}", alarm.device_id),
        format!("Severity:  {}", alarm.severity),
        format!("Type:      {}", types),
        format!("Message:   {}", alarm.message),
        format!("Timestamp: {}", alarm.recorded_at.to_rfc3339()),
        String::new(),
        "Please check the monitoring dashboard for details.".to_string(),
    ]
    .join("\n");

    RenderedEmail { subject, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::domain::{Channel, ChannelReading, Reading};
    use common::AlarmClassifier;

    fn request(ntu: f64, notification_type: NotificationType) -> NotificationRequest {
        let reading = Reading::new(
            "r-1",
            "dev-1",
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        )
        .with_channel(Channel::Turbidity, ChannelReading::numeric(ntu));
        NotificationRequest {
            recipient_email: "contact@acme.test".to_string(),
            alarm: AlarmClassifier::default().classify(&reading),
            location_name: "North Reservoir".to_string(),
            notification_type,
        }
    }

    #[test]
    fn test_alert_email() {
        let email = render_notification(&request(250.0, NotificationType::Alert));

        assert_eq!(email.subject, "🔴 CRITICAL alarm at North Reservoir");
        assert!(email.body.starts_with("A new alarm has been triggered."));
        assert!(email.body.contains("Device:    dev-1"));
        assert!(email.body.contains("Type:      turbidity"));
        assert!(email.body.contains("High turbidity: 250 NTU"));
        assert!(email.body.contains("2025-06-01T12:00:00+00:00"));
    }

    #[test]
    fn test_all_clear_email() {
        let email = render_notification(&request(10.0, NotificationType::AllClear));

        assert_eq!(email.subject, "✅ All clear at North Reservoir");
        assert!(email.body.contains("Severity:  normal"));
    }
}
