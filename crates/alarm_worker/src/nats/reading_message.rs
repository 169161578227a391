use chrono::{DateTime, Utc};
use common::domain::{Channel, ChannelReading, DomainError, DomainResult, Reading};
use serde::{Deserialize, Serialize};

/// JSON payload published by devices. A flat union of every sensor field any
/// firmware generation reports; absent fields contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingMessage {
    #[serde(default)]
    pub id: Option<String>,
    /// Falls back to the last subject token when absent
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub ph_status: Option<String>,
    #[serde(default)]
    pub turbidity_ntu: Option<f64>,
    #[serde(default)]
    pub turbidity_status: Option<String>,
    #[serde(default)]
    pub water_quality: Option<String>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ReadingMessage {
    pub fn from_json(payload: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| DomainError::InvalidReading(format!("Malformed reading payload: {}", e)))
    }

    /// Build the domain reading; ids are generated and timestamps default to `received_at`
    pub fn into_reading(self, subject: &str, received_at: DateTime<Utc>) -> DomainResult<Reading> {
        let device_id = self
            .device_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| device_id_from_subject(subject))
            .ok_or_else(|| {
                DomainError::InvalidReading(format!(
                    "No device id in payload or subject {}",
                    subject
                ))
            })?;

        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| xid::new().to_string());

        let mut reading = Reading::new(id, device_id, self.recorded_at.unwrap_or(received_at))
            .with_channel(Channel::Turbidity, channel(self.turbidity_ntu, self.turbidity_status))
            .with_channel(Channel::Voltage, channel(self.voltage, None))
            .with_channel(Channel::Ph, channel(self.ph, self.ph_status))
            .with_channel(Channel::Temperature, channel(self.temperature, None))
            .with_channel(Channel::WaterQuality, channel(None, self.water_quality))
            .with_channel(Channel::Condition, channel(None, self.condition));

        if let Some(explanation) = self.explanation {
            reading = reading.with_explanation(explanation);
        }

        Ok(reading)
    }
}

fn channel(value: Option<f64>, status: Option<String>) -> ChannelReading {
    ChannelReading { value, status }
}

// "sensor_readings.dev-1" -> "dev-1"
fn device_id_from_subject(subject: &str) -> Option<String> {
    subject
        .rsplit_once('.')
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty() && *token != "*" && *token != ">")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn received() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_combined_schema_maps_every_channel() {
        let payload = br#"{
            "id": "r-1",
            "device_id": "dev-1",
            "ph": 7.1, "ph_status": "VALID",
            "turbidity_ntu": 12.5, "turbidity_status": "CLEAN",
            "water_quality": "GOOD",
            "voltage": 3.3, "temperature": 24.0, "condition": "GOOD",
            "explanation": "steady",
            "recorded_at": "2025-05-31T08:00:00Z"
        }"#;

        let reading = ReadingMessage::from_json(payload)
            .unwrap()
            .into_reading("sensor_readings.dev-1", received())
            .unwrap();

        assert_eq!(reading.id, "r-1");
        assert_eq!(reading.channels.len(), 6);
        assert_eq!(reading.channel(Channel::Ph).unwrap().status.as_deref(), Some("VALID"));
        assert_eq!(reading.explanation.as_deref(), Some("steady"));
        assert_eq!(
            reading.recorded_at,
            Utc.with_ymd_and_hms(2025, 5, 31, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_partial_payload_uses_subject_and_defaults() {
        let reading = ReadingMessage::from_json(br#"{ "voltage": 1.2, "condition": "DIRTY" }"#)
            .unwrap()
            .into_reading("sensor_readings.dev-7", received())
            .unwrap();

        assert_eq!(reading.device_id, "dev-7");
        assert_eq!(reading.recorded_at, received());
        assert!(!reading.id.is_empty());
        assert_eq!(reading.channels.len(), 2);
        assert!(reading.channel(Channel::Ph).is_none());
    }

    #[test]
    fn test_missing_device_id_is_invalid() {
        let result = ReadingMessage::default().into_reading("sensor_readings", received());
        assert!(matches!(result, Err(DomainError::InvalidReading(_))));
    }

    #[test]
    fn test_malformed_json_is_invalid() {
        let result = ReadingMessage::from_json(b"{ ph: ");
        assert!(matches!(result, Err(DomainError::InvalidReading(_))));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let message = ReadingMessage {
            device_id: Some("dev-1".to_string()),
            ..Default::default()
        };
        let a = message.clone().into_reading("", received()).unwrap();
        let b = message.into_reading("", received()).unwrap();
        assert_ne!(a.id, b.id);
    }
}
