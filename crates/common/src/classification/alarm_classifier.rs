use crate::classification::threshold_policy::{ChannelEvaluation, Finding, ThresholdTable, Tier};
use crate::domain::{AlarmType, Channel, ClassifiedAlarm, Reading, Severity};
use std::collections::BTreeSet;

const NORMAL_SUMMARY: &str = "All readings within normal range";
const UNCLASSIFIED_SUMMARY: &str = "Sensor reported an unclassified anomaly";

/// Turns a raw reading into a severity, a non-empty set of alarm types and a
/// human-readable message. Total over any reading shape.
#[derive(Debug, Clone, Default)]
pub struct AlarmClassifier {
    thresholds: ThresholdTable,
}

impl AlarmClassifier {
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self { thresholds }
    }

    /// Evaluate every channel present in the reading, in message priority order
    pub fn evaluate(&self, reading: &Reading) -> Vec<ChannelEvaluation> {
        reading
            .channels
            .iter()
            .map(|(channel, channel_reading)| self.thresholds.evaluate(*channel, channel_reading))
            .collect()
    }

    pub fn classify(&self, reading: &Reading) -> ClassifiedAlarm {
        let evaluations = self.evaluate(reading);
        let flagged: Vec<&ChannelEvaluation> =
            evaluations.iter().filter(|e| e.is_flagged()).collect();

        let severity = severity_for(flagged.iter().map(|e| e.tier).max());

        let mut alarm_types: BTreeSet<AlarmType> =
            flagged.iter().map(|e| AlarmType::from(e.channel)).collect();
        if alarm_types.is_empty() {
            alarm_types.insert(AlarmType::System);
        }

        let message = render_message(severity, &flagged, reading.explanation.as_deref());

        ClassifiedAlarm {
            reading_id: reading.id.clone(),
            device_id: reading.device_id.clone(),
            severity,
            alarm_types,
            message,
            is_anomalous: !flagged.is_empty(),
            recorded_at: reading.recorded_at,
            reading: reading.clone(),
        }
    }
}

fn severity_for(worst: Option<Tier>) -> Severity {
    match worst {
        Some(Tier::Critical) => Severity::Critical,
        Some(Tier::Warning) => Severity::Warning,
        Some(Tier::Info) => Severity::Info,
        Some(Tier::None) | None => Severity::Normal,
    }
}

fn render_message(
    severity: Severity,
    flagged: &[&ChannelEvaluation],
    explanation: Option<&str>,
) -> String {
    let clauses: Vec<String> = flagged
        .iter()
        .filter_map(|e| e.finding.as_ref().map(|f| clause(e.channel, f)))
        .collect();

    let summary = if !clauses.is_empty() {
        clauses.join("; ")
    } else if let Some(text) = explanation.map(str::trim).filter(|t| !t.is_empty()) {
        text.to_string()
    } else if severity == Severity::Normal {
        NORMAL_SUMMARY.to_string()
    } else {
        UNCLASSIFIED_SUMMARY.to_string()
    };

    format!("{} - {}", severity.prefix(), summary)
}

fn clause(channel: Channel, finding: &Finding) -> String {
    match finding {
        Finding::ZeroReading => format!("{} sensor fault: reading 0", capitalize(channel.label())),
        Finding::Low(value) => format!("Low {}: {}{}", channel.label(), value, channel.unit()),
        Finding::High(value) => format!("High {}: {}{}", channel.label(), value, channel.unit()),
        Finding::Status(status) if status.is_empty() => {
            format!("{} not reported", capitalize(channel.label()))
        }
        Finding::Status(status) => format!("{}: {}", capitalize(channel.label()), status),
    }
}

// "pH" stays as-is
fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() && label != "pH" => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => label.to_string(),
    }
}
