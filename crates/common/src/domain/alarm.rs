use crate::domain::reading::{Channel, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Ordered alarm severity; `Normal` is the all-clear state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Prefix rendered at the start of every alarm message
    pub fn prefix(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴 CRITICAL",
            Severity::Warning => "⚠️ WARNING",
            Severity::Info => "ℹ️ INFO",
            Severity::Normal => "✅ NORMAL",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Normal => "normal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag identifying which channel triggered a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmType {
    Turbidity,
    Voltage,
    Ph,
    Temperature,
    WaterQuality,
    Condition,
    System,
}

impl AlarmType {
    pub const ALL: [AlarmType; 7] = [
        AlarmType::Turbidity,
        AlarmType::Voltage,
        AlarmType::Ph,
        AlarmType::Temperature,
        AlarmType::WaterQuality,
        AlarmType::Condition,
        AlarmType::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmType::Turbidity => "turbidity",
            AlarmType::Voltage => "voltage",
            AlarmType::Ph => "ph",
            AlarmType::Temperature => "temperature",
            AlarmType::WaterQuality => "water_quality",
            AlarmType::Condition => "condition",
            AlarmType::System => "system",
        }
    }
}

impl From<Channel> for AlarmType {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Turbidity => AlarmType::Turbidity,
            Channel::Voltage => AlarmType::Voltage,
            Channel::Ph => AlarmType::Ph,
            Channel::Temperature => AlarmType::Temperature,
            Channel::WaterQuality => AlarmType::WaterQuality,
            Channel::Condition => AlarmType::Condition,
        }
    }
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived classification of a single reading. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedAlarm {
    pub reading_id: String,
    pub device_id: String,
    pub severity: Severity,
    /// Never empty; falls back to `AlarmType::System`
    pub alarm_types: BTreeSet<AlarmType>,
    pub message: String,
    pub is_anomalous: bool,
    pub recorded_at: DateTime<Utc>,
    pub reading: Reading,
}

impl ClassifiedAlarm {
    pub fn has_type(&self, alarm_type: AlarmType) -> bool {
        self.alarm_types.contains(&alarm_type)
    }

    pub fn notification_type(&self) -> NotificationType {
        NotificationType::for_anomaly(self.is_anomalous)
    }
}

/// Kind of notification sent downstream, independent of severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Alert,
    AllClear,
}

impl NotificationType {
    pub fn for_anomaly(is_anomalous: bool) -> Self {
        if is_anomalous {
            NotificationType::Alert
        } else {
            NotificationType::AllClear
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Alert => "ALERT",
            NotificationType::AllClear => "ALL_CLEAR",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-severity and per-type counts over a set of classified alarms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmStatistics {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub normal: usize,
    pub by_type: BTreeMap<AlarmType, usize>,
    pub latest: Option<ClassifiedAlarm>,
}

impl AlarmStatistics {
    /// Aggregate alarms; `alarms` is expected newest first so `latest` is the head
    pub fn from_alarms(alarms: &[ClassifiedAlarm]) -> Self {
        let count = |severity: Severity| alarms.iter().filter(|a| a.severity == severity).count();

        let by_type = AlarmType::ALL
            .iter()
            .map(|alarm_type| {
                let n = alarms.iter().filter(|a| a.has_type(*alarm_type)).count();
                (*alarm_type, n)
            })
            .collect();

        Self {
            total: alarms.len(),
            critical: count(Severity::Critical),
            warning: count(Severity::Warning),
            info: count(Severity::Info),
            normal: count(Severity::Normal),
            by_type,
            latest: alarms.first().cloned(),
        }
    }
}
