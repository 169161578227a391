use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named sensor measurement within a reading.
///
/// Declaration order is the clause priority used when rendering alarm
/// messages, so `BTreeMap<Channel, _>` iterates in message order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Turbidity,
    Voltage,
    Ph,
    Temperature,
    WaterQuality,
    Condition,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Turbidity,
        Channel::Voltage,
        Channel::Ph,
        Channel::Temperature,
        Channel::WaterQuality,
        Channel::Condition,
    ];

    /// Label used inside message clauses ("High turbidity", "Low pH")
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Turbidity => "turbidity",
            Channel::Voltage => "voltage",
            Channel::Ph => "pH",
            Channel::Temperature => "temperature",
            Channel::WaterQuality => "water quality",
            Channel::Condition => "condition",
        }
    }

    /// Unit suffix appended to numeric values
    pub fn unit(&self) -> &'static str {
        match self {
            Channel::Turbidity => " NTU",
            Channel::Voltage => "V",
            Channel::Temperature => "°C",
            Channel::Ph | Channel::WaterQuality | Channel::Condition => "",
        }
    }
}

/// One channel's observation: an optional numeric value plus an optional
/// status string reported by the sensor firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelReading {
    pub value: Option<f64>,
    pub status: Option<String>,
}

impl ChannelReading {
    pub fn numeric(value: f64) -> Self {
        Self {
            value: Some(value),
            status: None,
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            value: None,
            status: Some(status.into()),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.status.is_none()
    }
}

/// Immutable timestamped sensor observation for a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub device_id: String,
    pub channels: BTreeMap<Channel, ChannelReading>,
    pub explanation: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        id: impl Into<String>,
        device_id: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            device_id: device_id.into(),
            channels: BTreeMap::new(),
            explanation: None,
            recorded_at,
        }
    }

    /// Builder-style channel insert; empty channel readings are dropped
    pub fn with_channel(mut self, channel: Channel, reading: ChannelReading) -> Self {
        if !reading.is_empty() {
            self.channels.insert(channel, reading);
        }
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn channel(&self, channel: Channel) -> Option<&ChannelReading> {
        self.channels.get(&channel)
    }
}

/// Input for listing stored readings, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct ListReadingsInput {
    pub device_ids: Vec<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
}

/// Repository trait for sensor reading storage
/// The ingestion collaborator persists readings; the core only reads them back
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Persist a newly ingested reading
    async fn store_reading(&self, reading: Reading) -> DomainResult<()>;

    /// List readings for the given devices ordered by `recorded_at` descending
    async fn list_readings(&self, input: ListReadingsInput) -> DomainResult<Vec<Reading>>;

    /// Most recent reading for a device
    async fn get_latest_reading(&self, device_id: &str) -> DomainResult<Option<Reading>>;
}
