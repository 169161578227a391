//! Per-channel threshold evaluation.
//!
//! A [`ThresholdTable`] maps each [`Channel`] to a [`ChannelPolicy`]. Numeric
//! values are checked against two bands: leaving the warning band (strictly
//! below `min` or strictly above `max`, or touching them when the band is
//! `inclusive`) is a warning, touching the critical band (`<= min` or
//! `>= max`) is critical. Status strings are matched
//! case-insensitively against fixed problematic-value sets.

use crate::domain::{Channel, ChannelReading};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-channel severity tier. `Info` marks a known-bad reading that no
/// warning or critical rule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    None,
    Info,
    Warning,
    Critical,
}

/// Optional lower/upper bounds of a band
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Band {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// A value equal to a bound already counts as outside the band
    #[serde(default)]
    pub inclusive: bool,
}

impl Band {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            inclusive: false,
        }
    }

    pub fn max_only(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    pub fn min_only(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    pub fn inclusive(self) -> Self {
        Self {
            inclusive: true,
            ..self
        }
    }

    fn below(&self, value: f64) -> bool {
        match self.min {
            Some(min) if self.inclusive => value <= min,
            Some(min) => value < min,
            None => false,
        }
    }

    fn above(&self, value: f64) -> bool {
        match self.max {
            Some(max) if self.inclusive => value >= max,
            Some(max) => value > max,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Normal operating band; values outside it are warnings
    #[serde(default)]
    pub warning: Band,
    /// Critical limits, inclusive
    #[serde(default)]
    pub critical: Band,
    /// A reading of exactly 0 means the sensor is absent
    #[serde(default)]
    pub zero_is_fault: bool,
    #[serde(default)]
    pub critical_statuses: Vec<String>,
    #[serde(default)]
    pub warning_statuses: Vec<String>,
    /// Statuses that flag the reading without a warning/critical tier
    #[serde(default)]
    pub anomalous_statuses: Vec<String>,
}

/// Why a channel was flagged
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// Value of exactly zero on a channel that is never legitimately zero
    ZeroReading,
    Low(f64),
    High(f64),
    Status(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvaluation {
    pub channel: Channel,
    pub tier: Tier,
    pub finding: Option<Finding>,
}

impl ChannelEvaluation {
    fn clear(channel: Channel) -> Self {
        Self {
            channel,
            tier: Tier::None,
            finding: None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.tier != Tier::None
    }
}

impl ChannelPolicy {
    /// Evaluate one channel; the most severe of the numeric and status checks wins
    pub fn evaluate(&self, channel: Channel, reading: &ChannelReading) -> ChannelEvaluation {
        let numeric = reading.value.map(|value| self.evaluate_value(value));
        let status = reading
            .status
            .as_deref()
            .map(|status| self.evaluate_status(status));

        let best = [numeric, status]
            .into_iter()
            .flatten()
            .filter(|(tier, _)| *tier != Tier::None)
            // max_by_key keeps the last maximum; reverse so the numeric finding wins ties
            .rev()
            .max_by_key(|(tier, _)| *tier);

        match best {
            Some((tier, finding)) => ChannelEvaluation {
                channel,
                tier,
                finding: Some(finding),
            },
            None => ChannelEvaluation::clear(channel),
        }
    }

    fn evaluate_value(&self, value: f64) -> (Tier, Finding) {
        if self.zero_is_fault && value == 0.0 {
            return (Tier::Critical, Finding::ZeroReading);
        }

        if let Some(min) = self.critical.min {
            if value <= min {
                return (Tier::Critical, Finding::Low(value));
            }
        }
        if let Some(max) = self.critical.max {
            if value >= max {
                return (Tier::Critical, Finding::High(value));
            }
        }

        if self.warning.below(value) {
            return (Tier::Warning, Finding::Low(value));
        }
        if self.warning.above(value) {
            return (Tier::Warning, Finding::High(value));
        }

        (Tier::None, Finding::High(value))
    }

    fn evaluate_status(&self, status: &str) -> (Tier, Finding) {
        let normalized = status.trim();

        let tier = if status_in(&self.critical_statuses, normalized) {
            Tier::Critical
        } else if status_in(&self.warning_statuses, normalized) {
            Tier::Warning
        } else if status_in(&self.anomalous_statuses, normalized) {
            Tier::Info
        } else {
            Tier::None
        };

        (tier, Finding::Status(normalized.to_string()))
    }
}

/// Threshold configuration for every channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub channels: BTreeMap<Channel, ChannelPolicy>,
}

impl ThresholdTable {
    pub fn policy(&self, channel: Channel) -> Option<&ChannelPolicy> {
        self.channels.get(&channel)
    }

    /// Evaluate a channel reading; channels without a policy never contribute
    pub fn evaluate(&self, channel: Channel, reading: &ChannelReading) -> ChannelEvaluation {
        match self.policy(channel) {
            Some(policy) => policy.evaluate(channel, reading),
            None => ChannelEvaluation::clear(channel),
        }
    }
}

fn status_in(set: &[String], status: &str) -> bool {
    set.iter().any(|s| s.trim().eq_ignore_ascii_case(status))
}

fn statuses(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for ThresholdTable {
    /// Thresholds for the deployed sensor fleet
    fn default() -> Self {
        let mut channels = BTreeMap::new();

        channels.insert(
            Channel::Turbidity,
            ChannelPolicy {
                warning: Band::max_only(100.0).inclusive(),
                critical: Band::max_only(200.0),
                critical_statuses: statuses(&["NOT CLEAN"]),
                warning_statuses: statuses(&["NO INPUT"]),
                ..Default::default()
            },
        );
        channels.insert(
            Channel::Voltage,
            ChannelPolicy {
                warning: Band::min_only(2.5),
                critical: Band::min_only(1.5),
                ..Default::default()
            },
        );
        channels.insert(
            Channel::Ph,
            ChannelPolicy {
                warning: Band::new(Some(6.5), Some(8.5)),
                zero_is_fault: true,
                critical_statuses: statuses(&["INVALID", "IN AIR"]),
                ..Default::default()
            },
        );
        channels.insert(
            Channel::Temperature,
            ChannelPolicy {
                warning: Band::new(Some(5.0), Some(30.0)),
                critical: Band::new(Some(0.0), Some(35.0)),
                ..Default::default()
            },
        );
        channels.insert(
            Channel::WaterQuality,
            ChannelPolicy {
                warning_statuses: statuses(&["POOR", "UNKNOWN"]),
                anomalous_statuses: statuses(&[""]),
                ..Default::default()
            },
        );
        channels.insert(
            Channel::Condition,
            ChannelPolicy {
                critical_statuses: statuses(&["CRITICAL", "DIRTY"]),
                warning_statuses: statuses(&["WARNING", "POOR"]),
                anomalous_statuses: statuses(&["UNKNOWN", ""]),
                ..Default::default()
            },
        );

        Self { channels }
    }
}
