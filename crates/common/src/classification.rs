mod alarm_classifier;
mod threshold_policy;

pub use alarm_classifier::*;
pub use threshold_policy::*;
