pub mod alarm_worker;
pub mod domain;
pub mod mail;
pub mod nats;

pub use alarm_worker::*;
pub use domain::*;
pub use mail::*;
pub use nats::*;
