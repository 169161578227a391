pub mod auth;
pub mod classification;
pub mod domain;
pub mod garde;
pub mod memory;
pub mod nats;
pub mod telemetry;

pub use classification::*;
pub use domain::*;
pub use memory::*;
pub use nats::*;
