mod log_sender;
mod template;

pub use log_sender::*;
pub use template::*;
