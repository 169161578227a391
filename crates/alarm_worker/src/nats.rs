mod reading_message;
mod reading_processor;

pub use reading_message::*;
pub use reading_processor::*;
