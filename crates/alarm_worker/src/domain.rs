mod in_memory_notification_state_store;
mod notification_deduplicator;
mod notification_dispatcher;
mod reading_ingestion_service;

pub use in_memory_notification_state_store::*;
pub use notification_deduplicator::*;
pub use notification_dispatcher::*;
pub use reading_ingestion_service::*;
