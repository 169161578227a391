mod access_scoper;
mod alarm_query_service;
mod dashboard_service;

pub use access_scoper::*;
pub use alarm_query_service::*;
pub use dashboard_service::*;
