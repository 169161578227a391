mod directory_repository;
mod reading_repository;

pub use directory_repository::*;
pub use reading_repository::*;
