mod alarm;
mod directory;
mod notification;
mod reading;
mod result;
mod user;

pub use alarm::*;
pub use directory::*;
pub use notification::*;
pub use reading::*;
pub use result::*;
pub use user::*;
