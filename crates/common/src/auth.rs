mod access_scope;
mod caller;

pub use access_scope::*;
pub use caller::*;
