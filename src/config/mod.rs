pub mod types;
pub mod directory;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use directory::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
