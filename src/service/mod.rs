//! Request-side services: validation, preprocessor chains, CRUD and association management.

mod association;
mod crud;
pub mod password;
mod preprocess;
mod validation;

pub use association::{AssociationService, TagSet};
pub use crud::CrudService;
pub(crate) use crud::parse_id;
pub use preprocess::run_chain;
pub use validation::RequestValidator;
