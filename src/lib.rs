//! Project directory: a REST backend over users, projects, keywords, languages and
//! role-based project membership.

pub mod config;
pub mod error;
pub mod handlers;
pub mod membership;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{directory_config, resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use membership::{Member, ProjectMembers, Role, User};
pub use migration::apply_migrations;
pub use routes::app;
pub use service::{AssociationService, CrudService};
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_database_exists, EntityStore, MemoryStore, PgStore};
