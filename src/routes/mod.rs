//! Router assembly.

mod app;
mod common;
mod entity;

pub use app::shell_routes;
pub use common::common_routes;
pub use entity::entity_routes;

use crate::settings::Settings;
use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Full application: `/api` entity routes, health routes and the app shell.
pub fn app(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .nest("/api", entity_routes(state.clone()))
        .merge(common_routes(state))
        .merge(shell_routes(&settings.static_dir))
        .layer(RequestBodyLimitLayer::new(settings.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
}
