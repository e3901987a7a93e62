//! Entity routes. Paths are parameterized; handlers resolve the entity from the routing table,
//! so an unknown segment is a 404 rather than a missing route.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update_not_supported};
use crate::handlers::membership::{add_related, list_related, remove_related};
use crate::state::AppState;
use axum::{routing::delete, routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route(
            "/:path_segment/:id",
            get(read)
                .delete(delete_handler)
                .patch(update_not_supported)
                .put(update_not_supported),
        )
        .route("/:path_segment/:id/:relation", get(list_related).post(add_related))
        .route("/:path_segment/:id/:relation/:related_id", delete(remove_related))
        .with_state(state)
}
