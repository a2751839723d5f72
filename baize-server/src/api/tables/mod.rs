//! Table API Module

mod handler;

use axum::{Router, routing::get, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/tables", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/open", post(handler::open))
        .route("/{id}/close", post(handler::close))
        .route(
            "/{id}/consumptions",
            get(handler::list_consumptions).post(handler::add_consumption),
        )
}
