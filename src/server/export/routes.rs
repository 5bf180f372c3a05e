use super::handlers;
use crate::server::state::AppState;
use axum::{routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::usage))
        .route("/{*image_path}", get(handlers::handle_image_request))
}
