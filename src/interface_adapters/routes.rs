use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::services::ServeDir;

// Build the HTTP router: the worms socket, a liveness probe and the browser client.
pub fn app(state: Arc<AppState>) -> Router {
    let client = ServeDir::new(&state.www_root);
    Router::new()
        .route("/worms", get(ws_handler))
        .route("/health", get(health))
        .fallback_service(client)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
