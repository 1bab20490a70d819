use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::modules::time_log::adapters::inbound::http;
use crate::shell::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/entries", post(http::insert_entry).get(http::list_entries))
        .route("/entries/{id}", delete(http::remove_entry))
        .route("/undo", post(http::undo))
        .route("/summary", get(http::summary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
