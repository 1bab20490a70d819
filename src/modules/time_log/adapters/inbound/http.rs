// HTTP inbound adapter over TimeLogHistory.
//
// Commands answer 202 as soon as they are queued. Their outcome arrives as history events.
// Range reads wait for the completion carrying their request id, bounded by the request timeout.
// A subscriber that lagged may have missed that completion, so it answers 503 straight away.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::modules::time_log::application::errors::{ErrorKind, HistoryError};
use crate::modules::time_log::core::entry::Entry;
use crate::modules::time_log::core::events::HistoryEvent;
use crate::shell::state::AppState;

#[derive(Deserialize)]
pub struct InsertEntryBody {
    pub start_time: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Deserialize)]
pub struct ListEntriesParams {
    pub begin: Option<i64>,
    pub end: Option<i64>,
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub size: u64,
    pub categories: BTreeSet<String>,
    pub undo_count: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn insert_entry(
    State(state): State<AppState>,
    body: Result<Json<InsertEntryBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(_) => return StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    };
    let entry = Entry::new(body.start_time, body.category, body.comment);
    accepted(state.history.insert(entry))
}

pub async fn remove_entry(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let entry = Entry {
        id,
        ..Entry::new(0, "", "")
    };
    accepted(state.history.remove(entry))
}

pub async fn undo(State(state): State<AppState>) -> Response {
    accepted(state.history.undo())
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<ListEntriesParams>,
) -> Response {
    let request_id = state.next_request_id();
    let mut events = state.history.subscribe();
    if let Err(err) = state.history.history_between(
        request_id,
        params.begin.unwrap_or(i64::MIN),
        params.end.unwrap_or(i64::MAX),
        params.category.unwrap_or_default(),
    ) {
        return error_response(&err);
    }

    match tokio::time::timeout(state.request_timeout, completion(&mut events, request_id)).await {
        Ok(Some(HistoryEvent::HistoryRequestCompleted { entries, .. })) => {
            Json(entries).into_response()
        }
        Ok(Some(HistoryEvent::Error(failure))) => error_response(&failure.error),
        Ok(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Err(_) => {
            tracing::warn!(request_id, "history request timed out");
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

pub async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.history.snapshot();
    Json(SummaryResponse {
        size: snapshot.size,
        categories: snapshot.categories,
        undo_count: snapshot.undo_count,
    })
}

async fn completion(
    events: &mut broadcast::Receiver<HistoryEvent>,
    request_id: u64,
) -> Option<HistoryEvent> {
    loop {
        match events.recv().await {
            Ok(event) if event.request_id() == Some(request_id) => return Some(event),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(request_id, skipped, "history subscriber lagged");
                return None;
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn accepted(result: Result<(), HistoryError>) -> Response {
    match result {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &HistoryError) -> Response {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::IoFailure | ErrorKind::Closed => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
