//! Route handlers for reading and changing records.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    AppState, Error, ExpenseRecord, RecordDraft, RecordId,
    aggregation::{RecordFilter, filter},
};

/// The records matching a query, as of snapshot `revision`.
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    /// The revision of the snapshot the records were taken from.
    pub revision: u64,
    /// The matching records in store order.
    pub records: Vec<ExpenseRecord>,
}

/// The ID assigned to (or kept by) a submitted record.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// The record's ID.
    pub id: RecordId,
}

/// A route handler for listing records, optionally filtered by member,
/// month and day.
pub async fn get_records(
    State(state): State<AppState>,
    Query(query): Query<RecordFilter>,
) -> Json<RecordsResponse> {
    let mut cache = state.cache.lock().await;
    cache.apply_pending();

    Json(RecordsResponse {
        revision: cache.revision(),
        records: filter(cache.records(), &query.without_blanks()),
    })
}

/// A route handler for creating a record, or replacing one if the draft has
/// an ID.
///
/// Responds with `202 Accepted` since the change only shows up in reads once
/// the store's snapshot has arrived.
pub async fn submit_record(
    State(state): State<AppState>,
    Json(draft): Json<RecordDraft>,
) -> Result<impl IntoResponse, Error> {
    let mut cache = state.cache.lock().await;

    let id = cache.submit(draft).await?;
    cache.apply_pending();

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { id })))
}

/// A route handler for deleting a record.
///
/// Deleting a record that does not exist also succeeds.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(record_id): Path<RecordId>,
) -> Result<StatusCode, Error> {
    let mut cache = state.cache.lock().await;

    cache.remove(&record_id).await?;
    cache.apply_pending();

    Ok(StatusCode::NO_CONTENT)
}
