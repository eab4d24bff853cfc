//! Route handler for the aggregated totals.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;

use crate::{
    AppState,
    aggregation::{
        RecordFilter, Totals, filter, sum_by_day, sum_by_month, sum_by_month_and_name,
        sum_by_name, total,
    },
};

/// Totals of the records matching a query.
///
/// A total that includes a non-numeric amount is `null`.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// The revision of the snapshot the totals were computed from.
    pub revision: u64,
    /// How many records matched the query.
    pub record_count: usize,
    /// The sum of every matching record.
    pub total: f64,
    /// Totals per member.
    pub by_name: Totals,
    /// Totals per `YYYY-MM` month.
    pub by_month: Totals,
    /// Totals per `YYYY-MM-DD` day.
    pub by_day: Totals,
    /// Totals per member within each month.
    pub by_month_and_name: BTreeMap<String, Totals>,
}

/// A route handler for the totals of the records matching the query.
pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<RecordFilter>,
) -> Json<SummaryResponse> {
    let mut cache = state.cache.lock().await;
    cache.apply_pending();

    let records = filter(cache.records(), &query.without_blanks());

    Json(SummaryResponse {
        revision: cache.revision(),
        record_count: records.len(),
        total: total(&records),
        by_name: sum_by_name(&records),
        by_month: sum_by_month(&records),
        by_day: sum_by_day(&records),
        by_month_and_name: sum_by_month_and_name(&records),
    })
}
