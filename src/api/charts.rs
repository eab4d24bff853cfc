//! Route handler for chart options.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use charming::Chart;

use crate::{
    AppState, Error,
    aggregation::{RecordFilter, filter},
    charts::{member_totals_chart, monthly_member_chart, monthly_totals_chart},
};

/// A route handler for the ECharts options of the chart named `chart`.
///
/// `chart` is one of `members`, `months` or `monthly-members`. The query
/// filters the records that go into the chart.
pub async fn get_chart(
    State(state): State<AppState>,
    Path(chart): Path<String>,
    Query(query): Query<RecordFilter>,
) -> Result<Json<Chart>, Error> {
    let mut cache = state.cache.lock().await;
    cache.apply_pending();

    let records = filter(cache.records(), &query.without_blanks());
    let config = cache.config();

    let chart = match chart.as_str() {
        "members" => member_totals_chart(&records, config),
        "months" => monthly_totals_chart(&records),
        "monthly-members" => monthly_member_chart(&records, config),
        _ => return Err(Error::NotFound),
    };

    Ok(Json(chart))
}
