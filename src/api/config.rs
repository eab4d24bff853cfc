//! Route handler for the household configuration.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;

/// The household members and the color each one is drawn in.
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    /// The members in display order.
    pub members: Vec<String>,
    /// The chart color of every member.
    pub colors: BTreeMap<String, String>,
    /// The timezone that "today" is taken from.
    pub timezone: String,
}

/// A route handler for the household configuration.
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let cache = state.cache.lock().await;
    let config = cache.config();

    let colors = config
        .members
        .iter()
        .map(|member| (member.clone(), config.color_for(member)))
        .collect();

    Json(ConfigResponse {
        members: config.members.clone(),
        colors,
        timezone: state.local_timezone.clone(),
    })
}
