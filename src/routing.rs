//! Application router configuration.

use axum::{
    Router, middleware,
    routing::{delete, get},
};

use crate::{
    AppState, Error,
    api::{delete_record, get_chart, get_config, get_records, get_summary, submit_record},
    endpoints,
    logging::logging_middleware,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::RECORDS, get(get_records).post(submit_record))
        .route(endpoints::RECORD, delete(delete_record))
        .route(endpoints::SUMMARY, get(get_summary))
        .route(endpoints::CHART, get(get_chart))
        .route(endpoints::CONFIG, get(get_config))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::test_utils::get_test_server;

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let server = get_test_server();

        let response = server.get("/api/nothing-here").await;

        response.assert_status_not_found();
        response.assert_json(&json!({ "error": "the requested resource could not be found" }));
    }

    #[tokio::test]
    async fn coffee_route_is_not_served() {
        let server = get_test_server();

        server.get("/coffee").await.assert_status_not_found();
    }
}
