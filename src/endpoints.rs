//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/records/{record_id}', use [format_endpoint].

/// The route to list expense records and to submit drafts.
pub const RECORDS: &str = "/api/records";
/// The route to delete a single expense record.
pub const RECORD: &str = "/api/records/{record_id}";
/// The route for the aggregated totals of the (filtered) records.
pub const SUMMARY: &str = "/api/summary";
/// The route for ECharts options of a named chart.
pub const CHART: &str = "/api/charts/{chart}";
/// The route for the household members and their chart colors.
pub const CONFIG: &str = "/api/config";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/records/{record_id}', '{record_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: &str) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::RECORDS);
        assert_endpoint_is_valid_uri(endpoints::RECORD);
        assert_endpoint_is_valid_uri(endpoints::SUMMARY);
        assert_endpoint_is_valid_uri(endpoints::CHART);
        assert_endpoint_is_valid_uri(endpoints::CONFIG);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", "1");

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        let formatted_path = format_endpoint(endpoints::CHART, "monthly-members");

        assert_eq!(formatted_path, "/api/charts/monthly-members");
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", "1");

        assert_eq!(formatted_path, "/hello/world");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", "42");

        assert_eq!(formatted_path, "/hello/42/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
