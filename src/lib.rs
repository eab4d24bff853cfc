//! Kakeibo is a household expense ledger.
//!
//! Household members record who spent how much, on what, and when. The
//! library keeps an in-memory mirror of a shared, multi-writer record
//! collection ([RecordCache]) in sync with a backing store ([RecordStore]),
//! and derives filtered and bucketed totals from it ([aggregation]).
//!
//! A thin JSON API ([build_router]) exposes the ledger to an external UI.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

pub mod aggregation;
mod api;
mod app_state;
mod cache;
pub mod charts;
mod config;
pub mod csv_file;
pub mod currency;
mod endpoints;
mod logging;
mod record;
mod routing;
pub mod stores;
mod timezone;

pub use app_state::AppState;
pub use cache::{RecordCache, Snapshot};
pub use config::LedgerConfig;
pub use endpoints::format_endpoint;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use record::{Amount, ExpenseRecord, RawRecord, RecordDate, RecordDraft, RecordId};
pub use routing::build_router;
pub use stores::{MemoryRecordStore, RecordStore, SQLiteRecordStore, Subscription};
pub use timezone::{get_local_offset, local_today};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The backing store rejected the request or could not be reached.
    ///
    /// Mutations are never retried and never applied locally, so the
    /// cached snapshot is unchanged when this error is returned.
    #[error("the record store is unavailable: {0}")]
    StoreUnavailable(String),

    /// Tried to update a record that is not in the store.
    ///
    /// Another writer may have deleted the record after the caller last
    /// saw it.
    #[error("tried to update a record that is not in the store")]
    UpdateMissingRecord,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The cache's subscription has been closed, so no more snapshots
    /// will arrive.
    #[error("the record subscription is closed")]
    SubscriptionClosed,

    /// The name on a draft is not one of the configured household members.
    #[error("\"{0}\" is not a household member")]
    UnknownMember(String),

    /// The date on a draft is not a valid `YYYY-MM-DD` calendar date.
    #[error("\"{0}\" is not a valid YYYY-MM-DD date")]
    InvalidDate(String),

    /// The item description on a draft is empty.
    #[error("the item description cannot be empty")]
    EmptyItem,

    /// The amount on a draft does not coerce to a finite number.
    #[error("\"{0}\" is not a valid amount")]
    InvalidAmount(String),

    /// The ledger configuration could not be read or is inconsistent.
    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The CSV had issues that prevented it from being parsed or written.
    #[error("Could not process the CSV file: {0}")]
    InvalidCSV(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::UnknownMember(_)
            | Error::InvalidDate(_)
            | Error::EmptyItem
            | Error::InvalidAmount(_)
            | Error::InvalidCSV(_) => StatusCode::BAD_REQUEST,
            Error::UpdateMissingRecord | Error::NotFound => StatusCode::NOT_FOUND,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are only meant for the server logs.
            tracing::error!("An unexpected error occurred: {}", self);
            return (
                status,
                Json(json!({
                    "error": "An unexpected error occurred, check the server logs for more details."
                })),
            )
                .into_response();
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let response = Error::EmptyItem.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_update_target_is_not_found() {
        let response = Error::UpdateMissingRecord.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_failure_is_service_unavailable() {
        let response = Error::StoreUnavailable("offline".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
