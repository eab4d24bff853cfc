//! The JSON API route handlers.

mod charts;
mod config;
mod records;
mod summary;

pub use charts::get_chart;
pub use config::get_config;
pub use records::{delete_record, get_records, submit_record};
pub use summary::get_summary;
