//! Contains the SQLite backend for the record store.

pub mod record;

pub use record::{SQLiteRecordStore, create_record_table};
