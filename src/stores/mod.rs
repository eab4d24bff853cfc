//! Contains the record store trait and its implementations.

mod memory;
mod record;
mod subscription;

pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use record::RecordStore;
pub use sqlite::SQLiteRecordStore;
pub use subscription::{Subscribers, Subscription};
