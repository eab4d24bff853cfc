//! Implements a struct that holds the state of the REST server.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle};

use crate::{Error, LedgerConfig, RecordCache, SQLiteRecordStore, get_local_offset};

/// The record cache shared by the route handlers.
pub type SharedCache = Arc<Mutex<RecordCache<SQLiteRecordStore>>>;

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Tokyo".
    pub local_timezone: String,

    /// The server's mirror of the record collection.
    pub cache: SharedCache,
}

impl AppState {
    /// Create a new [AppState] with a cache subscribed to `store`.
    ///
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Asia/Tokyo".
    ///
    /// # Errors
    /// Returns an error if the timezone is unknown or the store refuses the
    /// subscription.
    pub fn new(
        store: SQLiteRecordStore,
        config: LedgerConfig,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        let cache = RecordCache::new(Arc::new(store), config)?;

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            cache: Arc::new(Mutex::new(cache)),
        })
    }

    /// Spawn a task that keeps the cache in step with the database.
    ///
    /// Every `period` the task picks up commits made by other processes,
    /// such as the `ledger` CLI, and applies every snapshot that has arrived
    /// so they do not pile up between requests.
    pub fn spawn_sync_task(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.cache.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let mut cache = cache.lock().await;
                if let Err(error) = cache.store().check_for_external_changes() {
                    tracing::warn!("Could not check the database for changes: {error}");
                }
                cache.apply_pending();
            }
        })
    }
}
