//! The in-memory mirror of the shared record collection.
//!
//! The cache never edits its records itself. Mutations go to the store and
//! the cache only changes when the store's snapshot comes back through the
//! subscription, so what the UI sees is always what the store holds (at the
//! cost of one round trip before a change shows up).

use std::sync::Arc;

use serde::Serialize;

use crate::{
    Error, LedgerConfig,
    record::{ExpenseRecord, RecordDraft, RecordId},
    stores::{RecordStore, Subscription},
};

/// The records as of the latest applied notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Incremented by one for every applied notification, starting from zero
    /// before the first one arrives.
    pub revision: u64,
    /// The whole collection, in store order.
    pub records: Vec<ExpenseRecord>,
}

/// Mirrors the record collection of a [RecordStore] and routes mutations to it.
///
/// Each cache owns exactly one subscription, opened on construction and
/// closed by [RecordCache::close] or on drop.
#[derive(Debug)]
pub struct RecordCache<S> {
    store: Arc<S>,
    config: LedgerConfig,
    subscription: Option<Subscription>,
    snapshot: Snapshot,
}

impl<S: RecordStore> RecordCache<S> {
    /// Create a cache for `store` and subscribe to it.
    ///
    /// The store's current collection arrives as the first notification, so
    /// call [RecordCache::next_snapshot] or [RecordCache::apply_pending]
    /// before reading.
    ///
    /// # Errors
    /// Returns an error if the store cannot open the subscription.
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Result<Self, Error> {
        let subscription = store.subscribe()?;

        Ok(Self {
            store,
            config,
            subscription: Some(subscription),
            snapshot: Snapshot::default(),
        })
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The records of the latest snapshot.
    pub fn records(&self) -> &[ExpenseRecord] {
        &self.snapshot.records
    }

    /// The revision of the latest snapshot.
    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }

    /// The household configuration drafts are checked against.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The store behind the cache.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The number of snapshots waiting to be applied.
    pub fn pending(&self) -> usize {
        self.subscription
            .as_ref()
            .map_or(0, |subscription| subscription.pending())
    }

    /// Whether the subscription is still open.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Send a draft to the store: an update if it has an ID, otherwise a create.
    ///
    /// The cached records are left alone; the change shows up once the
    /// store's next snapshot has been applied.
    ///
    /// # Errors
    /// This function will return a:
    /// - validation error from [RecordDraft::validate] if the draft is invalid,
    /// - [Error::UpdateMissingRecord] if the record to update no longer exists,
    /// - or whatever error the store reports, e.g. [Error::StoreUnavailable].
    pub async fn submit(&self, draft: RecordDraft) -> Result<RecordId, Error> {
        draft.validate(&self.config)?;

        match draft.id.clone() {
            Some(id) => {
                tracing::debug!("Updating record {id}");
                self.store.update(&id, draft).await?;
                Ok(id)
            }
            None => {
                let id = self.store.create(draft).await?;
                tracing::debug!("Created record {id}");
                Ok(id)
            }
        }
    }

    /// Ask the store to delete the record `id`.
    ///
    /// Removing a record that is already gone succeeds.
    ///
    /// # Errors
    /// Returns whatever error the store reports, e.g. [Error::StoreUnavailable].
    pub async fn remove(&self, id: &RecordId) -> Result<(), Error> {
        if !self.store.delete(id).await? {
            tracing::debug!("Record {id} was already deleted");
        }

        Ok(())
    }

    /// Wait for the next notification and apply it.
    ///
    /// # Errors
    /// Returns [Error::SubscriptionClosed] if the cache has been closed or
    /// the store has gone away.
    pub async fn next_snapshot(&mut self) -> Result<&Snapshot, Error> {
        let subscription = self.subscription.as_mut().ok_or(Error::SubscriptionClosed)?;
        let records = subscription.recv().await.ok_or(Error::SubscriptionClosed)?;

        self.apply(records);

        Ok(&self.snapshot)
    }

    /// Apply every notification that has already arrived, without waiting.
    ///
    /// Returns the number of snapshots applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut pending = Vec::new();

        if let Some(subscription) = self.subscription.as_mut() {
            while let Some(records) = subscription.try_recv() {
                pending.push(records);
            }
        }

        let count = pending.len();
        for records in pending {
            self.apply(records);
        }

        count
    }

    /// Close the subscription. The last snapshot stays readable.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
            tracing::debug!("Closed record cache at revision {}", self.snapshot.revision);
        }
    }

    fn apply(&mut self, records: Vec<ExpenseRecord>) {
        self.snapshot = Snapshot {
            revision: self.snapshot.revision + 1,
            records,
        };
        tracing::debug!(
            "Applied snapshot {} with {} records",
            self.snapshot.revision,
            self.snapshot.records.len()
        );
    }
}
