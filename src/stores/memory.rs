//! Implements an in-memory record store.

use std::sync::{Mutex, MutexGuard};

use crate::{
    Error,
    record::{ExpenseRecord, RecordDraft, RecordId},
    stores::{RecordStore, Subscribers, Subscription},
};

#[derive(Debug, Default)]
struct Collection {
    /// Newest record first.
    records: Vec<ExpenseRecord>,
    next_id: u64,
    unavailable: bool,
}

/// Keeps records in memory.
///
/// Useful for tests and demos. IDs are a counter that is never reset, so
/// they are not reused after a delete.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collection: Mutex<Collection>,
    subscribers: Subscribers,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following create, update and delete fail with
    /// [Error::StoreUnavailable] until called again with `false`.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), Error> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    /// The current collection, newest record first.
    pub fn records(&self) -> Result<Vec<ExpenseRecord>, Error> {
        Ok(self.lock()?.records.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collection>, Error> {
        self.collection.lock().map_err(|_| Error::DatabaseLockError)
    }

    fn lock_available(&self) -> Result<MutexGuard<'_, Collection>, Error> {
        let collection = self.lock()?;

        if collection.unavailable {
            return Err(Error::StoreUnavailable(
                "the in-memory store is offline".to_owned(),
            ));
        }

        Ok(collection)
    }
}

impl RecordStore for MemoryRecordStore {
    async fn create(&self, draft: RecordDraft) -> Result<RecordId, Error> {
        let mut collection = self.lock_available()?;

        collection.next_id += 1;
        let id = RecordId::new(collection.next_id.to_string());
        collection
            .records
            .insert(0, ExpenseRecord::from_draft(id.clone(), draft));

        self.subscribers.notify(&collection.records);

        Ok(id)
    }

    async fn update(&self, id: &RecordId, draft: RecordDraft) -> Result<(), Error> {
        let mut collection = self.lock_available()?;

        let record = collection
            .records
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(Error::UpdateMissingRecord)?;
        *record = ExpenseRecord::from_draft(id.clone(), draft);

        self.subscribers.notify(&collection.records);

        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<bool, Error> {
        let mut collection = self.lock_available()?;

        let count_before = collection.records.len();
        collection.records.retain(|record| &record.id != id);

        if collection.records.len() == count_before {
            return Ok(false);
        }

        self.subscribers.notify(&collection.records);

        Ok(true)
    }

    fn subscribe(&self) -> Result<Subscription, Error> {
        let collection = self.lock()?;

        Ok(self.subscribers.subscribe(collection.records.clone()))
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.count()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        record::{ExpenseRecord, RecordId},
        stores::{MemoryRecordStore, RecordStore},
    };

    #[tokio::test]
    async fn create_assigns_distinct_ids() {
        let store = MemoryRecordStore::new();

        let first = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();
        let second = store
            .create(ExpenseRecord::build("パパ", "2024-01-20", "交通費", 500))
            .await
            .unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn create_ignores_draft_id() {
        let store = MemoryRecordStore::new();

        let id = store
            .create(
                ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000)
                    .id(Some(RecordId::new("chosen-by-client"))),
            )
            .await
            .unwrap();

        assert_ne!(id, RecordId::new("chosen-by-client"));
    }

    #[tokio::test]
    async fn newest_record_comes_first() {
        let store = MemoryRecordStore::new();
        store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();
        let newest = store
            .create(ExpenseRecord::build("パパ", "2024-01-20", "交通費", 500))
            .await
            .unwrap();

        let records = store.records().unwrap();

        assert_eq!(records[0].id, newest);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryRecordStore::new();
        let first = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();
        store.delete(&first).await.unwrap();

        let second = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let store = MemoryRecordStore::new();

        let result = store
            .update(
                &RecordId::new("42"),
                ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000),
            )
            .await;

        assert_eq!(result, Err(Error::UpdateMissingRecord));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryRecordStore::new();
        let id = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();

        assert_eq!(store.delete(&id).await, Ok(true));
        assert_eq!(store.delete(&id).await, Ok(false));
    }

    #[tokio::test]
    async fn offline_store_rejects_writes() {
        let store = MemoryRecordStore::new();
        store.set_unavailable(true).unwrap();

        let result = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await;

        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
        assert!(store.records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let store = MemoryRecordStore::new();
        let mut subscription = store.subscribe().unwrap();

        let id = store
            .create(ExpenseRecord::build("ママ", "2024-01-05", "食費", 1000))
            .await
            .unwrap();
        store.delete(&id).await.unwrap();

        assert_eq!(subscription.recv().await.map(|s| s.len()), Some(0));
        assert_eq!(subscription.recv().await.map(|s| s.len()), Some(1));
        assert_eq!(subscription.recv().await.map(|s| s.len()), Some(0));
    }

    #[tokio::test]
    async fn deleting_missing_record_does_not_notify() {
        let store = MemoryRecordStore::new();
        let mut subscription = store.subscribe().unwrap();
        subscription.recv().await;

        store.delete(&RecordId::new("42")).await.unwrap();

        assert_eq!(subscription.try_recv(), None);
    }
}
