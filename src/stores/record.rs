//! Defines the record store trait.

use std::future::Future;

use crate::{
    Error,
    record::{RecordDraft, RecordId},
    stores::Subscription,
};

/// Durable storage for the shared record collection, with change notifications.
///
/// Any backing store that satisfies this contract can sit behind a
/// [RecordCache](crate::RecordCache). Stores do not validate drafts: other
/// writers may put anything into the collection, so readers must cope with
/// malformed rows anyway.
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return the ID the store assigned to it.
    ///
    /// Any ID on `draft` is ignored. Failures are not retried.
    fn create(&self, draft: RecordDraft) -> impl Future<Output = Result<RecordId, Error>> + Send;

    /// Replace every field of the record `id` with the fields of `draft`.
    ///
    /// # Errors
    /// Implementers should return [Error::UpdateMissingRecord] if `id` does
    /// not refer to a record in the store.
    fn update(
        &self,
        id: &RecordId,
        draft: RecordDraft,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete the record `id`, returning whether a record was removed.
    ///
    /// Deleting a record that does not exist is not an error.
    fn delete(&self, id: &RecordId) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Subscribe to the full collection.
    ///
    /// The subscription first yields the current collection, then the whole
    /// collection again after each change made through this store,
    /// including the subscriber's own writes.
    fn subscribe(&self) -> Result<Subscription, Error>;

    /// The number of live subscriptions.
    fn subscriber_count(&self) -> usize;
}
