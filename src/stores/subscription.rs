//! Change notification plumbing shared by the record stores.
//!
//! A store keeps a [Subscribers] list and calls [Subscribers::notify] with
//! the full collection after every change. Each subscriber gets its own
//! unbounded channel, so a slow subscriber never blocks a writer and
//! snapshots arrive in the order they were sent.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

use crate::record::ExpenseRecord;

type SubscriberId = u64;

#[derive(Debug, Default)]
struct SubscriberMap {
    next_id: SubscriberId,
    senders: HashMap<SubscriberId, UnboundedSender<Vec<ExpenseRecord>>>,
}

/// The live subscriptions of a store.
#[derive(Debug, Default, Clone)]
pub struct Subscribers {
    inner: Arc<Mutex<SubscriberMap>>,
}

impl Subscribers {
    /// Register a new subscriber whose first snapshot is `initial`.
    ///
    /// Callers should hold the lock on their collection while calling this
    /// so no change can slip in between reading `initial` and registering.
    pub fn subscribe(&self, initial: Vec<ExpenseRecord>) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is still alive, so the send cannot fail.
        let _ = sender.send(initial);

        let mut map = self.lock();
        let id = map.next_id;
        map.next_id += 1;
        map.senders.insert(id, sender);
        tracing::debug!("Opened subscription {id}, {} active", map.senders.len());

        Subscription {
            id,
            receiver,
            subscribers: Arc::downgrade(&self.inner),
        }
    }

    /// Send a copy of `snapshot` to every subscriber.
    ///
    /// Subscribers whose receiving end has gone away are forgotten.
    pub fn notify(&self, snapshot: &[ExpenseRecord]) {
        let mut map = self.lock();
        map.senders
            .retain(|_, sender| sender.send(snapshot.to_vec()).is_ok());
        tracing::debug!(
            "Sent snapshot of {} records to {} subscribers",
            snapshot.len(),
            map.senders.len()
        );
    }

    /// The number of live subscriptions.
    pub fn count(&self) -> usize {
        self.lock().senders.len()
    }

    fn lock(&self) -> MutexGuard<'_, SubscriberMap> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A handle that receives full snapshots of a record collection.
///
/// The first snapshot is the collection as of subscribing. Dropping the
/// handle (or calling [Subscription::close]) unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: UnboundedReceiver<Vec<ExpenseRecord>>,
    subscribers: Weak<Mutex<SubscriberMap>>,
}

impl Subscription {
    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the store has been dropped and every pending
    /// snapshot has been received.
    pub async fn recv(&mut self) -> Option<Vec<ExpenseRecord>> {
        self.receiver.recv().await
    }

    /// Take the next snapshot if one has already been delivered.
    pub fn try_recv(&mut self) -> Option<Vec<ExpenseRecord>> {
        match self.receiver.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// The number of snapshots delivered but not yet received.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Unsubscribe.
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            let mut map = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
            map.senders.remove(&self.id);
            tracing::debug!(
                "Closed subscription {}, {} active",
                self.id,
                map.senders.len()
            );
        }
    }
}
