//! Change feed for observing committed relation changes.
//!
//! The change feed is a [`ClientTransactionListener`]. It buffers the
//! relation changes of every transaction it is attached to and publishes
//! them only when that transaction commits; a rollback drops them.
//! Subscribers see every committed end-point change once, in commit order,
//! either pushed through a channel or pulled with [`RelationChangeFeed::poll`].
//!
//! # Usage
//!
//! ```rust,ignore
//! let feed = Arc::new(RelationChangeFeed::new());
//! let receiver = feed.subscribe();
//!
//! let mut transaction = ClientTransaction::builder(mapping, source)
//!     .listener(feed.clone())
//!     .build();
//!
//! transaction.set_related_object(&order, "Customer", Some(&customer))?;
//! transaction.commit()?;
//!
//! while let Ok(event) = receiver.try_recv() {
//!     println!("Change: {:?}", event);
//! }
//! ```

use crate::end_point::RelationEndPointId;
use crate::listener::ClientTransactionListener;
use crate::object::ObjectId;
use crate::types::TransactionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of relation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    /// The end point gained a related object.
    Linked,
    /// The end point lost its related object.
    Unlinked,
    /// The end point's related object was exchanged for another.
    Replaced,
}

/// A single committed relation change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationChangeEvent {
    /// Sequence number assigned when the change was published.
    pub sequence: u64,
    /// Transaction that committed the change.
    pub transaction_id: TransactionId,
    /// The changed end point.
    pub end_point_id: RelationEndPointId,
    /// Type of change.
    pub change_type: ChangeType,
    /// Related object before the change.
    pub old_related_object: Option<ObjectId>,
    /// Related object after the change.
    pub new_related_object: Option<ObjectId>,
}

#[derive(Debug, Clone)]
struct PendingChange {
    end_point_id: RelationEndPointId,
    change_type: ChangeType,
    old_related_object: Option<ObjectId>,
    new_related_object: Option<ObjectId>,
}

/// Distributes committed relation changes to subscribers.
///
/// One feed can be attached to any number of transactions; changes are
/// buffered per transaction ID.
#[derive(Debug)]
pub struct RelationChangeFeed {
    /// Subscribers (senders).
    subscribers: RwLock<Vec<Sender<RelationChangeEvent>>>,
    /// Uncommitted changes per transaction.
    pending: RwLock<HashMap<TransactionId, Vec<PendingChange>>>,
    /// History of recent events for polling.
    history: RwLock<Vec<RelationChangeEvent>>,
    /// Maximum history size.
    max_history: usize,
    /// Last assigned sequence number.
    sequence: AtomicU64,
}

impl RelationChangeFeed {
    /// Creates a new change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(10000)
    }

    /// Creates a change feed with a specific history limit.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            pending: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            max_history,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribes to the change feed.
    ///
    /// Returns a receiver that will receive all future change events.
    /// The receiver should be polled regularly to avoid unbounded memory growth.
    pub fn subscribe(&self) -> Receiver<RelationChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    fn emit(&self, event: RelationChangeEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Send to subscribers (remove disconnected ones)
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Polls events from a sequence cursor.
    ///
    /// Returns events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<RelationChangeEvent> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map_or(0, |e| e.sequence)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// Returns the number of changes buffered for an uncommitted transaction.
    pub fn pending_len(&self, transaction_id: TransactionId) -> usize {
        self.pending
            .read()
            .get(&transaction_id)
            .map_or(0, Vec::len)
    }

    /// Clears history older than the given sequence.
    pub fn truncate_history(&self, min_sequence: u64) {
        let mut history = self.history.write();
        history.retain(|e| e.sequence >= min_sequence);
    }
}

impl Default for RelationChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientTransactionListener for RelationChangeFeed {
    fn relation_changed(
        &self,
        transaction_id: TransactionId,
        end_point_id: &RelationEndPointId,
        old_related_object: Option<&ObjectId>,
        new_related_object: Option<&ObjectId>,
    ) {
        let change_type = match (old_related_object, new_related_object) {
            (None, Some(_)) => ChangeType::Linked,
            (Some(_), None) => ChangeType::Unlinked,
            (Some(_), Some(_)) => ChangeType::Replaced,
            (None, None) => return,
        };
        self.pending
            .write()
            .entry(transaction_id)
            .or_default()
            .push(PendingChange {
                end_point_id: end_point_id.clone(),
                change_type,
                old_related_object: old_related_object.cloned(),
                new_related_object: new_related_object.cloned(),
            });
    }

    fn transaction_committed(&self, transaction_id: TransactionId) {
        let changes = self.pending.write().remove(&transaction_id);
        for change in changes.into_iter().flatten() {
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            self.emit(RelationChangeEvent {
                sequence,
                transaction_id,
                end_point_id: change.end_point_id,
                change_type: change.change_type,
                old_related_object: change.old_related_object,
                new_related_object: change.new_related_object,
            });
        }
    }

    fn transaction_rolled_back(&self, transaction_id: TransactionId) {
        self.pending.write().remove(&transaction_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassId;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn order(n: u8) -> ObjectId {
        ObjectId::from_bytes(ClassId::new("Order"), [n; 16])
    }

    fn customer(n: u8) -> ObjectId {
        ObjectId::from_bytes(ClassId::new("Customer"), [n; 16])
    }

    fn link(feed: &RelationChangeFeed, transaction: u64, n: u8) {
        feed.relation_changed(
            TransactionId::new(transaction),
            &RelationEndPointId::new(order(n), "Customer"),
            None,
            Some(&customer(1)),
        );
    }

    #[test]
    fn changes_are_published_on_commit() {
        let feed = RelationChangeFeed::new();
        let rx = feed.subscribe();

        link(&feed, 1, 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.pending_len(TransactionId::new(1)), 1);

        feed.transaction_committed(TransactionId::new(1));
        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received.sequence, 1);
        assert_eq!(received.change_type, ChangeType::Linked);
        assert_eq!(received.new_related_object, Some(customer(1)));
        assert_eq!(feed.pending_len(TransactionId::new(1)), 0);
    }

    #[test]
    fn rollback_drops_pending_changes() {
        let feed = RelationChangeFeed::new();
        link(&feed, 1, 1);
        feed.transaction_rolled_back(TransactionId::new(1));
        feed.transaction_committed(TransactionId::new(1));
        assert_eq!(feed.history_len(), 0);
    }

    #[test]
    fn transactions_are_buffered_separately() {
        let feed = RelationChangeFeed::new();
        link(&feed, 1, 1);
        link(&feed, 2, 2);
        feed.transaction_committed(TransactionId::new(2));

        let events = feed.poll(0, 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transaction_id, TransactionId::new(2));
        assert_eq!(feed.pending_len(TransactionId::new(1)), 1);
    }

    #[test]
    fn change_types() {
        let feed = RelationChangeFeed::new();
        let id = RelationEndPointId::new(order(1), "Customer");
        let tx = TransactionId::new(1);
        feed.relation_changed(tx, &id, Some(&customer(1)), Some(&customer(2)));
        feed.relation_changed(tx, &id, Some(&customer(2)), None);
        feed.relation_changed(tx, &id, None, None);
        feed.transaction_committed(tx);

        let types: Vec<_> = feed.poll(0, 10).iter().map(|e| e.change_type).collect();
        assert_eq!(types, vec![ChangeType::Replaced, ChangeType::Unlinked]);
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = RelationChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);

        link(&feed, 1, 1);
        feed.transaction_committed(TransactionId::new(1));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn history_truncation() {
        let feed = RelationChangeFeed::with_max_history(5);
        for n in 1..=10 {
            link(&feed, 1, n);
        }
        feed.transaction_committed(TransactionId::new(1));

        assert_eq!(feed.history_len(), 5);
        let events = feed.poll(0, 100);
        assert_eq!(events[0].sequence, 6);
        assert_eq!(feed.latest_sequence(), 10);

        feed.truncate_history(9);
        assert_eq!(feed.history_len(), 2);
    }

    #[test]
    fn threaded_subscribe() {
        let feed = Arc::new(RelationChangeFeed::new());
        let rx = feed.subscribe();

        let feed_clone = Arc::clone(&feed);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            link(&feed_clone, 7, 3);
            feed_clone.transaction_committed(TransactionId::new(7));
        });

        let received = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(received.end_point_id.object_id(), &order(3));

        handle.join().unwrap();
    }
}
