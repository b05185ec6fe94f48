//! Recording listeners and instrumented lazy loaders.

use entigraph_core::{
    ClientTransaction, ClientTransactionListener, CoreError, CoreResult, DataManagerLazyLoader,
    ObjectId, RelationEndPointId, RelationEndPointLazyLoader, TransactionId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One notification received by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A property was read.
    PropertyValueRead {
        /// Read object.
        object_id: ObjectId,
        /// Read property.
        property_name: String,
    },
    /// A relation is about to change.
    RelationChanging {
        /// Changing end point.
        end_point_id: RelationEndPointId,
        /// Related object before the change.
        old: Option<ObjectId>,
        /// Related object after the change.
        new: Option<ObjectId>,
    },
    /// A relation has changed.
    RelationChanged {
        /// Changed end point.
        end_point_id: RelationEndPointId,
        /// Related object before the change.
        old: Option<ObjectId>,
        /// Related object after the change.
        new: Option<ObjectId>,
    },
    /// An object is about to be deleted.
    ObjectDeleting(ObjectId),
    /// An object has been deleted.
    ObjectDeleted(ObjectId),
    /// The transaction is about to commit.
    Committing,
    /// The transaction has committed.
    Committed,
    /// The transaction has rolled back.
    RolledBack,
}

/// A listener recording every notification in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(TransactionId, ListenerEvent)>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns all recorded events.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the events recorded for one transaction.
    pub fn events_of(&self, transaction_id: TransactionId) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(id, _)| *id == transaction_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the `RelationChanged` events as `(end point, old, new)`.
    pub fn relation_changes(&self) -> Vec<(RelationEndPointId, Option<ObjectId>, Option<ObjectId>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ListenerEvent::RelationChanged {
                    end_point_id,
                    old,
                    new,
                } => Some((end_point_id, old, new)),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drops all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn record(&self, transaction_id: TransactionId, event: ListenerEvent) {
        self.events.lock().push((transaction_id, event));
    }
}

impl ClientTransactionListener for RecordingListener {
    fn property_value_read(
        &self,
        transaction_id: TransactionId,
        object_id: &ObjectId,
        property_name: &str,
    ) {
        self.record(
            transaction_id,
            ListenerEvent::PropertyValueRead {
                object_id: object_id.clone(),
                property_name: property_name.to_string(),
            },
        );
    }

    fn relation_changing(
        &self,
        transaction_id: TransactionId,
        end_point_id: &RelationEndPointId,
        old_related_object: Option<&ObjectId>,
        new_related_object: Option<&ObjectId>,
    ) {
        self.record(
            transaction_id,
            ListenerEvent::RelationChanging {
                end_point_id: end_point_id.clone(),
                old: old_related_object.cloned(),
                new: new_related_object.cloned(),
            },
        );
    }

    fn relation_changed(
        &self,
        transaction_id: TransactionId,
        end_point_id: &RelationEndPointId,
        old_related_object: Option<&ObjectId>,
        new_related_object: Option<&ObjectId>,
    ) {
        self.record(
            transaction_id,
            ListenerEvent::RelationChanged {
                end_point_id: end_point_id.clone(),
                old: old_related_object.cloned(),
                new: new_related_object.cloned(),
            },
        );
    }

    fn object_deleting(&self, transaction_id: TransactionId, object_id: &ObjectId) {
        self.record(transaction_id, ListenerEvent::ObjectDeleting(object_id.clone()));
    }

    fn object_deleted(&self, transaction_id: TransactionId, object_id: &ObjectId) {
        self.record(transaction_id, ListenerEvent::ObjectDeleted(object_id.clone()));
    }

    fn transaction_committing(&self, transaction_id: TransactionId) {
        self.record(transaction_id, ListenerEvent::Committing);
    }

    fn transaction_committed(&self, transaction_id: TransactionId) {
        self.record(transaction_id, ListenerEvent::Committed);
    }

    fn transaction_rolled_back(&self, transaction_id: TransactionId) {
        self.record(transaction_id, ListenerEvent::RolledBack);
    }
}

/// Which lazy-loader entry point was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    /// `load_lazy_collection_end_point`
    Collection,
    /// `load_lazy_virtual_object_end_point`
    VirtualObject,
    /// `load_opposite_end_point`
    Opposite,
}

/// A lazy loader counting its calls per end point before delegating.
#[derive(Debug)]
pub struct CountingLazyLoader {
    inner: Arc<dyn RelationEndPointLazyLoader>,
    calls: Mutex<HashMap<(LoadKind, RelationEndPointId), usize>>,
}

impl CountingLazyLoader {
    /// Counts calls into the [`DataManagerLazyLoader`].
    pub fn new() -> Arc<Self> {
        Self::wrapping(Arc::new(DataManagerLazyLoader))
    }

    /// Counts calls into `inner`.
    pub fn wrapping(inner: Arc<dyn RelationEndPointLazyLoader>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        })
    }

    /// Returns how often `kind` was called for `end_point_id`.
    pub fn calls(&self, kind: LoadKind, end_point_id: &RelationEndPointId) -> usize {
        self.calls
            .lock()
            .get(&(kind, end_point_id.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Returns how often `kind` was called for any end point.
    pub fn total_calls(&self, kind: LoadKind) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|((call_kind, _), _)| *call_kind == kind)
            .map(|(_, count)| *count)
            .sum()
    }

    fn count(&self, kind: LoadKind, end_point_id: &RelationEndPointId) {
        *self
            .calls
            .lock()
            .entry((kind, end_point_id.clone()))
            .or_insert(0) += 1;
    }
}

impl RelationEndPointLazyLoader for CountingLazyLoader {
    fn load_lazy_collection_end_point(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        self.count(LoadKind::Collection, end_point_id);
        self.inner
            .load_lazy_collection_end_point(transaction, end_point_id)
    }

    fn load_lazy_virtual_object_end_point(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        self.count(LoadKind::VirtualObject, end_point_id);
        self.inner
            .load_lazy_virtual_object_end_point(transaction, end_point_id)
    }

    fn load_opposite_end_point(
        &self,
        transaction: &mut ClientTransaction,
        real_end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        self.count(LoadKind::Opposite, real_end_point_id);
        self.inner
            .load_opposite_end_point(transaction, real_end_point_id)
    }
}

/// A lazy loader failing every call with [`CoreError::Load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingLazyLoader;

impl FailingLazyLoader {
    fn fail(end_point_id: &RelationEndPointId) -> CoreError {
        CoreError::load(format!("loading '{end_point_id}' failed"))
    }
}

impl RelationEndPointLazyLoader for FailingLazyLoader {
    fn load_lazy_collection_end_point(
        &self,
        _transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        Err(Self::fail(end_point_id))
    }

    fn load_lazy_virtual_object_end_point(
        &self,
        _transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        Err(Self::fail(end_point_id))
    }

    fn load_opposite_end_point(
        &self,
        _transaction: &mut ClientTransaction,
        real_end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        Err(Self::fail(real_end_point_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{end_point, TestDomain};

    #[test]
    fn test_recording_listener_sees_relation_change() {
        let domain = TestDomain::seeded();
        let listener = RecordingListener::new();
        let mut tx = domain.builder().listener(listener.clone()).build();

        tx.set_related_object(&domain.computer2, "Employee", Some(&domain.employee2))
            .unwrap();

        let changes = listener.relation_changes();
        assert!(changes.contains(&(
            end_point(&domain.computer2, "Employee"),
            None,
            Some(domain.employee2.clone())
        )));
        assert!(changes.contains(&(
            end_point(&domain.employee2, "Computer"),
            None,
            Some(domain.computer2.clone())
        )));
        assert_eq!(listener.events_of(tx.id()).len(), listener.len());
    }

    #[test]
    fn test_counting_loader_counts_per_end_point() {
        let domain = TestDomain::seeded();
        let loader = CountingLazyLoader::new();
        let mut tx = domain.builder().lazy_loader(loader.clone()).build();
        let orders = end_point(&domain.customer1, "Orders");

        tx.related_objects(&domain.customer1, "Orders").unwrap();
        tx.related_objects(&domain.customer1, "Orders").unwrap();

        assert_eq!(loader.calls(LoadKind::Collection, &orders), 1);
        assert_eq!(loader.total_calls(LoadKind::VirtualObject), 0);
    }

    #[test]
    fn test_failing_loader_error_is_propagated() {
        let domain = TestDomain::seeded();
        let mut tx = domain
            .builder()
            .lazy_loader(Arc::new(FailingLazyLoader))
            .build();
        let err = tx.related_objects(&domain.customer1, "Orders").unwrap_err();
        assert!(matches!(err, CoreError::Load { .. }));
    }
}
