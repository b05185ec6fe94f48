//! Transaction event listeners.

use crate::end_point::RelationEndPointId;
use crate::object::ObjectId;
use crate::types::TransactionId;

/// Receives notifications about what happens inside a client transaction.
///
/// Every method has an empty default, so listeners only implement what
/// they observe. Listeners are called synchronously on the transaction's
/// thread and must not fail.
#[allow(unused_variables)]
pub trait ClientTransactionListener: Send + Sync {
    /// A property was read through the transaction's user-facing accessor.
    fn property_value_read(
        &self,
        transaction_id: TransactionId,
        object_id: &ObjectId,
        property_name: &str,
    ) {
    }

    /// A relation is about to change.
    fn relation_changing(
        &self,
        transaction_id: TransactionId,
        end_point_id: &RelationEndPointId,
        old_related_object: Option<&ObjectId>,
        new_related_object: Option<&ObjectId>,
    ) {
    }

    /// A relation has changed.
    fn relation_changed(
        &self,
        transaction_id: TransactionId,
        end_point_id: &RelationEndPointId,
        old_related_object: Option<&ObjectId>,
        new_related_object: Option<&ObjectId>,
    ) {
    }

    /// An object is about to be deleted.
    fn object_deleting(&self, transaction_id: TransactionId, object_id: &ObjectId) {}

    /// An object has been deleted.
    fn object_deleted(&self, transaction_id: TransactionId, object_id: &ObjectId) {}

    /// The transaction is about to commit.
    fn transaction_committing(&self, transaction_id: TransactionId) {}

    /// The transaction has committed.
    fn transaction_committed(&self, transaction_id: TransactionId) {}

    /// The transaction has rolled back.
    fn transaction_rolled_back(&self, transaction_id: TransactionId) {}
}
