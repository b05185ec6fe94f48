//! Persistence source: the backing store data containers are loaded from.
//!
//! The engine only needs three operations from a store: load one object,
//! load the objects whose foreign key points at a given object, and persist
//! the changes of a commit. [`InMemoryPersistenceSource`] implements them
//! over a map and is used by tests and ephemeral setups.

mod memory;

pub use memory::InMemoryPersistenceSource;

use crate::data::{DataContainer, Value};
use crate::end_point::RelationEndPointId;
use crate::error::CoreResult;
use crate::mapping::RelationEndPointDefinition;
use crate::object::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a commit did to one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersistedChangeKind {
    /// The object was created in the committed transaction.
    New,
    /// At least one property of an existing object changed.
    Changed,
    /// The object was deleted.
    Deleted,
}

/// One object's change as handed to the persistence source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedChange {
    /// The changed object.
    pub object_id: ObjectId,
    /// Kind of change.
    pub kind: PersistedChangeKind,
    /// Current values of all properties; empty for deletions.
    pub values: Vec<(String, Value)>,
}

/// Backing store of a client transaction.
///
/// Implementations must be shareable across threads; a transaction holds
/// the source behind an `Arc`.
pub trait PersistenceSource: fmt::Debug + Send + Sync {
    /// Loads one object, `None` if it does not exist.
    fn load_data_container(&self, object_id: &ObjectId) -> CoreResult<Option<DataContainer>>;

    /// Loads every object whose foreign key `real_definition` points at the
    /// owner of `end_point_id`, in store order.
    fn load_related_data_containers(
        &self,
        end_point_id: &RelationEndPointId,
        real_definition: &RelationEndPointDefinition,
    ) -> CoreResult<Vec<DataContainer>>;

    /// Applies the changes of one commit, all or nothing.
    fn persist(&self, changes: &[PersistedChange]) -> CoreResult<()>;
}
