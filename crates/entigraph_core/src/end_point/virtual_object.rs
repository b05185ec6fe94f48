//! Virtual object end point: the 1:1 side without a foreign-key column.

use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{EndPointKind, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::types::TransactionId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Loaded data of a virtual object end point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualObjectData {
    current: Option<ObjectId>,
    original: Option<ObjectId>,
    touched: bool,
}

impl VirtualObjectData {
    fn new(opposite: Option<ObjectId>) -> Self {
        Self {
            original: opposite.clone(),
            current: opposite,
            touched: false,
        }
    }

    /// Returns the current opposite object.
    #[must_use]
    pub fn current(&self) -> Option<&ObjectId> {
        self.current.as_ref()
    }

    /// Returns the opposite object as of the last load or commit.
    #[must_use]
    pub fn original(&self) -> Option<&ObjectId> {
        self.original.as_ref()
    }

    /// Returns `true` if a write or touch happened since the last commit or rollback.
    #[must_use]
    pub fn touched(&self) -> bool {
        self.touched
    }
}

/// Cached value of a virtual object end point.
///
/// The value is derived from the opposite real end point. It is resolved
/// lazily and dropped again when the end point is unloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualObjectCache {
    /// Never resolved in this transaction.
    NotLoaded,
    /// Resolved and tracked.
    Loaded(VirtualObjectData),
    /// Resolved once, then dropped; the next access resolves it again.
    Invalidated,
}

/// The 1:1 side of a relation that has no column of its own.
#[derive(Debug, Clone)]
pub struct VirtualObjectEndPoint {
    id: RelationEndPointId,
    definition: Arc<RelationEndPointDefinition>,
    transaction_id: TransactionId,
    cache: VirtualObjectCache,
    registered_opposite_end_points: IndexSet<RelationEndPointId>,
}

impl VirtualObjectEndPoint {
    /// Creates an end point whose value has not been resolved yet.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidArgument`] unless `definition` is a
    /// virtual 1:1 side named like `id`.
    pub fn new(
        transaction_id: TransactionId,
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
    ) -> CoreResult<Self> {
        if definition.kind() != EndPointKind::VirtualObject
            || definition.property_name() != Some(id.property_name())
        {
            return Err(CoreError::invalid_argument(format!(
                "definition '{definition}' cannot back virtual object end point '{id}'"
            )));
        }
        Ok(Self {
            id,
            definition,
            transaction_id,
            cache: VirtualObjectCache::NotLoaded,
            registered_opposite_end_points: IndexSet::new(),
        })
    }

    /// Creates an end point with a known opposite object.
    pub fn new_complete(
        transaction_id: TransactionId,
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
        opposite: Option<ObjectId>,
    ) -> CoreResult<Self> {
        let mut end_point = Self::new(transaction_id, id, definition)?;
        end_point.cache = VirtualObjectCache::Loaded(VirtualObjectData::new(opposite));
        Ok(end_point)
    }

    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the relation definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<RelationEndPointDefinition> {
        &self.definition
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Returns the cache state.
    #[must_use]
    pub fn cache(&self) -> &VirtualObjectCache {
        &self.cache
    }

    /// Returns `true` if the opposite object has been resolved.
    #[must_use]
    pub fn is_data_complete(&self) -> bool {
        matches!(self.cache, VirtualObjectCache::Loaded(_))
    }

    /// Returns the current opposite object.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidOperation`] if the value is not loaded.
    pub fn opposite_object_id(&self) -> CoreResult<Option<&ObjectId>> {
        self.data().map(VirtualObjectData::current)
    }

    /// Returns the opposite object as of the last load or commit.
    pub fn original_opposite_object_id(&self) -> CoreResult<Option<&ObjectId>> {
        self.data().map(VirtualObjectData::original)
    }

    /// Returns `true` if the current value differs from the original one.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        match &self.cache {
            VirtualObjectCache::Loaded(data) => data.current != data.original,
            _ => false,
        }
    }

    /// Returns `true` if the end point was written or touched.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        match &self.cache {
            VirtualObjectCache::Loaded(data) => data.touched,
            _ => false,
        }
    }

    /// Returns the real end points pointing at this end point's object.
    #[must_use]
    pub fn registered_opposite_end_points(&self) -> &IndexSet<RelationEndPointId> {
        &self.registered_opposite_end_points
    }

    pub(crate) fn register_opposite_end_point(&mut self, end_point_id: RelationEndPointId) {
        self.registered_opposite_end_points.insert(end_point_id);
    }

    pub(crate) fn unregister_opposite_end_point(&mut self, end_point_id: &RelationEndPointId) {
        self.registered_opposite_end_points.shift_remove(end_point_id);
    }

    pub(crate) fn mark_data_complete(&mut self, opposite: Option<ObjectId>) -> CoreResult<()> {
        if self.is_data_complete() {
            return Err(CoreError::invalid_operation(format!(
                "end point '{}' is already complete",
                self.id
            )));
        }
        self.cache = VirtualObjectCache::Loaded(VirtualObjectData::new(opposite));
        Ok(())
    }

    /// Drops the loaded value.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidOperation`] if the end point has changed.
    pub fn invalidate(&mut self) -> CoreResult<()> {
        if self.has_changed() {
            return Err(CoreError::invalid_operation(format!(
                "end point '{}' cannot be unloaded because it has changed",
                self.id
            )));
        }
        if self.is_data_complete() {
            self.cache = VirtualObjectCache::Invalidated;
        }
        Ok(())
    }

    pub(crate) fn set_opposite_object_id(&mut self, opposite: Option<&ObjectId>) -> CoreResult<()> {
        let data = self.data_mut()?;
        data.current = opposite.cloned();
        data.touched = true;
        Ok(())
    }

    /// Adds `object_id` as current and original value of an empty end point.
    pub(crate) fn synchronize_opposite(&mut self, object_id: &ObjectId) -> CoreResult<()> {
        let id = self.id.clone();
        let data = self.data_mut()?;
        match (&data.current, &data.original) {
            (Some(current), _) if current == object_id => Ok(()),
            (None, None) => {
                data.current = Some(object_id.clone());
                data.original = Some(object_id.clone());
                Ok(())
            }
            _ => Err(CoreError::invalid_operation(format!(
                "'{object_id}' cannot be synchronized into '{id}' because it already holds another object"
            ))),
        }
    }

    /// Marks the end point as touched.
    pub fn touch(&mut self) -> CoreResult<()> {
        self.data_mut()?.touched = true;
        Ok(())
    }

    /// Makes the current value the new original.
    pub fn commit(&mut self) {
        if let VirtualObjectCache::Loaded(data) = &mut self.cache {
            if data.current != data.original {
                data.original = data.current.clone();
            }
            data.touched = false;
        }
    }

    /// Restores the original value.
    pub fn rollback(&mut self) {
        if let VirtualObjectCache::Loaded(data) = &mut self.cache {
            if data.current != data.original {
                data.current = data.original.clone();
            }
            data.touched = false;
        }
    }

    /// Takes over the current value of `source`, keeping this end point's original.
    pub fn take_over_committed_data(&mut self, source: &VirtualObjectEndPoint) -> CoreResult<()> {
        if source.id != self.id {
            return Err(CoreError::invalid_argument(format!(
                "cannot take over data of '{}' into '{}'",
                source.id, self.id
            )));
        }
        let source_data = source.data()?.clone();
        let data = self.data_mut()?;
        data.current = source_data.current;
        if source_data.touched || data.current != data.original {
            data.touched = true;
        }
        Ok(())
    }

    pub(crate) fn restore(
        &mut self,
        cache: VirtualObjectCache,
        registered: impl IntoIterator<Item = RelationEndPointId>,
    ) {
        self.cache = cache;
        self.registered_opposite_end_points = registered.into_iter().collect();
    }

    fn data(&self) -> CoreResult<&VirtualObjectData> {
        match &self.cache {
            VirtualObjectCache::Loaded(data) => Ok(data),
            _ => Err(not_loaded(&self.id)),
        }
    }

    fn data_mut(&mut self) -> CoreResult<&mut VirtualObjectData> {
        match &mut self.cache {
            VirtualObjectCache::Loaded(data) => Ok(data),
            _ => Err(not_loaded(&self.id)),
        }
    }
}

fn not_loaded(id: &RelationEndPointId) -> CoreError {
    CoreError::invalid_operation(format!("end point '{id}' is not loaded"))
}
