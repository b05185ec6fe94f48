//! Per-transaction map of data containers.

use crate::data::DataContainer;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use indexmap::IndexMap;

/// Owns the data containers registered in one transaction, in registration order.
#[derive(Debug, Clone, Default)]
pub struct DataContainerMap {
    containers: IndexMap<ObjectId, DataContainer>,
}

impl DataContainerMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the container of an object, if registered.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&DataContainer> {
        self.containers.get(id)
    }

    /// Returns the container of an object or an object-not-found error.
    pub fn get_required(&self, id: &ObjectId) -> CoreResult<&DataContainer> {
        self.containers
            .get(id)
            .ok_or_else(|| CoreError::object_not_found(id.clone()))
    }

    /// Returns the container of an object mutably or an object-not-found error.
    pub fn get_required_mut(&mut self, id: &ObjectId) -> CoreResult<&mut DataContainer> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| CoreError::object_not_found(id.clone()))
    }

    /// Returns `true` if the object has a registered container.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.containers.contains_key(id)
    }

    /// Registers a container.
    ///
    /// # Errors
    ///
    /// Fails if a container for the same object is already registered.
    pub fn register(&mut self, container: DataContainer) -> CoreResult<()> {
        if self.containers.contains_key(container.id()) {
            return Err(CoreError::invalid_operation(format!(
                "a data container for '{}' is already registered",
                container.id()
            )));
        }
        self.containers.insert(container.id().clone(), container);
        Ok(())
    }

    /// Removes a container, keeping the order of the remaining ones.
    pub fn discard(&mut self, id: &ObjectId) -> Option<DataContainer> {
        self.containers.shift_remove(id)
    }

    /// Iterates over all containers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DataContainer> {
        self.containers.values_mut()
    }

    /// Returns the IDs of all registered objects in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.containers.keys().cloned().collect()
    }

    /// Returns the number of registered containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns `true` if no container is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
