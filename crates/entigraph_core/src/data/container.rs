//! Data containers holding the persisted state of one object.

use crate::data::{PropertyValue, Value};
use crate::error::{CoreError, CoreResult};
use crate::mapping::MappingConfiguration;
use crate::object::ObjectId;
use crate::types::ClassId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle of a data container inside one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Lifecycle {
    New,
    Existing,
    Deleted { was_new: bool },
}

/// Observable state of a data container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataContainerState {
    /// Created in this transaction, never persisted.
    New,
    /// Loaded and not modified.
    Unchanged,
    /// Loaded and at least one property differs from its original value.
    Changed,
    /// Marked for deletion.
    Deleted,
}

/// Holds the persisted property values (including foreign keys) of one object.
///
/// Containers are owned by the transaction's data-container map. Real
/// object end points read and write their foreign key directly in here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataContainer {
    id: ObjectId,
    lifecycle: Lifecycle,
    properties: IndexMap<String, PropertyValue>,
}

impl DataContainer {
    /// Creates a container for an object that already exists in the backing store.
    pub fn existing(id: ObjectId, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            id,
            lifecycle: Lifecycle::Existing,
            properties: values
                .into_iter()
                .map(|(name, value)| (name, PropertyValue::new(value)))
                .collect(),
        }
    }

    /// Creates a container for a new object with every mapped property at its default.
    pub fn new_object(id: ObjectId, mapping: &MappingConfiguration) -> CoreResult<Self> {
        let mut container = Self {
            id,
            lifecycle: Lifecycle::New,
            properties: IndexMap::new(),
        };
        container.complete_properties(mapping)?;
        Ok(container)
    }

    /// Adds defaults for mapped properties the container lacks and rejects unmapped ones.
    pub(crate) fn complete_properties(&mut self, mapping: &MappingConfiguration) -> CoreResult<()> {
        mapping.class_definition(self.id.class_id())?;
        for name in self.properties.keys() {
            mapping.property_definition(self.id.class_id(), name)?;
        }

        let mut class_id = Some(self.id.class_id().clone());
        while let Some(current) = class_id {
            let class = mapping.class_definition(&current)?;
            for property in class.declared_properties() {
                if !self.properties.contains_key(property.name()) {
                    self.properties.insert(
                        property.name().to_string(),
                        PropertyValue::new(property.default_value()),
                    );
                }
            }
            class_id = class.base_class().cloned();
        }
        Ok(())
    }

    /// Returns the object ID.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns the object's class.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        self.id.class_id()
    }

    /// Returns the container state.
    #[must_use]
    pub fn state(&self) -> DataContainerState {
        match self.lifecycle {
            Lifecycle::New => DataContainerState::New,
            Lifecycle::Deleted { .. } => DataContainerState::Deleted,
            Lifecycle::Existing if self.properties.values().any(PropertyValue::has_changed) => {
                DataContainerState::Changed
            }
            Lifecycle::Existing => DataContainerState::Unchanged,
        }
    }

    /// Returns `true` if the container was created in this transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(
            self.lifecycle,
            Lifecycle::New | Lifecycle::Deleted { was_new: true }
        )
    }

    /// Returns `true` if the object has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Deleted { .. })
    }

    /// Returns `true` if any property has been written or touched.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.properties.values().any(PropertyValue::has_been_touched)
    }

    /// Returns the change-tracked value of a property.
    pub fn property_value(&self, name: &str) -> CoreResult<&PropertyValue> {
        self.properties.get(name).ok_or_else(|| self.unknown_property(name))
    }

    /// Returns the current value of a property without raising any notification.
    pub fn value(&self, name: &str) -> CoreResult<&Value> {
        self.property_value(name).map(PropertyValue::value)
    }

    /// Returns the original value of a property.
    pub fn original_value(&self, name: &str) -> CoreResult<&Value> {
        self.property_value(name).map(PropertyValue::original_value)
    }

    /// Writes a property value.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::ObjectDeleted`] for deleted objects.
    pub fn set_value(&mut self, name: &str, value: Value) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        self.property_value_mut(name)?.set_value(value);
        Ok(())
    }

    /// Marks a property as touched.
    pub fn touch_value(&mut self, name: &str) -> CoreResult<()> {
        self.property_value_mut(name)?.touch();
        Ok(())
    }

    /// Iterates over all properties.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn mark_deleted(&mut self) -> CoreResult<()> {
        self.ensure_not_deleted()?;
        let was_new = self.lifecycle == Lifecycle::New;
        self.lifecycle = Lifecycle::Deleted { was_new };
        Ok(())
    }

    pub(crate) fn commit(&mut self) {
        for value in self.properties.values_mut() {
            value.commit();
        }
        if self.lifecycle == Lifecycle::New {
            self.lifecycle = Lifecycle::Existing;
        }
    }

    pub(crate) fn rollback(&mut self) {
        for value in self.properties.values_mut() {
            value.rollback();
        }
        if self.lifecycle == (Lifecycle::Deleted { was_new: false }) {
            self.lifecycle = Lifecycle::Existing;
        }
        if self.lifecycle == (Lifecycle::Deleted { was_new: true }) {
            self.lifecycle = Lifecycle::New;
        }
    }

    /// Takes over the current property values of `source`, keeping this container's originals.
    pub fn take_over_committed_data(&mut self, source: &DataContainer) -> CoreResult<()> {
        if source.id != self.id {
            return Err(CoreError::invalid_argument(format!(
                "cannot take over data of '{}' into the container of '{}'",
                source.id, self.id
            )));
        }
        for (name, value) in &source.properties {
            self.property_value_mut(name)?
                .take_over_committed_data(value);
        }
        Ok(())
    }

    pub(crate) fn property_value_mut(&mut self, name: &str) -> CoreResult<&mut PropertyValue> {
        let id = &self.id;
        self.properties.get_mut(name).ok_or_else(|| {
            CoreError::invalid_argument(format!("object '{id}' has no property '{name}'"))
        })
    }

    fn ensure_not_deleted(&self) -> CoreResult<()> {
        if self.is_deleted() {
            return Err(CoreError::object_deleted(self.id.clone()));
        }
        Ok(())
    }

    fn unknown_property(&self, name: &str) -> CoreError {
        CoreError::invalid_argument(format!("object '{}' has no property '{name}'", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ClassDefinition, RelationDefinition};
    use std::sync::Arc;

    fn mapping() -> Arc<MappingConfiguration> {
        MappingConfiguration::builder()
            .class(ClassDefinition::new("Customer"))
            .class(ClassDefinition::new("Order").with_property("OrderNumber"))
            .relation(RelationDefinition::one_to_many(
                "CustomerToOrder",
                "Customer",
                "Orders",
                "Order",
                "Customer",
            ))
            .build()
            .unwrap()
    }

    fn order_id() -> ObjectId {
        ObjectId::from_bytes(ClassId::new("Order"), [1; 16])
    }

    #[test]
    fn new_object_has_all_mapped_properties() {
        let container = DataContainer::new_object(order_id(), &mapping()).unwrap();
        assert_eq!(container.state(), DataContainerState::New);
        assert_eq!(container.value("Customer").unwrap(), &Value::Null);
        assert_eq!(container.value("OrderNumber").unwrap(), &Value::Null);
    }

    #[test]
    fn existing_container_tracks_changes() {
        let mut container =
            DataContainer::existing(order_id(), [("OrderNumber".to_string(), Value::Integer(1))]);
        container.complete_properties(&mapping()).unwrap();
        assert_eq!(container.state(), DataContainerState::Unchanged);

        container.set_value("OrderNumber", Value::Integer(2)).unwrap();
        assert_eq!(container.state(), DataContainerState::Changed);

        container.rollback();
        assert_eq!(container.state(), DataContainerState::Unchanged);
    }

    #[test]
    fn unmapped_property_rejected() {
        let mut container =
            DataContainer::existing(order_id(), [("Bogus".to_string(), Value::Null)]);
        assert!(container.complete_properties(&mapping()).is_err());
    }

    #[test]
    fn deleted_container_rejects_writes() {
        let mut container = DataContainer::new_object(order_id(), &mapping()).unwrap();
        container.mark_deleted().unwrap();
        assert_eq!(container.state(), DataContainerState::Deleted);
        assert!(container.is_new());
        let err = container.set_value("OrderNumber", Value::Integer(1)).unwrap_err();
        assert!(matches!(err, CoreError::ObjectDeleted { .. }));
    }

    #[test]
    fn rollback_restores_deleted_existing_object() {
        let mut container = DataContainer::existing(order_id(), []);
        container.complete_properties(&mapping()).unwrap();
        container.mark_deleted().unwrap();
        container.rollback();
        assert_eq!(container.state(), DataContainerState::Unchanged);
    }

    #[test]
    fn commit_turns_new_into_unchanged() {
        let mut container = DataContainer::new_object(order_id(), &mapping()).unwrap();
        container.set_value("OrderNumber", Value::Integer(7)).unwrap();
        container.commit();
        assert_eq!(container.state(), DataContainerState::Unchanged);
        assert!(!container.has_been_touched());
    }

    #[test]
    fn take_over_requires_same_object() {
        let mapping = mapping();
        let mut target = DataContainer::new_object(order_id(), &mapping).unwrap();
        let other = DataContainer::new_object(
            ObjectId::from_bytes(ClassId::new("Order"), [2; 16]),
            &mapping,
        )
        .unwrap();
        assert!(target.take_over_committed_data(&other).is_err());
    }
}
