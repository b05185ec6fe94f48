//! Real object end point: the foreign-key side of a relation.

use crate::data::{DataContainer, Value};
use crate::end_point::sync_state::{ObjectEndPointSyncState, SyncStateKind};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{MappingConfiguration, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::types::TransactionId;
use std::sync::Arc;

/// The 1:1 side of a relation that owns the foreign-key column.
///
/// The end point keeps no value of its own. It is a typed view over the
/// foreign-key [`PropertyValue`](crate::data::PropertyValue) of the owning
/// data container, and every change-tracking operation delegates to it.
/// Access through the end point never raises property-read notifications.
#[derive(Debug, Clone)]
pub struct RealObjectEndPoint {
    id: RelationEndPointId,
    definition: Arc<RelationEndPointDefinition>,
    transaction_id: TransactionId,
    sync_state: Arc<dyn ObjectEndPointSyncState>,
}

impl RealObjectEndPoint {
    /// Creates a real end point over `container`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidArgument`] if the definition is virtual
    /// or anonymous, names another property than `id`, or if the container
    /// belongs to another object or to a class that does not declare the
    /// relation.
    pub fn new(
        transaction_id: TransactionId,
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
        container: &DataContainer,
        mapping: &MappingConfiguration,
        sync_state: Arc<dyn ObjectEndPointSyncState>,
    ) -> CoreResult<Self> {
        if definition.is_virtual() || definition.is_anonymous() {
            return Err(CoreError::invalid_argument(format!(
                "end point '{id}' cannot be a real object end point: '{definition}' is virtual"
            )));
        }
        if definition.property_name() != Some(id.property_name()) {
            return Err(CoreError::invalid_argument(format!(
                "definition '{definition}' does not describe end point '{id}'"
            )));
        }
        if container.id() != id.object_id() {
            return Err(CoreError::invalid_argument(format!(
                "data container of '{}' cannot back end point '{id}'",
                container.id()
            )));
        }
        if !mapping.is_same_or_base_class(definition.class_id(), container.class_id()) {
            return Err(CoreError::invalid_argument(format!(
                "data container of class '{}' is not compatible with '{definition}'",
                container.class_id()
            )));
        }
        container.property_value(id.property_name())?;

        Ok(Self {
            id,
            definition,
            transaction_id,
            sync_state,
        })
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

    /// Returns the name of the backing foreign-key property.
    #[must_use]
    pub fn foreign_key_property(&self) -> &str {
        self.id.property_name()
    }

    /// Returns the current synchronization state.
    #[must_use]
    pub fn sync_state(&self) -> &Arc<dyn ObjectEndPointSyncState> {
        &self.sync_state
    }

    /// Returns the kind of the current synchronization state.
    #[must_use]
    pub fn sync_state_kind(&self) -> SyncStateKind {
        self.sync_state.kind()
    }

    pub(crate) fn set_sync_state(&mut self, sync_state: Arc<dyn ObjectEndPointSyncState>) {
        self.sync_state = sync_state;
    }

    /// Returns the current opposite object.
    pub fn opposite_object_id<'a>(
        &self,
        container: &'a DataContainer,
    ) -> CoreResult<Option<&'a ObjectId>> {
        self.check_container(container)?;
        Ok(container.value(self.foreign_key_property())?.as_object_id())
    }

    /// Returns the opposite object as of the last load or commit.
    pub fn original_opposite_object_id<'a>(
        &self,
        container: &'a DataContainer,
    ) -> CoreResult<Option<&'a ObjectId>> {
        self.check_container(container)?;
        Ok(container
            .original_value(self.foreign_key_property())?
            .as_object_id())
    }

    /// Writes the foreign key. Marks the end point as touched even if the value is unchanged.
    pub fn set_opposite_object_id(
        &self,
        container: &mut DataContainer,
        opposite: Option<&ObjectId>,
    ) -> CoreResult<()> {
        self.check_container(container)?;
        container.set_value(self.foreign_key_property(), Value::from_object_id(opposite))
    }

    /// Returns `true` if the foreign key differs from its original value.
    pub fn has_changed(&self, container: &DataContainer) -> CoreResult<bool> {
        self.check_container(container)?;
        Ok(container
            .property_value(self.foreign_key_property())?
            .has_changed())
    }

    /// Returns `true` if the foreign key was written or touched.
    pub fn has_been_touched(&self, container: &DataContainer) -> CoreResult<bool> {
        self.check_container(container)?;
        Ok(container
            .property_value(self.foreign_key_property())?
            .has_been_touched())
    }

    /// Marks the foreign key as touched.
    pub fn touch(&self, container: &mut DataContainer) -> CoreResult<()> {
        self.check_container(container)?;
        container.touch_value(self.foreign_key_property())
    }

    /// Makes the current foreign key the new original.
    pub fn commit(&self, container: &mut DataContainer) -> CoreResult<()> {
        self.check_container(container)?;
        container
            .property_value_mut(self.foreign_key_property())?
            .commit();
        Ok(())
    }

    /// Restores the original foreign key.
    pub fn rollback(&self, container: &mut DataContainer) -> CoreResult<()> {
        self.check_container(container)?;
        container
            .property_value_mut(self.foreign_key_property())?
            .rollback();
        Ok(())
    }

    /// Takes over the current foreign key of `source`, keeping the original.
    pub fn take_over_committed_data(
        &self,
        container: &mut DataContainer,
        source: &DataContainer,
    ) -> CoreResult<()> {
        self.check_container(container)?;
        self.check_container(source)?;
        let value = source.property_value(self.foreign_key_property())?.clone();
        container
            .property_value_mut(self.foreign_key_property())?
            .take_over_committed_data(&value);
        Ok(())
    }

    fn check_container(&self, container: &DataContainer) -> CoreResult<()> {
        if container.id() != self.id.object_id() {
            return Err(CoreError::invalid_argument(format!(
                "data container of '{}' does not back end point '{}'",
                container.id(),
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::end_point::SynchronizedObjectEndPointSyncState;
    use crate::mapping::{ClassDefinition, RelationDefinition};
    use crate::types::ClassId;

    fn mapping() -> Arc<MappingConfiguration> {
        MappingConfiguration::builder()
            .class(ClassDefinition::new("Customer"))
            .class(ClassDefinition::new("Order"))
            .class(ClassDefinition::new("SpecialOrder").with_base_class("Order"))
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

    fn customer(n: u8) -> ObjectId {
        ObjectId::from_bytes(ClassId::new("Customer"), [n; 16])
    }

    fn loaded_order(class: &str, customer_id: &ObjectId) -> DataContainer {
        let mut container = DataContainer::existing(
            ObjectId::from_bytes(ClassId::new(class), [9; 16]),
            [("Customer".to_string(), Value::from(customer_id.clone()))],
        );
        container.complete_properties(&mapping()).unwrap();
        container
    }

    fn end_point(container: &DataContainer) -> CoreResult<RealObjectEndPoint> {
        let mapping = mapping();
        let definition = mapping
            .end_point_definition(&ClassId::new("Order"), "Customer")
            .unwrap();
        RealObjectEndPoint::new(
            TransactionId::new(1),
            RelationEndPointId::new(container.id().clone(), "Customer"),
            definition,
            container,
            &mapping,
            Arc::new(SynchronizedObjectEndPointSyncState),
        )
    }

    #[test]
    fn reads_foreign_key_from_container() {
        let container = loaded_order("Order", &customer(1));
        let end_point = end_point(&container).unwrap();
        assert_eq!(
            end_point.opposite_object_id(&container).unwrap(),
            Some(&customer(1))
        );
        assert_eq!(end_point.sync_state_kind(), SyncStateKind::Synchronized);
    }

    #[test]
    fn derived_class_container_is_accepted() {
        let container = loaded_order("SpecialOrder", &customer(1));
        assert!(end_point(&container).is_ok());
    }

    #[test]
    fn virtual_definition_is_rejected() {
        let mapping = mapping();
        let container = loaded_order("Order", &customer(1));
        let virtual_definition = mapping
            .end_point_definition(&ClassId::new("Customer"), "Orders")
            .unwrap();
        let err = RealObjectEndPoint::new(
            TransactionId::new(1),
            RelationEndPointId::new(container.id().clone(), "Orders"),
            virtual_definition,
            &container,
            &mapping,
            Arc::new(SynchronizedObjectEndPointSyncState),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn incompatible_container_is_rejected() {
        let mapping = mapping();
        let mut customer_container = DataContainer::existing(customer(2), []);
        customer_container.complete_properties(&mapping).unwrap();
        let definition = mapping
            .end_point_definition(&ClassId::new("Order"), "Customer")
            .unwrap();
        let err = RealObjectEndPoint::new(
            TransactionId::new(1),
            RelationEndPointId::new(customer(2), "Customer"),
            definition,
            &customer_container,
            &mapping,
            Arc::new(SynchronizedObjectEndPointSyncState),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn change_tracking_delegates_to_property_value() {
        let mut container = loaded_order("Order", &customer(1));
        let end_point = end_point(&container).unwrap();

        end_point
            .set_opposite_object_id(&mut container, Some(&customer(1)))
            .unwrap();
        assert!(!end_point.has_changed(&container).unwrap());
        assert!(end_point.has_been_touched(&container).unwrap());

        end_point
            .set_opposite_object_id(&mut container, Some(&customer(2)))
            .unwrap();
        assert!(end_point.has_changed(&container).unwrap());
        assert!(container.property_value("Customer").unwrap().has_changed());

        end_point.rollback(&mut container).unwrap();
        assert_eq!(
            end_point.opposite_object_id(&container).unwrap(),
            Some(&customer(1))
        );
        assert!(!end_point.has_been_touched(&container).unwrap());
    }

    #[test]
    fn commit_redefines_original() {
        let mut container = loaded_order("Order", &customer(1));
        let end_point = end_point(&container).unwrap();
        end_point.set_opposite_object_id(&mut container, None).unwrap();
        end_point.commit(&mut container).unwrap();

        assert_eq!(end_point.original_opposite_object_id(&container).unwrap(), None);
        assert!(!end_point.has_changed(&container).unwrap());
    }
}
