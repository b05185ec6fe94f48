//! Per-transaction map of relation end points.

use crate::end_point::{
    CollectionEndPoint, RealObjectEndPoint, RelationEndPoint, RelationEndPointId,
    VirtualObjectEndPoint,
};
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use indexmap::IndexMap;

/// Owns the end points of one transaction, in registration order.
///
/// Commands and sync states refer to end points by [`RelationEndPointId`]
/// and resolve them here on every access.
#[derive(Debug, Clone, Default)]
pub struct RelationEndPointMap {
    end_points: IndexMap<RelationEndPointId, RelationEndPoint>,
}

impl RelationEndPointMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an end point, if registered.
    #[must_use]
    pub fn get(&self, id: &RelationEndPointId) -> Option<&RelationEndPoint> {
        self.end_points.get(id)
    }

    /// Returns an end point or an end-point-not-found error.
    pub fn get_required(&self, id: &RelationEndPointId) -> CoreResult<&RelationEndPoint> {
        self.end_points
            .get(id)
            .ok_or_else(|| CoreError::end_point_not_found(id.clone()))
    }

    /// Returns an end point mutably or an end-point-not-found error.
    pub fn get_required_mut(&mut self, id: &RelationEndPointId) -> CoreResult<&mut RelationEndPoint> {
        self.end_points
            .get_mut(id)
            .ok_or_else(|| CoreError::end_point_not_found(id.clone()))
    }

    /// Returns `true` if the end point is registered.
    #[must_use]
    pub fn contains(&self, id: &RelationEndPointId) -> bool {
        self.end_points.contains_key(id)
    }

    /// Returns the real object end point registered under `id`.
    pub fn real_object(&self, id: &RelationEndPointId) -> CoreResult<&RealObjectEndPoint> {
        self.get_required(id)?
            .as_real_object()
            .ok_or_else(|| wrong_kind(id, "real object"))
    }

    /// Returns the real object end point registered under `id` mutably.
    pub fn real_object_mut(&mut self, id: &RelationEndPointId) -> CoreResult<&mut RealObjectEndPoint> {
        match self.get_required_mut(id)? {
            RelationEndPoint::RealObject(end_point) => Ok(end_point),
            _ => Err(wrong_kind(id, "real object")),
        }
    }

    /// Returns the virtual object end point registered under `id`.
    pub fn virtual_object(&self, id: &RelationEndPointId) -> CoreResult<&VirtualObjectEndPoint> {
        self.get_required(id)?
            .as_virtual_object()
            .ok_or_else(|| wrong_kind(id, "virtual object"))
    }

    /// Returns the virtual object end point registered under `id` mutably.
    pub fn virtual_object_mut(
        &mut self,
        id: &RelationEndPointId,
    ) -> CoreResult<&mut VirtualObjectEndPoint> {
        match self.get_required_mut(id)? {
            RelationEndPoint::VirtualObject(end_point) => Ok(end_point),
            _ => Err(wrong_kind(id, "virtual object")),
        }
    }

    /// Returns the collection end point registered under `id`.
    pub fn collection(&self, id: &RelationEndPointId) -> CoreResult<&CollectionEndPoint> {
        self.get_required(id)?
            .as_collection()
            .ok_or_else(|| wrong_kind(id, "collection"))
    }

    /// Returns the collection end point registered under `id` mutably.
    pub fn collection_mut(&mut self, id: &RelationEndPointId) -> CoreResult<&mut CollectionEndPoint> {
        match self.get_required_mut(id)? {
            RelationEndPoint::Collection(end_point) => Ok(end_point),
            _ => Err(wrong_kind(id, "collection")),
        }
    }

    /// Registers an end point.
    ///
    /// # Errors
    ///
    /// Fails if an end point with the same ID is already registered.
    pub fn register(&mut self, end_point: RelationEndPoint) -> CoreResult<()> {
        if self.end_points.contains_key(end_point.id()) {
            return Err(CoreError::invalid_operation(format!(
                "end point '{}' is already registered",
                end_point.id()
            )));
        }
        self.end_points.insert(end_point.id().clone(), end_point);
        Ok(())
    }

    /// Removes an end point.
    pub fn remove(&mut self, id: &RelationEndPointId) -> Option<RelationEndPoint> {
        self.end_points.shift_remove(id)
    }

    /// Removes every end point of `object_id`.
    pub fn remove_object(&mut self, object_id: &ObjectId) -> Vec<RelationEndPoint> {
        let ids: Vec<RelationEndPointId> = self
            .end_points
            .keys()
            .filter(|id| id.object_id() == object_id)
            .cloned()
            .collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Iterates over all end points in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RelationEndPoint> {
        self.end_points.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RelationEndPoint> {
        self.end_points.values_mut()
    }

    /// Returns the IDs of all end points.
    #[must_use]
    pub fn ids(&self) -> Vec<RelationEndPointId> {
        self.end_points.keys().cloned().collect()
    }

    /// Returns the number of registered end points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_points.len()
    }

    /// Returns `true` if no end point is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end_points.is_empty()
    }
}

fn wrong_kind(id: &RelationEndPointId, expected: &str) -> CoreError {
    CoreError::invalid_argument(format!("end point '{id}' is not a {expected} end point"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ClassDefinition, MappingConfiguration, RelationDefinition};
    use crate::types::{ClassId, TransactionId};

    fn collection_end_point(customer: &ObjectId) -> RelationEndPoint {
        let mapping = MappingConfiguration::builder()
            .class(ClassDefinition::new("Customer"))
            .class(ClassDefinition::new("Order"))
            .relation(RelationDefinition::one_to_many(
                "CustomerToOrder",
                "Customer",
                "Orders",
                "Order",
                "Customer",
            ))
            .build()
            .unwrap();
        let definition = mapping
            .end_point_definition(&ClassId::new("Customer"), "Orders")
            .unwrap();
        CollectionEndPoint::new(
            TransactionId::new(1),
            RelationEndPointId::new(customer.clone(), "Orders"),
            definition,
            [],
        )
        .unwrap()
        .into()
    }

    #[test]
    fn register_and_lookup_by_kind() {
        let customer = ObjectId::from_bytes(ClassId::new("Customer"), [1; 16]);
        let id = RelationEndPointId::new(customer.clone(), "Orders");
        let mut map = RelationEndPointMap::new();
        map.register(collection_end_point(&customer)).unwrap();

        assert!(map.collection(&id).is_ok());
        assert!(matches!(
            map.real_object(&id),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(map.register(collection_end_point(&customer)).is_err());
    }

    #[test]
    fn missing_end_point_is_reported() {
        let customer = ObjectId::from_bytes(ClassId::new("Customer"), [1; 16]);
        let map = RelationEndPointMap::new();
        let err = map
            .get_required(&RelationEndPointId::new(customer, "Orders"))
            .unwrap_err();
        assert!(matches!(err, CoreError::EndPointNotFound { .. }));
    }

    #[test]
    fn remove_object_drops_all_its_end_points() {
        let customer = ObjectId::from_bytes(ClassId::new("Customer"), [1; 16]);
        let mut map = RelationEndPointMap::new();
        map.register(collection_end_point(&customer)).unwrap();
        assert_eq!(map.remove_object(&customer).len(), 1);
        assert!(map.is_empty());
    }
}
