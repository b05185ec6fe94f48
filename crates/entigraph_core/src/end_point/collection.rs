//! Collection end point: the "many" side of a 1:many relation.

use crate::command::{CollectionCommandKind, CollectionEndPointCommand};
use crate::config::ChangeDetection;
use crate::end_point::{DomainObjectCollection, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::mapping::{EndPointKind, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::types::TransactionId;
use indexmap::IndexSet;
use std::sync::Arc;

/// The virtual side of a 1:many relation.
///
/// Holds the current opposite objects plus a snapshot of the collection as
/// of the last load or commit. Both are separate collection instances for
/// the whole lifetime of the end point; commit, rollback and take-over only
/// replace their contents.
///
/// The collections are exposed read-only. Insert, remove, replace and bulk
/// set are requested through the `create_*_command` methods and applied by
/// performing the returned commands.
#[derive(Debug, Clone)]
pub struct CollectionEndPoint {
    id: RelationEndPointId,
    definition: Arc<RelationEndPointDefinition>,
    transaction_id: TransactionId,
    change_detection: ChangeDetection,
    is_data_complete: bool,
    opposite_domain_objects: DomainObjectCollection,
    original_opposite_domain_objects: DomainObjectCollection,
    touched: bool,
    registered_opposite_end_points: IndexSet<RelationEndPointId>,
}

impl CollectionEndPoint {
    /// Creates a complete end point holding `initial`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidArgument`] if `definition` is not a
    /// collection side named like `id` or if `initial` holds duplicates.
    pub fn new(
        transaction_id: TransactionId,
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
        initial: impl IntoIterator<Item = ObjectId>,
    ) -> CoreResult<Self> {
        let mut end_point = Self::new_incomplete(transaction_id, id, definition)?;
        end_point.mark_data_complete(initial)?;
        Ok(end_point)
    }

    /// Creates an end point whose contents have not been loaded yet.
    pub fn new_incomplete(
        transaction_id: TransactionId,
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
    ) -> CoreResult<Self> {
        if definition.kind() != EndPointKind::Collection
            || definition.property_name() != Some(id.property_name())
        {
            return Err(CoreError::invalid_argument(format!(
                "definition '{definition}' cannot back collection end point '{id}'"
            )));
        }
        Ok(Self {
            id,
            definition,
            transaction_id,
            change_detection: ChangeDetection::default(),
            is_data_complete: false,
            opposite_domain_objects: DomainObjectCollection::new(),
            original_opposite_domain_objects: DomainObjectCollection::new(),
            touched: false,
            registered_opposite_end_points: IndexSet::new(),
        })
    }

    /// Sets how [`has_changed`](Self::has_changed) compares the collections.
    #[must_use]
    pub fn with_change_detection(mut self, change_detection: ChangeDetection) -> Self {
        self.change_detection = change_detection;
        self
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

    /// Returns the change detection strategy.
    #[must_use]
    pub fn change_detection(&self) -> ChangeDetection {
        self.change_detection
    }

    /// Returns `true` if the contents have been loaded.
    #[must_use]
    pub fn is_data_complete(&self) -> bool {
        self.is_data_complete
    }

    /// Returns the current opposite objects.
    #[must_use]
    pub fn opposite_domain_objects(&self) -> &DomainObjectCollection {
        &self.opposite_domain_objects
    }

    /// Returns the opposite objects as of the last load or commit.
    #[must_use]
    pub fn original_opposite_domain_objects(&self) -> &DomainObjectCollection {
        &self.original_opposite_domain_objects
    }

    /// Returns `true` if the current collection differs from the original one.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        match self.change_detection {
            ChangeDetection::Sequence => !self
                .opposite_domain_objects
                .sequence_equals(&self.original_opposite_domain_objects),
            ChangeDetection::Set => !self
                .opposite_domain_objects
                .set_equals(&self.original_opposite_domain_objects),
        }
    }

    /// Returns `true` if any modification happened since the last commit or rollback.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.touched
    }

    /// Returns the real end points pointing at this end point's object.
    #[must_use]
    pub fn registered_opposite_end_points(&self) -> &IndexSet<RelationEndPointId> {
        &self.registered_opposite_end_points
    }

    /// Creates a command inserting `object_id` at `index`.
    ///
    /// # Errors
    ///
    /// Fails if the end point is not loaded, the index is out of range, or
    /// the object is already part of the collection.
    pub fn create_insert_command(
        &self,
        index: usize,
        object_id: ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_complete()?;
        if index > self.opposite_domain_objects.len() {
            return Err(self.index_out_of_range(index));
        }
        if self.opposite_domain_objects.contains(&object_id) {
            return Err(CoreError::invalid_argument(format!(
                "'{object_id}' is already part of '{}'",
                self.id
            )));
        }
        Ok(CollectionEndPointCommand::new(
            CollectionCommandKind::Insert { index },
            self.id.clone(),
            None,
            Some(object_id),
        ))
    }

    /// Creates a command appending `object_id`.
    pub fn create_add_command(&self, object_id: ObjectId) -> CoreResult<CollectionEndPointCommand> {
        self.create_insert_command(self.opposite_domain_objects.len(), object_id)
    }

    /// Creates a command removing `object_id`.
    pub fn create_remove_command(
        &self,
        object_id: &ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_complete()?;
        let index = self
            .opposite_domain_objects
            .index_of(object_id)
            .ok_or_else(|| {
                CoreError::invalid_argument(format!(
                    "'{object_id}' is not part of '{}'",
                    self.id
                ))
            })?;
        Ok(CollectionEndPointCommand::new(
            CollectionCommandKind::Remove { index },
            self.id.clone(),
            Some(object_id.clone()),
            None,
        ))
    }

    /// Creates a command removing the object at `index`.
    pub fn create_remove_at_command(&self, index: usize) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_complete()?;
        let object_id = self
            .opposite_domain_objects
            .get(index)
            .ok_or_else(|| self.index_out_of_range(index))?;
        self.create_remove_command(object_id)
    }

    /// Creates a command replacing the object at `index` with `object_id`.
    ///
    /// Replacing an object with itself yields a command that only touches
    /// the end point.
    pub fn create_replace_command(
        &self,
        index: usize,
        object_id: ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_complete()?;
        let replaced = self
            .opposite_domain_objects
            .get(index)
            .ok_or_else(|| self.index_out_of_range(index))?
            .clone();
        if replaced == object_id {
            return Ok(CollectionEndPointCommand::new(
                CollectionCommandKind::ReplaceSame { index },
                self.id.clone(),
                Some(replaced),
                Some(object_id),
            ));
        }
        if self.opposite_domain_objects.contains(&object_id) {
            return Err(CoreError::invalid_argument(format!(
                "'{object_id}' is already part of '{}'",
                self.id
            )));
        }
        Ok(CollectionEndPointCommand::new(
            CollectionCommandKind::Replace { index },
            self.id.clone(),
            Some(replaced),
            Some(object_id),
        ))
    }

    /// Creates a command replacing the whole collection.
    pub fn create_set_collection_command(
        &self,
        new_items: Vec<ObjectId>,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_complete()?;
        let unique: IndexSet<&ObjectId> = new_items.iter().collect();
        if unique.len() != new_items.len() {
            return Err(CoreError::invalid_argument(format!(
                "the new contents of '{}' contain duplicates",
                self.id
            )));
        }
        Ok(CollectionEndPointCommand::new(
            CollectionCommandKind::SetCollection {
                old_items: self.opposite_domain_objects.to_vec(),
                new_items,
            },
            self.id.clone(),
            None,
            None,
        ))
    }

    /// Creates the command emptying the collection when its owner is deleted.
    pub fn create_delete_command(&self) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_complete()?;
        Ok(CollectionEndPointCommand::new(
            CollectionCommandKind::Delete {
                old_items: self.opposite_domain_objects.to_vec(),
            },
            self.id.clone(),
            None,
            None,
        ))
    }

    /// Empties the collection. Always touches, even if it is empty already.
    pub fn perform_delete(&mut self) {
        self.opposite_domain_objects.clear();
        self.touched = true;
    }

    /// Marks the end point as touched.
    pub fn touch(&mut self) {
        self.touched = true;
    }

    /// Makes the current contents the new original; both instances are kept.
    pub fn commit(&mut self) {
        if !self
            .opposite_domain_objects
            .sequence_equals(&self.original_opposite_domain_objects)
        {
            self.original_opposite_domain_objects
                .set_contents(self.opposite_domain_objects.iter());
        }
        self.touched = false;
    }

    /// Restores the original contents; both instances are kept.
    pub fn rollback(&mut self) {
        if !self
            .opposite_domain_objects
            .sequence_equals(&self.original_opposite_domain_objects)
        {
            self.opposite_domain_objects
                .set_contents(self.original_opposite_domain_objects.iter());
        }
        self.touched = false;
    }

    /// Takes over the current contents of `source`, keeping this end point's original.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidArgument`] if `source` is another end
    /// point, and with [`CoreError::InvalidOperation`] if either side is not loaded.
    pub fn take_over_committed_data(&mut self, source: &CollectionEndPoint) -> CoreResult<()> {
        if source.id != self.id {
            return Err(CoreError::invalid_argument(format!(
                "cannot take over data of '{}' into '{}'",
                source.id, self.id
            )));
        }
        self.ensure_complete()?;
        source.ensure_complete()?;

        self.opposite_domain_objects
            .set_contents(source.opposite_domain_objects.iter());
        if source.touched || self.has_changed() {
            self.touched = true;
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, index: usize, object_id: ObjectId) -> CoreResult<()> {
        if index > self.opposite_domain_objects.len() {
            return Err(self.index_out_of_range(index));
        }
        if !self.opposite_domain_objects.insert(index, object_id.clone()) {
            return Err(CoreError::invalid_operation(format!(
                "'{object_id}' is already part of '{}'",
                self.id
            )));
        }
        self.touched = true;
        Ok(())
    }

    pub(crate) fn remove(&mut self, object_id: &ObjectId) -> CoreResult<usize> {
        let index = self.opposite_domain_objects.remove(object_id).ok_or_else(|| {
            CoreError::invalid_operation(format!("'{object_id}' is not part of '{}'", self.id))
        })?;
        self.touched = true;
        Ok(index)
    }

    pub(crate) fn replace(&mut self, index: usize, object_id: ObjectId) -> CoreResult<ObjectId> {
        let previous = self
            .opposite_domain_objects
            .replace(index, object_id)
            .ok_or_else(|| self.index_out_of_range(index))?;
        self.touched = true;
        Ok(previous)
    }

    pub(crate) fn set_contents(&mut self, items: &[ObjectId]) {
        self.opposite_domain_objects.set_contents(items);
        self.touched = true;
    }

    /// Adds an object whose real end point points here to both collections.
    pub(crate) fn synchronize_opposite(&mut self, object_id: &ObjectId) {
        self.original_opposite_domain_objects.push(object_id.clone());
        self.opposite_domain_objects.push(object_id.clone());
    }

    pub(crate) fn mark_data_complete(
        &mut self,
        items: impl IntoIterator<Item = ObjectId>,
    ) -> CoreResult<()> {
        if self.is_data_complete {
            return Err(CoreError::invalid_operation(format!(
                "end point '{}' is already complete",
                self.id
            )));
        }
        let items: Vec<ObjectId> = items.into_iter().collect();
        let collection: DomainObjectCollection = items.iter().cloned().collect();
        if collection.len() != items.len() {
            return Err(CoreError::invalid_argument(format!(
                "the contents of '{}' contain duplicates",
                self.id
            )));
        }
        self.original_opposite_domain_objects.set_contents(collection.iter());
        self.opposite_domain_objects = collection;
        self.is_data_complete = true;
        self.touched = false;
        Ok(())
    }

    /// Drops the loaded contents.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidOperation`] if the end point has changed.
    pub fn mark_data_incomplete(&mut self) -> CoreResult<()> {
        if self.has_changed() {
            return Err(CoreError::invalid_operation(format!(
                "end point '{}' cannot be unloaded because it has changed",
                self.id
            )));
        }
        self.opposite_domain_objects.clear();
        self.original_opposite_domain_objects.clear();
        self.is_data_complete = false;
        self.touched = false;
        Ok(())
    }

    pub(crate) fn register_opposite_end_point(&mut self, end_point_id: RelationEndPointId) {
        self.registered_opposite_end_points.insert(end_point_id);
    }

    pub(crate) fn unregister_opposite_end_point(&mut self, end_point_id: &RelationEndPointId) {
        self.registered_opposite_end_points.shift_remove(end_point_id);
    }

    pub(crate) fn restore(
        &mut self,
        is_data_complete: bool,
        current: Vec<ObjectId>,
        original: Vec<ObjectId>,
        touched: bool,
        registered: impl IntoIterator<Item = RelationEndPointId>,
    ) {
        self.is_data_complete = is_data_complete;
        self.opposite_domain_objects = current.into_iter().collect();
        self.original_opposite_domain_objects = original.into_iter().collect();
        self.touched = touched;
        self.registered_opposite_end_points = registered.into_iter().collect();
    }

    fn ensure_complete(&self) -> CoreResult<()> {
        if !self.is_data_complete {
            return Err(CoreError::invalid_operation(format!(
                "end point '{}' is not loaded",
                self.id
            )));
        }
        Ok(())
    }

    fn index_out_of_range(&self, index: usize) -> CoreError {
        CoreError::invalid_argument(format!(
            "index {index} is out of range for '{}' holding {} objects",
            self.id,
            self.opposite_domain_objects.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ClassDefinition, MappingConfiguration, RelationDefinition};
    use crate::types::ClassId;

    fn definition() -> Arc<RelationEndPointDefinition> {
        MappingConfiguration::builder()
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
            .unwrap()
            .end_point_definition(&ClassId::new("Customer"), "Orders")
            .unwrap()
    }

    fn order(n: u8) -> ObjectId {
        ObjectId::from_bytes(ClassId::new("Order"), [n; 16])
    }

    fn end_point(items: &[ObjectId]) -> CollectionEndPoint {
        let customer = ObjectId::from_bytes(ClassId::new("Customer"), [1; 16]);
        CollectionEndPoint::new(
            TransactionId::new(1),
            RelationEndPointId::new(customer, "Orders"),
            definition(),
            items.iter().cloned(),
        )
        .unwrap()
    }

    #[test]
    fn construction_clones_initial_contents() {
        let end_point = end_point(&[order(1), order(2)]);
        assert_eq!(
            end_point.opposite_domain_objects(),
            end_point.original_opposite_domain_objects()
        );
        assert!(!std::ptr::eq(
            end_point.opposite_domain_objects(),
            end_point.original_opposite_domain_objects()
        ));
        assert!(!end_point.has_changed());
        assert!(!end_point.has_been_touched());
    }

    #[test]
    fn duplicates_are_rejected() {
        let customer = ObjectId::from_bytes(ClassId::new("Customer"), [1; 16]);
        let result = CollectionEndPoint::new(
            TransactionId::new(1),
            RelationEndPointId::new(customer, "Orders"),
            definition(),
            [order(1), order(1)],
        );
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn add_then_remove_is_touched_but_unchanged() {
        let mut end_point = end_point(&[order(1)]);
        end_point.insert(1, order(2)).unwrap();
        assert!(end_point.has_changed());
        end_point.remove(&order(2)).unwrap();
        assert!(!end_point.has_changed());
        assert!(end_point.has_been_touched());
    }

    #[test]
    fn perform_delete_on_empty_collection_touches() {
        let mut end_point = end_point(&[]);
        end_point.perform_delete();
        assert!(end_point.has_been_touched());
        assert!(!end_point.has_changed());
    }

    #[test]
    fn replace_with_self_touches_only() {
        let end_point = end_point(&[order(1)]);
        let command = end_point.create_replace_command(0, order(1)).unwrap();
        assert!(matches!(
            command.kind(),
            CollectionCommandKind::ReplaceSame { index: 0 }
        ));
    }

    #[test]
    fn commit_keeps_instances() {
        let mut end_point = end_point(&[order(1)]);
        let current = end_point.opposite_domain_objects() as *const DomainObjectCollection;
        let original = end_point.original_opposite_domain_objects() as *const DomainObjectCollection;

        end_point.insert(0, order(2)).unwrap();
        end_point.commit();
        end_point.commit();

        assert!(std::ptr::eq(current, end_point.opposite_domain_objects()));
        assert!(std::ptr::eq(original, end_point.original_opposite_domain_objects()));
        assert_eq!(end_point.original_opposite_domain_objects().to_vec(), vec![order(2), order(1)]);
        assert!(!end_point.has_changed());
        assert!(!end_point.has_been_touched());
    }

    #[test]
    fn rollback_restores_original_contents() {
        let mut end_point = end_point(&[order(1), order(2)]);
        end_point.replace(0, order(3)).unwrap();
        end_point.rollback();
        assert_eq!(end_point.opposite_domain_objects().to_vec(), vec![order(1), order(2)]);
        assert!(!end_point.has_been_touched());
    }

    #[test]
    fn set_change_detection_ignores_order() {
        let mut end_point =
            end_point(&[order(1), order(2)]).with_change_detection(ChangeDetection::Set);
        end_point.set_contents(&[order(2), order(1)]);
        assert!(!end_point.has_changed());
        assert!(end_point.has_been_touched());
    }

    #[test]
    fn set_change_detection_commits_and_rolls_back_order() {
        let mut end_point =
            end_point(&[order(1), order(2)]).with_change_detection(ChangeDetection::Set);
        end_point.set_contents(&[order(2), order(1)]);
        end_point.rollback();
        assert_eq!(end_point.opposite_domain_objects().to_vec(), vec![order(1), order(2)]);

        end_point.set_contents(&[order(2), order(1)]);
        end_point.commit();
        assert_eq!(
            end_point.original_opposite_domain_objects().to_vec(),
            vec![order(2), order(1)]
        );
        assert!(!end_point.has_been_touched());
    }

    #[test]
    fn take_over_leaves_original_untouched() {
        let mut target = end_point(&[order(1)]);
        let mut source = end_point(&[order(1)]);
        source.insert(1, order(2)).unwrap();

        target.take_over_committed_data(&source).unwrap();
        assert_eq!(target.opposite_domain_objects().to_vec(), vec![order(1), order(2)]);
        assert_eq!(target.original_opposite_domain_objects().to_vec(), vec![order(1)]);
        assert!(target.has_changed());
        assert!(target.has_been_touched());
    }

    #[test]
    fn clone_has_distinct_collections_with_same_items() {
        let mut end_point = end_point(&[order(1), order(2)]);
        end_point.touch();
        let clone = end_point.clone();

        assert_eq!(clone.id(), end_point.id());
        assert!(Arc::ptr_eq(clone.definition(), end_point.definition()));
        assert_eq!(clone.has_been_touched(), end_point.has_been_touched());
        assert_eq!(clone.opposite_domain_objects(), end_point.opposite_domain_objects());
        assert!(!std::ptr::eq(
            clone.opposite_domain_objects(),
            end_point.opposite_domain_objects()
        ));
    }

    #[test]
    fn unload_requires_unchanged() {
        let mut end_point = end_point(&[order(1)]);
        end_point.remove(&order(1)).unwrap();
        assert!(end_point.mark_data_incomplete().is_err());
        end_point.rollback();
        end_point.mark_data_incomplete().unwrap();
        assert!(!end_point.is_data_complete());
        assert!(end_point.create_add_command(order(4)).is_err());
    }
}
