//! Relation access and modification.
//!
//! Reads go straight to the end points, loading them on demand. Every
//! modification is turned into a command, expanded to all related end
//! points and performed in one step.

use crate::command::{
    CollectionEndPointCommand, DataManagementCommand, ObjectEndPointCommand,
    OppositeObjectIdSetter, RelationEndPointCommand,
};
use crate::end_point::{
    CollectionEndPoint, DomainObjectCollection, ObjectEndPointSyncState, RelationEndPoint,
    RelationEndPointId, SyncStateKind, SynchronizedObjectEndPointSyncState,
};
use crate::error::{CoreError, CoreResult};
use crate::mapping::EndPointKind;
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use std::sync::Arc;
use tracing::debug;

impl ClientTransaction {
    /// Returns the object a 1:1 end point currently points at.
    pub fn related_object(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
    ) -> CoreResult<Option<ObjectId>> {
        self.ensure_active()?;
        self.opposite_object_id(&RelationEndPointId::new(object_id.clone(), property_name))
    }

    /// Returns the object a 1:1 end point pointed at as of the last load or commit.
    pub fn original_related_object(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
    ) -> CoreResult<Option<ObjectId>> {
        self.ensure_active()?;
        let id = RelationEndPointId::new(object_id.clone(), property_name);
        match self.expect_object_end_point(&id)? {
            EndPointKind::RealObject => {
                self.ensure_object_loaded(object_id)?;
                let container = self.data_containers.get_required(object_id)?;
                Ok(self
                    .end_points
                    .real_object(&id)?
                    .original_opposite_object_id(container)?
                    .cloned())
            }
            _ => {
                self.ensure_end_point_complete(&id)?;
                Ok(self
                    .end_points
                    .virtual_object(&id)?
                    .original_opposite_object_id()?
                    .cloned())
            }
        }
    }

    /// Returns the current contents of a collection end point.
    pub fn related_objects(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
    ) -> CoreResult<&DomainObjectCollection> {
        let id = self.collection_end_point_id(object_id, property_name)?;
        Ok(self.end_points.collection(&id)?.opposite_domain_objects())
    }

    /// Returns the contents of a collection end point as of the last load or commit.
    pub fn original_related_objects(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
    ) -> CoreResult<&DomainObjectCollection> {
        let id = self.collection_end_point_id(object_id, property_name)?;
        Ok(self
            .end_points
            .collection(&id)?
            .original_opposite_domain_objects())
    }

    /// Returns a handle modifying a collection end point through commands.
    pub fn related_objects_mut(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
    ) -> CoreResult<RelatedObjectsMut<'_>> {
        let end_point_id = self.collection_end_point_id(object_id, property_name)?;
        Ok(RelatedObjectsMut {
            transaction: self,
            end_point_id,
        })
    }

    /// Points a 1:1 end point at `new_related_object`, keeping both sides in step.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::OutOfSync`] if the end point or one of the
    /// affected opposite end points is unsynchronized.
    pub fn set_related_object(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
        new_related_object: Option<&ObjectId>,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        let id = RelationEndPointId::new(object_id.clone(), property_name);
        self.expect_object_end_point(&id)?;
        self.ensure_object_loaded(object_id)?;
        self.ensure_not_deleted(object_id)?;
        if let Some(new_related_object) = new_related_object {
            self.ensure_object_loaded(new_related_object)?;
            self.ensure_not_deleted(new_related_object)?;
        }
        let command = self.create_set_command(&id, new_related_object)?;
        self.execute(command)
    }

    /// Expands `command` to all related end points and performs it.
    pub fn execute(&mut self, command: impl Into<RelationEndPointCommand>) -> CoreResult<()> {
        self.ensure_active()?;
        let command: RelationEndPointCommand = command.into();
        let mut expanded = command.expand_to_all_related_objects(self)?;
        let count = expanded.commands().len() as u64;
        expanded.notify_and_perform(self)?;
        self.stats.record_commands_performed(count);
        Ok(())
    }

    /// Returns the current opposite object of an object end point, loading it if needed.
    pub fn opposite_object_id(&mut self, id: &RelationEndPointId) -> CoreResult<Option<ObjectId>> {
        match self.expect_object_end_point(id)? {
            EndPointKind::RealObject => self.foreign_key(id),
            _ => {
                self.ensure_end_point_complete(id)?;
                Ok(self
                    .end_points
                    .virtual_object(id)?
                    .opposite_object_id()?
                    .cloned())
            }
        }
    }

    /// Creates the unexpanded command setting an object end point.
    ///
    /// Real end points create the command through their synchronization
    /// state; virtual object end points are always synchronized.
    pub fn create_set_command(
        &mut self,
        id: &RelationEndPointId,
        new_related_object: Option<&ObjectId>,
    ) -> CoreResult<ObjectEndPointCommand> {
        self.ensure_active()?;
        match self.expect_object_end_point(id)? {
            EndPointKind::RealObject => {
                self.ensure_object_loaded(id.object_id())?;
                let sync_state = Arc::clone(self.end_points.real_object(id)?.sync_state());
                sync_state.create_set_command(
                    self,
                    id,
                    new_related_object,
                    OppositeObjectIdSetter::RealObject,
                )
            }
            _ => {
                self.ensure_end_point_complete(id)?;
                SynchronizedObjectEndPointSyncState.create_set_command(
                    self,
                    id,
                    new_related_object,
                    OppositeObjectIdSetter::VirtualObject,
                )
            }
        }
    }

    /// Creates the unexpanded command run for an end point when its object is deleted.
    pub fn create_delete_command(
        &mut self,
        id: &RelationEndPointId,
    ) -> CoreResult<RelationEndPointCommand> {
        self.ensure_active()?;
        match self.definition_of(id)?.kind() {
            EndPointKind::RealObject => {
                self.ensure_object_loaded(id.object_id())?;
                let sync_state = Arc::clone(self.end_points.real_object(id)?.sync_state());
                sync_state
                    .create_delete_command(self, id, OppositeObjectIdSetter::RealObject)
                    .map(Into::into)
            }
            EndPointKind::VirtualObject => {
                self.ensure_end_point_complete(id)?;
                SynchronizedObjectEndPointSyncState
                    .create_delete_command(self, id, OppositeObjectIdSetter::VirtualObject)
                    .map(Into::into)
            }
            EndPointKind::Collection => self
                .create_collection_command(id, CollectionEndPoint::create_delete_command)
                .map(Into::into),
            EndPointKind::Anonymous => Err(CoreError::invalid_argument(format!(
                "anonymous end point '{id}' cannot be deleted"
            ))),
        }
    }

    /// Creates the unexpanded command appending `object_id` to a collection.
    pub fn create_add_command(
        &mut self,
        id: &RelationEndPointId,
        object_id: ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.create_collection_command(id, |end_point| end_point.create_add_command(object_id))
    }

    /// Creates the unexpanded command inserting `object_id` at `index`.
    pub fn create_insert_command(
        &mut self,
        id: &RelationEndPointId,
        index: usize,
        object_id: ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.create_collection_command(id, |end_point| {
            end_point.create_insert_command(index, object_id)
        })
    }

    /// Creates the unexpanded command removing `object_id` from a collection.
    pub fn create_remove_command(
        &mut self,
        id: &RelationEndPointId,
        object_id: &ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.create_collection_command(id, |end_point| end_point.create_remove_command(object_id))
    }

    /// Creates the unexpanded command replacing the object at `index`.
    pub fn create_replace_command(
        &mut self,
        id: &RelationEndPointId,
        index: usize,
        object_id: ObjectId,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.create_collection_command(id, |end_point| {
            end_point.create_replace_command(index, object_id)
        })
    }

    /// Creates the unexpanded command replacing the whole collection.
    pub fn create_set_collection_command(
        &mut self,
        id: &RelationEndPointId,
        new_items: Vec<ObjectId>,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.create_collection_command(id, |end_point| {
            end_point.create_set_collection_command(new_items)
        })
    }

    /// Returns `true` if a real end point agrees with its opposite side.
    ///
    /// An end point in the unknown state loads its opposite side first.
    pub fn is_synchronized(&mut self, id: &RelationEndPointId) -> CoreResult<bool> {
        self.ensure_active()?;
        let sync_state = self.real_sync_state(id)?;
        sync_state.is_synchronized(self, id)
    }

    /// Brings the opposite side of a real end point in line with it.
    pub fn synchronize(&mut self, id: &RelationEndPointId) -> CoreResult<()> {
        self.ensure_active()?;
        let sync_state = self.real_sync_state(id)?;
        sync_state.synchronize(self, id)
    }

    /// Returns the synchronization state of a real end point without loading anything.
    pub fn sync_state_kind(&mut self, id: &RelationEndPointId) -> CoreResult<SyncStateKind> {
        Ok(self.real_sync_state(id)?.kind())
    }

    /// Adds the object of an unsynchronized real end point to the original
    /// and current data of the opposite end point and marks it synchronized.
    pub(crate) fn synchronize_with_opposite(&mut self, real_id: &RelationEndPointId) -> CoreResult<()> {
        let definition = self.definition_of(real_id)?;
        let foreign_key = self.foreign_key(real_id)?;
        if let Some(opposite_id) =
            self.opposite_virtual_end_point_id(&definition, foreign_key.as_ref())?
        {
            self.ensure_end_point_complete(&opposite_id)?;
            match self.end_points.get_required_mut(&opposite_id)? {
                RelationEndPoint::Collection(end_point) => {
                    end_point.synchronize_opposite(real_id.object_id());
                }
                RelationEndPoint::VirtualObject(end_point) => {
                    end_point.synchronize_opposite(real_id.object_id())?;
                }
                RelationEndPoint::RealObject(_) => {
                    return Err(CoreError::invalid_operation(format!(
                        "'{opposite_id}' is registered as a real end point"
                    )))
                }
            }
        }

        self.end_points
            .real_object_mut(real_id)?
            .set_sync_state(Arc::new(SynchronizedObjectEndPointSyncState));
        self.stats.record_synchronization();
        debug!(end_point = %real_id, transaction = %self.id, "synchronized end point");
        Ok(())
    }

    /// Writes a foreign key and moves the real end point's registration.
    pub(crate) fn write_foreign_key(
        &mut self,
        id: &RelationEndPointId,
        opposite: Option<&ObjectId>,
    ) -> CoreResult<()> {
        let old = self.foreign_key(id)?;
        let end_point = self.end_points.real_object(id)?;
        let container = self.data_containers.get_required_mut(id.object_id())?;
        end_point.set_opposite_object_id(container, opposite)?;
        self.move_registration(id, old.as_ref(), opposite)
    }

    pub(crate) fn write_virtual_object(
        &mut self,
        id: &RelationEndPointId,
        opposite: Option<&ObjectId>,
    ) -> CoreResult<()> {
        self.end_points
            .virtual_object_mut(id)?
            .set_opposite_object_id(opposite)
    }

    /// Marks an end point as touched without changing it.
    pub fn touch_end_point(&mut self, id: &RelationEndPointId) -> CoreResult<()> {
        self.ensure_end_point_complete(id)?;
        match self.end_points.get_required_mut(id)? {
            RelationEndPoint::RealObject(end_point) => {
                let container = self.data_containers.get_required_mut(id.object_id())?;
                end_point.touch(container)
            }
            RelationEndPoint::VirtualObject(end_point) => end_point.touch(),
            RelationEndPoint::Collection(end_point) => {
                end_point.touch();
                Ok(())
            }
        }
    }

    pub(crate) fn foreign_key(&mut self, id: &RelationEndPointId) -> CoreResult<Option<ObjectId>> {
        self.ensure_object_loaded(id.object_id())?;
        let container = self.data_containers.get_required(id.object_id())?;
        Ok(self
            .end_points
            .real_object(id)?
            .opposite_object_id(container)?
            .cloned())
    }

    fn real_sync_state(
        &mut self,
        id: &RelationEndPointId,
    ) -> CoreResult<Arc<dyn ObjectEndPointSyncState>> {
        if self.definition_of(id)?.kind() != EndPointKind::RealObject {
            return Err(CoreError::invalid_argument(format!(
                "'{id}' is not a real object end point"
            )));
        }
        self.ensure_object_loaded(id.object_id())?;
        Ok(Arc::clone(self.end_points.real_object(id)?.sync_state()))
    }

    fn expect_object_end_point(&self, id: &RelationEndPointId) -> CoreResult<EndPointKind> {
        let kind = self.definition_of(id)?.kind();
        match kind {
            EndPointKind::RealObject | EndPointKind::VirtualObject => Ok(kind),
            EndPointKind::Collection | EndPointKind::Anonymous => Err(
                CoreError::invalid_argument(format!("'{id}' is not an object end point")),
            ),
        }
    }

    fn collection_end_point_id(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
    ) -> CoreResult<RelationEndPointId> {
        self.ensure_active()?;
        let id = RelationEndPointId::new(object_id.clone(), property_name);
        if self.definition_of(&id)?.kind() != EndPointKind::Collection {
            return Err(CoreError::invalid_argument(format!(
                "'{id}' is not a collection end point"
            )));
        }
        self.ensure_end_point_complete(&id)?;
        Ok(id)
    }

    fn create_collection_command(
        &mut self,
        id: &RelationEndPointId,
        create: impl FnOnce(&CollectionEndPoint) -> CoreResult<CollectionEndPointCommand>,
    ) -> CoreResult<CollectionEndPointCommand> {
        self.ensure_active()?;
        if self.definition_of(id)?.kind() != EndPointKind::Collection {
            return Err(CoreError::invalid_argument(format!(
                "'{id}' is not a collection end point"
            )));
        }
        self.ensure_end_point_complete(id)?;
        create(self.end_points.collection(id)?)
    }

    fn modify_collection(
        &mut self,
        id: &RelationEndPointId,
        new_related_object: Option<&ObjectId>,
        create: impl FnOnce(&CollectionEndPoint) -> CoreResult<CollectionEndPointCommand>,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        self.ensure_not_deleted(id.object_id())?;
        if let Some(new_related_object) = new_related_object {
            let definition = self.definition_of(id)?;
            let item_definition = self.mapping.opposite_end_point_definition(&definition)?;
            if !self
                .mapping
                .is_same_or_base_class(item_definition.class_id(), new_related_object.class_id())
            {
                return Err(CoreError::invalid_argument(format!(
                    "'{new_related_object}' cannot be added to '{id}', which holds '{}'",
                    item_definition.class_id()
                )));
            }
            self.ensure_object_loaded(new_related_object)?;
            self.ensure_not_deleted(new_related_object)?;
        }
        let command = self.create_collection_command(id, create)?;
        self.execute(command)
    }
}

/// Mutable access to a collection end point.
///
/// Every operation creates the matching collection command, expands it to
/// the foreign keys of the affected objects and performs it, so the
/// collection and the real end points never disagree.
#[derive(Debug)]
pub struct RelatedObjectsMut<'a> {
    transaction: &'a mut ClientTransaction,
    end_point_id: RelationEndPointId,
}

impl RelatedObjectsMut<'_> {
    /// Returns the ID of the modified end point.
    #[must_use]
    pub fn end_point_id(&self) -> &RelationEndPointId {
        &self.end_point_id
    }

    /// Returns the current contents.
    pub fn objects(&self) -> CoreResult<&DomainObjectCollection> {
        Ok(self
            .transaction
            .end_points
            .collection(&self.end_point_id)?
            .opposite_domain_objects())
    }

    /// Returns the number of objects.
    pub fn len(&self) -> CoreResult<usize> {
        self.objects().map(DomainObjectCollection::len)
    }

    /// Returns `true` if the collection is empty.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.objects().map(DomainObjectCollection::is_empty)
    }

    /// Returns `true` if the collection holds `object_id`.
    pub fn contains(&self, object_id: &ObjectId) -> CoreResult<bool> {
        Ok(self.objects()?.contains(object_id))
    }

    /// Appends an object.
    pub fn add(&mut self, object_id: ObjectId) -> CoreResult<()> {
        let new_related_object = object_id.clone();
        self.transaction
            .modify_collection(&self.end_point_id, Some(&new_related_object), |end_point| {
                end_point.create_add_command(object_id)
            })
    }

    /// Inserts an object at `index`.
    pub fn insert(&mut self, index: usize, object_id: ObjectId) -> CoreResult<()> {
        let new_related_object = object_id.clone();
        self.transaction
            .modify_collection(&self.end_point_id, Some(&new_related_object), |end_point| {
                end_point.create_insert_command(index, object_id)
            })
    }

    /// Removes an object. Returns `false` if it was not part of the collection.
    pub fn remove(&mut self, object_id: &ObjectId) -> CoreResult<bool> {
        if !self.contains(object_id)? {
            return Ok(false);
        }
        self.transaction
            .modify_collection(&self.end_point_id, None, |end_point| {
                end_point.create_remove_command(object_id)
            })?;
        Ok(true)
    }

    /// Removes the object at `index` and returns it.
    pub fn remove_at(&mut self, index: usize) -> CoreResult<ObjectId> {
        let removed = self.object_at(index)?;
        self.transaction
            .modify_collection(&self.end_point_id, None, |end_point| {
                end_point.create_remove_at_command(index)
            })?;
        Ok(removed)
    }

    /// Replaces the object at `index` and returns the replaced one.
    ///
    /// Replacing an object with itself only touches the end point.
    pub fn replace(&mut self, index: usize, object_id: ObjectId) -> CoreResult<ObjectId> {
        let replaced = self.object_at(index)?;
        let new_related_object = object_id.clone();
        self.transaction
            .modify_collection(&self.end_point_id, Some(&new_related_object), |end_point| {
                end_point.create_replace_command(index, object_id)
            })?;
        Ok(replaced)
    }

    /// Removes every object.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.set_all(Vec::new())
    }

    /// Replaces the whole contents.
    pub fn set_all(&mut self, new_items: Vec<ObjectId>) -> CoreResult<()> {
        for item in &new_items {
            self.check_item(item)?;
        }
        self.transaction
            .modify_collection(&self.end_point_id, None, |end_point| {
                end_point.create_set_collection_command(new_items)
            })
    }

    fn check_item(&mut self, object_id: &ObjectId) -> CoreResult<()> {
        let definition = self.transaction.definition_of(&self.end_point_id)?;
        let item_definition = self
            .transaction
            .mapping
            .opposite_end_point_definition(&definition)?;
        if !self
            .transaction
            .mapping
            .is_same_or_base_class(item_definition.class_id(), object_id.class_id())
        {
            return Err(CoreError::invalid_argument(format!(
                "'{object_id}' cannot be added to '{}', which holds '{}'",
                self.end_point_id,
                item_definition.class_id()
            )));
        }
        self.transaction.ensure_object_loaded(object_id)?;
        self.transaction.ensure_not_deleted(object_id)
    }

    fn object_at(&self, index: usize) -> CoreResult<ObjectId> {
        self.objects()?.get(index).cloned().ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "index {index} is out of range for '{}'",
                self.end_point_id
            ))
        })
    }
}
