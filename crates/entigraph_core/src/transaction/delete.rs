//! Object deletion.

use crate::command::{CompositeCommand, DataManagementCommand};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::EndPointKind;
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use tracing::debug;

impl ClientTransaction {
    /// Deletes an object.
    ///
    /// Every related object is unlinked first: it leaves the deleted
    /// object's collections, its foreign keys pointing at the deleted
    /// object become null, and the deleted object leaves the collections
    /// and 1:1 end points of the objects it points at. Then every end point
    /// of the deleted object is cleared and its data container is marked
    /// deleted. A relation from the object to itself is cleared by the
    /// object's own end points only.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::ObjectDeleted`] if the object is deleted
    /// already, and with [`CoreError::OutOfSync`] if one of the affected
    /// real end points is unsynchronized.
    pub fn delete_object(&mut self, object_id: &ObjectId) -> CoreResult<()> {
        self.ensure_active()?;
        self.ensure_object_loaded(object_id)?;
        if self.data_containers.get_required(object_id)?.is_deleted() {
            return Err(CoreError::object_deleted(object_id.clone()));
        }

        let mut composite = CompositeCommand::default();
        for definition in self.mapping.end_point_definitions(object_id.class_id()) {
            let Some(property_name) = definition.property_name() else {
                continue;
            };
            let id = RelationEndPointId::new(object_id.clone(), property_name);
            let opposite = self.mapping.opposite_end_point_definition(&definition)?;
            let opposite_property = opposite.property_name();

            match definition.kind() {
                EndPointKind::RealObject => {
                    let delete = self.create_delete_command(&id)?;
                    let related = self
                        .opposite_object_id(&id)?
                        .filter(|related| related != object_id);
                    if let (Some(related), Some(opposite_property)) = (related, opposite_property) {
                        let opposite_id = RelationEndPointId::new(related, opposite_property);
                        match opposite.kind() {
                            EndPointKind::Collection => {
                                composite.push(self.create_remove_command(&opposite_id, object_id)?);
                            }
                            EndPointKind::VirtualObject => {
                                composite.push(self.create_set_command(&opposite_id, None)?);
                            }
                            EndPointKind::RealObject | EndPointKind::Anonymous => {}
                        }
                    }
                    composite.push(delete);
                }
                EndPointKind::VirtualObject => {
                    let related = self
                        .opposite_object_id(&id)?
                        .filter(|related| related != object_id);
                    if let (Some(related), Some(opposite_property)) = (related, opposite_property) {
                        let opposite_id = RelationEndPointId::new(related, opposite_property);
                        composite.push(self.create_set_command(&opposite_id, None)?);
                    }
                    composite.push(self.create_delete_command(&id)?);
                }
                EndPointKind::Collection => {
                    if let Some(opposite_property) = opposite_property {
                        let items = self
                            .related_objects(object_id, property_name)?
                            .to_vec();
                        for item in items.into_iter().filter(|item| item != object_id) {
                            let item_id = RelationEndPointId::new(item, opposite_property);
                            composite.push(self.create_set_command(&item_id, None)?);
                        }
                    }
                    composite.push(self.create_delete_command(&id)?);
                }
                EndPointKind::Anonymous => {}
            }
        }

        let transaction_id = self.id;
        self.notify_listeners(|listener| listener.object_deleting(transaction_id, object_id));
        composite.begin(self)?;
        composite.perform(self)?;
        self.data_containers
            .get_required_mut(object_id)?
            .mark_deleted()?;
        composite.end(self)?;
        self.notify_listeners(|listener| listener.object_deleted(transaction_id, object_id));

        self.stats.record_object_deleted();
        self.stats.record_commands_performed(composite.len() as u64);
        debug!(
            transaction = %self.id,
            object = %object_id,
            commands = composite.len(),
            "deleted object"
        );
        Ok(())
    }
}
