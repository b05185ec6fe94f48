//! Commit and rollback.

use crate::consistency::verify_consistency;
use crate::data::DataContainerState;
use crate::end_point::{RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::mapping::EndPointKind;
use crate::object::ObjectId;
use crate::persistence::{PersistedChange, PersistedChangeKind};
use crate::transaction::ClientTransaction;
use tracing::debug;

impl ClientTransaction {
    /// Returns `true` if any object or relation differs from its original state.
    pub fn has_changed(&self) -> CoreResult<bool> {
        if self
            .data_containers
            .iter()
            .any(|container| container.state() != DataContainerState::Unchanged)
        {
            return Ok(true);
        }
        for end_point in self.end_points.iter() {
            if end_point.has_changed(&self.data_containers)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns `true` if the end point differs from its original state.
    pub fn end_point_has_changed(&self, id: &RelationEndPointId) -> CoreResult<bool> {
        self.end_points
            .get_required(id)?
            .has_changed(&self.data_containers)
    }

    /// Returns `true` if the end point was modified or touched since the last commit or rollback.
    pub fn end_point_has_been_touched(&self, id: &RelationEndPointId) -> CoreResult<bool> {
        self.end_points
            .get_required(id)?
            .has_been_touched(&self.data_containers)
    }

    /// Returns the changes a commit would hand to the persistence source.
    ///
    /// New objects deleted again within the transaction are left out.
    pub fn changes(&self) -> Vec<PersistedChange> {
        self.data_containers
            .iter()
            .filter_map(|container| {
                let kind = match container.state() {
                    DataContainerState::New => PersistedChangeKind::New,
                    DataContainerState::Changed => PersistedChangeKind::Changed,
                    DataContainerState::Deleted if !container.is_new() => {
                        PersistedChangeKind::Deleted
                    }
                    DataContainerState::Deleted | DataContainerState::Unchanged => return None,
                };
                let values = if kind == PersistedChangeKind::Deleted {
                    Vec::new()
                } else {
                    container
                        .properties()
                        .map(|(name, value)| (name.to_string(), value.value().clone()))
                        .collect()
                };
                Some(PersistedChange {
                    object_id: container.id().clone(),
                    kind,
                    values,
                })
            })
            .collect()
    }

    /// Commits the transaction.
    ///
    /// Validates mandatory relations (and relation consistency if
    /// configured), persists the changes, then makes the current state of
    /// every touched end point and every data container the new original
    /// state. Deleted objects leave the transaction. The transaction stays
    /// active.
    ///
    /// # Errors
    ///
    /// Nothing is committed if validation or persisting fails.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        let transaction_id = self.id;
        self.notify_listeners(|listener| listener.transaction_committing(transaction_id));

        if self.config.verify_consistency_on_commit {
            verify_consistency(self)?;
        }
        self.validate_mandatory_relations()?;

        let changes = self.changes();
        if self.config.persist_on_commit && !changes.is_empty() {
            self.source.persist(&changes)?;
        }

        let containers = &mut self.data_containers;
        for end_point in self.end_points.iter_mut() {
            if end_point.has_been_touched(containers)? {
                end_point.commit(containers)?;
            }
        }
        for container in self.data_containers.iter_mut() {
            if !container.is_deleted() {
                container.commit();
            }
        }
        let deleted: Vec<ObjectId> = self
            .data_containers
            .iter()
            .filter(|container| container.is_deleted())
            .map(|container| container.id().clone())
            .collect();
        self.forget_objects(&deleted);

        self.notify_listeners(|listener| listener.transaction_committed(transaction_id));
        self.stats.record_commit(changes.len() as u64);
        debug!(
            transaction = %self.id,
            changes = changes.len(),
            removed = deleted.len(),
            "committed transaction"
        );
        Ok(())
    }

    /// Rolls the transaction back to the state of the last load or commit.
    ///
    /// Objects created since then leave the transaction, deleted objects
    /// come back. The transaction stays active.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active()?;

        let mut moved_foreign_keys = Vec::new();
        for end_point in self.end_points.iter() {
            if let RelationEndPoint::RealObject(end_point) = end_point {
                let container = self.data_containers.get_required(end_point.id().object_id())?;
                if end_point.has_changed(container)? {
                    moved_foreign_keys.push((
                        end_point.id().clone(),
                        end_point.opposite_object_id(container)?.cloned(),
                        end_point.original_opposite_object_id(container)?.cloned(),
                    ));
                }
            }
        }
        for (id, current, original) in moved_foreign_keys {
            self.move_registration(&id, current.as_ref(), original.as_ref())?;
        }

        let containers = &mut self.data_containers;
        for end_point in self.end_points.iter_mut() {
            if end_point.has_been_touched(containers)? {
                end_point.rollback(containers)?;
            }
        }
        for container in self.data_containers.iter_mut() {
            container.rollback();
        }
        let created: Vec<ObjectId> = self
            .data_containers
            .iter()
            .filter(|container| container.is_new())
            .map(|container| container.id().clone())
            .collect();
        self.forget_objects(&created);

        let transaction_id = self.id;
        self.notify_listeners(|listener| listener.transaction_rolled_back(transaction_id));
        self.stats.record_rollback();
        debug!(
            transaction = %self.id,
            removed = created.len(),
            "rolled back transaction"
        );
        Ok(())
    }

    fn validate_mandatory_relations(&self) -> CoreResult<()> {
        for container in self.data_containers.iter() {
            if container.is_deleted() {
                continue;
            }
            for definition in self.mapping.end_point_definitions(container.class_id()) {
                if definition.kind() != EndPointKind::RealObject || !definition.is_mandatory() {
                    continue;
                }
                let Some(property_name) = definition.property_name() else {
                    continue;
                };
                if container.value(property_name)?.is_null() {
                    return Err(CoreError::invalid_operation(format!(
                        "mandatory relation '{definition}' of '{}' is not set",
                        container.id()
                    )));
                }
            }
        }
        Ok(())
    }

    fn forget_objects(&mut self, object_ids: &[ObjectId]) {
        for object_id in object_ids {
            self.data_containers.discard(object_id);
            self.end_points.remove_object(object_id);
        }
    }
}
