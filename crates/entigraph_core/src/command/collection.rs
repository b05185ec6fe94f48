//! Commands changing a collection end point.

use crate::command::{CommandState, DataManagementCommand};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Shape of a collection end-point change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionCommandKind {
    /// Inserts the new related object at `index`.
    Insert {
        /// Target position.
        index: usize,
    },
    /// Removes the old related object, found at `index` when the command was created.
    Remove {
        /// Position at creation time.
        index: usize,
    },
    /// Replaces the old related object at `index` with the new one.
    Replace {
        /// Replaced position.
        index: usize,
    },
    /// Replaces the object at `index` with itself; only touches.
    ReplaceSame {
        /// Replaced position.
        index: usize,
    },
    /// Replaces the whole contents.
    SetCollection {
        /// Contents before the change.
        old_items: Vec<ObjectId>,
        /// Contents after the change.
        new_items: Vec<ObjectId>,
    },
    /// Empties the collection because its owner is deleted.
    Delete {
        /// Contents before the change.
        old_items: Vec<ObjectId>,
    },
}

/// Changes the contents of a collection end point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEndPointCommand {
    kind: CollectionCommandKind,
    modified_end_point_id: RelationEndPointId,
    old_related_object: Option<ObjectId>,
    new_related_object: Option<ObjectId>,
    state: CommandState,
}

impl CollectionEndPointCommand {
    pub(crate) fn new(
        kind: CollectionCommandKind,
        modified_end_point_id: RelationEndPointId,
        old_related_object: Option<ObjectId>,
        new_related_object: Option<ObjectId>,
    ) -> Self {
        Self {
            kind,
            modified_end_point_id,
            old_related_object,
            new_related_object,
            state: CommandState::Created,
        }
    }

    /// Returns the shape of the change.
    #[must_use]
    pub fn kind(&self) -> &CollectionCommandKind {
        &self.kind
    }

    /// Returns the modified end point.
    #[must_use]
    pub fn modified_end_point_id(&self) -> &RelationEndPointId {
        &self.modified_end_point_id
    }

    /// Returns the object owning the collection.
    #[must_use]
    pub fn domain_object(&self) -> &ObjectId {
        self.modified_end_point_id.object_id()
    }

    /// Returns the removed or replaced object.
    #[must_use]
    pub fn old_related_object(&self) -> Option<&ObjectId> {
        self.old_related_object.as_ref()
    }

    /// Returns the inserted or replacing object.
    #[must_use]
    pub fn new_related_object(&self) -> Option<&ObjectId> {
        self.new_related_object.as_ref()
    }

    /// Returns the lifecycle position.
    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Creates the command undoing this one.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotSupported`] for delete commands.
    pub fn inverse(&self) -> CoreResult<CollectionEndPointCommand> {
        let kind = match &self.kind {
            CollectionCommandKind::Insert { index } => CollectionCommandKind::Remove { index: *index },
            CollectionCommandKind::Remove { index } => CollectionCommandKind::Insert { index: *index },
            CollectionCommandKind::Replace { index } => CollectionCommandKind::Replace { index: *index },
            CollectionCommandKind::ReplaceSame { index } => {
                CollectionCommandKind::ReplaceSame { index: *index }
            }
            CollectionCommandKind::SetCollection {
                old_items,
                new_items,
            } => CollectionCommandKind::SetCollection {
                old_items: new_items.clone(),
                new_items: old_items.clone(),
            },
            CollectionCommandKind::Delete { .. } => {
                return Err(CoreError::not_supported(format!(
                    "the delete command of '{}' has no inverse",
                    self.modified_end_point_id
                )))
            }
        };
        Ok(Self::new(
            kind,
            self.modified_end_point_id.clone(),
            self.new_related_object.clone(),
            self.old_related_object.clone(),
        ))
    }

    /// Returns the (old, new) pairs reported to listeners.
    fn changes(&self) -> Vec<(Option<&ObjectId>, Option<&ObjectId>)> {
        match &self.kind {
            CollectionCommandKind::Insert { .. }
            | CollectionCommandKind::Remove { .. }
            | CollectionCommandKind::Replace { .. } => vec![(
                self.old_related_object.as_ref(),
                self.new_related_object.as_ref(),
            )],
            CollectionCommandKind::SetCollection {
                old_items,
                new_items,
            } => {
                let removed = old_items
                    .iter()
                    .filter(|item| !new_items.contains(item))
                    .map(|item| (Some(item), None));
                let added = new_items
                    .iter()
                    .filter(|item| !old_items.contains(item))
                    .map(|item| (None, Some(item)));
                removed.chain(added).collect()
            }
            CollectionCommandKind::ReplaceSame { .. } | CollectionCommandKind::Delete { .. } => {
                Vec::new()
            }
        }
    }
}

impl DataManagementCommand for CollectionEndPointCommand {
    fn begin(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state
            .advance(CommandState::Begun, &self.modified_end_point_id)?;
        let transaction_id = transaction.id();
        for (old, new) in self.changes() {
            transaction.notify_listeners(|listener| {
                listener.relation_changing(transaction_id, &self.modified_end_point_id, old, new);
            });
        }
        Ok(())
    }

    fn perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state
            .ensure_can_advance(CommandState::Performed, &self.modified_end_point_id)?;
        trace!(
            end_point = %self.modified_end_point_id,
            kind = ?self.kind,
            transaction = %transaction.id(),
            "performing collection end-point command"
        );
        let end_point = transaction
            .end_points_mut()
            .collection_mut(&self.modified_end_point_id)?;
        let result = match &self.kind {
            CollectionCommandKind::Insert { index } => {
                let object_id = required(&self.new_related_object, &self.modified_end_point_id)?;
                end_point.insert(*index, object_id.clone())
            }
            CollectionCommandKind::Remove { .. } => {
                let object_id = required(&self.old_related_object, &self.modified_end_point_id)?;
                end_point.remove(object_id).map(|_| ())
            }
            CollectionCommandKind::Replace { index } => {
                let object_id = required(&self.new_related_object, &self.modified_end_point_id)?;
                end_point.replace(*index, object_id.clone()).map(|_| ())
            }
            CollectionCommandKind::ReplaceSame { .. } => {
                end_point.touch();
                Ok(())
            }
            CollectionCommandKind::SetCollection { new_items, .. } => {
                end_point.set_contents(new_items);
                Ok(())
            }
            CollectionCommandKind::Delete { .. } => {
                end_point.perform_delete();
                Ok(())
            }
        };
        result?;
        self.state = CommandState::Performed;
        Ok(())
    }

    fn end(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state
            .advance(CommandState::Ended, &self.modified_end_point_id)?;
        let transaction_id = transaction.id();
        for (old, new) in self.changes() {
            transaction.notify_listeners(|listener| {
                listener.relation_changed(transaction_id, &self.modified_end_point_id, old, new);
            });
        }
        Ok(())
    }
}

fn required<'a>(
    object_id: &'a Option<ObjectId>,
    end_point_id: &RelationEndPointId,
) -> CoreResult<&'a ObjectId> {
    object_id.as_ref().ok_or_else(|| {
        CoreError::invalid_operation(format!(
            "command on '{end_point_id}' has no related object to apply"
        ))
    })
}
