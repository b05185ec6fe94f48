//! Commands changing an object end point.

use crate::command::{CommandState, DataManagementCommand, OppositeObjectIdSetter};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Shape of an object end-point change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCommandKind {
    /// The new related object equals the current one; only touches.
    SetSame,
    /// The relation has no navigable opposite side.
    SetUnidirectional,
    /// Both sides hold a single object.
    SetOneOne,
    /// The opposite side is a collection.
    SetOneMany,
    /// The owning object is deleted; resets the end point to null.
    Delete,
}

/// Changes the related object of a real or virtual object end point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEndPointCommand {
    kind: ObjectCommandKind,
    modified_end_point_id: RelationEndPointId,
    old_related_object: Option<ObjectId>,
    new_related_object: Option<ObjectId>,
    setter: OppositeObjectIdSetter,
    state: CommandState,
}

impl ObjectEndPointCommand {
    pub(crate) fn new(
        kind: ObjectCommandKind,
        modified_end_point_id: RelationEndPointId,
        old_related_object: Option<ObjectId>,
        new_related_object: Option<ObjectId>,
        setter: OppositeObjectIdSetter,
    ) -> Self {
        Self {
            kind,
            modified_end_point_id,
            old_related_object,
            new_related_object,
            setter,
            state: CommandState::Created,
        }
    }

    /// Returns the shape of the change.
    #[must_use]
    pub fn kind(&self) -> ObjectCommandKind {
        self.kind
    }

    /// Returns the modified end point.
    #[must_use]
    pub fn modified_end_point_id(&self) -> &RelationEndPointId {
        &self.modified_end_point_id
    }

    /// Returns the object owning the modified end point.
    #[must_use]
    pub fn domain_object(&self) -> &ObjectId {
        self.modified_end_point_id.object_id()
    }

    /// Returns the related object before the change.
    #[must_use]
    pub fn old_related_object(&self) -> Option<&ObjectId> {
        self.old_related_object.as_ref()
    }

    /// Returns the related object after the change.
    #[must_use]
    pub fn new_related_object(&self) -> Option<&ObjectId> {
        self.new_related_object.as_ref()
    }

    /// Returns the setter writing the new value.
    #[must_use]
    pub fn setter(&self) -> OppositeObjectIdSetter {
        self.setter
    }

    /// Returns the lifecycle position.
    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Creates the command restoring the old related object.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotSupported`] for delete commands.
    pub fn inverse(&self) -> CoreResult<ObjectEndPointCommand> {
        if self.kind == ObjectCommandKind::Delete {
            return Err(CoreError::not_supported(format!(
                "the delete command of '{}' has no inverse",
                self.modified_end_point_id
            )));
        }
        Ok(Self::new(
            self.kind,
            self.modified_end_point_id.clone(),
            self.new_related_object.clone(),
            self.old_related_object.clone(),
            self.setter,
        ))
    }

    fn raises_events(&self) -> bool {
        matches!(
            self.kind,
            ObjectCommandKind::SetUnidirectional
                | ObjectCommandKind::SetOneOne
                | ObjectCommandKind::SetOneMany
        )
    }
}

impl DataManagementCommand for ObjectEndPointCommand {
    fn begin(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state
            .advance(CommandState::Begun, &self.modified_end_point_id)?;
        if self.raises_events() {
            let transaction_id = transaction.id();
            transaction.notify_listeners(|listener| {
                listener.relation_changing(
                    transaction_id,
                    &self.modified_end_point_id,
                    self.old_related_object.as_ref(),
                    self.new_related_object.as_ref(),
                );
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
            "performing object end-point command"
        );
        match self.kind {
            ObjectCommandKind::SetSame => transaction.touch_end_point(&self.modified_end_point_id)?,
            _ => self.setter.apply(
                transaction,
                &self.modified_end_point_id,
                self.new_related_object.as_ref(),
            )?,
        }
        self.state = CommandState::Performed;
        Ok(())
    }

    fn end(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state
            .advance(CommandState::Ended, &self.modified_end_point_id)?;
        if self.raises_events() {
            let transaction_id = transaction.id();
            transaction.notify_listeners(|listener| {
                listener.relation_changed(
                    transaction_id,
                    &self.modified_end_point_id,
                    self.old_related_object.as_ref(),
                    self.new_related_object.as_ref(),
                );
            });
        }
        Ok(())
    }
}
