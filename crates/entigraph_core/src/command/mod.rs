//! Relation modification commands.
//!
//! A command captures one relation change of one end point. It is consumed
//! exactly once through `begin` → `perform` → `end`: `begin` and `end` fire
//! listener notifications, `perform` applies the change. Commands never hold
//! references to end points; they name them by [`RelationEndPointId`] and
//! resolve them in the transaction passed to every step.
//!
//! A command created by an end point only changes that end point. Calling
//! [`RelationEndPointCommand::expand_to_all_related_objects`] adds the
//! commands for the opposite end points, so performing the resulting
//! [`ExpandedCommand`] keeps both sides of a bidirectional relation in step.

mod collection;
mod composite;
mod expand;
mod object;
mod touch;

pub use collection::{CollectionCommandKind, CollectionEndPointCommand};
pub use composite::{CompositeCommand, ExpandedCommand};
pub use object::{ObjectCommandKind, ObjectEndPointCommand};
pub use touch::RelationEndPointTouchCommand;

use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{EndPointKind, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use serde::{Deserialize, Serialize};

/// Lifecycle position of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandState {
    /// Created, nothing fired or applied yet.
    Created,
    /// Pre-change notifications fired.
    Begun,
    /// Change applied.
    Performed,
    /// Post-change notifications fired.
    Ended,
}

impl CommandState {
    pub(crate) fn advance(&mut self, to: CommandState, end_point_id: &RelationEndPointId) -> CoreResult<()> {
        self.ensure_can_advance(to, end_point_id)?;
        *self = to;
        Ok(())
    }

    /// Checks the transition without taking it.
    pub(crate) fn ensure_can_advance(
        self,
        to: CommandState,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        let allowed = match to {
            CommandState::Created => false,
            CommandState::Begun => self == CommandState::Created,
            CommandState::Performed => {
                matches!(self, CommandState::Created | CommandState::Begun)
            }
            CommandState::Ended => self == CommandState::Performed,
        };
        if !allowed {
            return Err(CoreError::invalid_operation(format!(
                "command on '{end_point_id}' cannot move from {self:?} to {to:?}"
            )));
        }
        Ok(())
    }
}

/// Writes a new opposite object into an object end point's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OppositeObjectIdSetter {
    /// Writes the foreign key in the owning data container.
    RealObject,
    /// Writes the cached value of a virtual object end point.
    VirtualObject,
}

impl OppositeObjectIdSetter {
    /// Returns the setter matching an object end-point definition.
    pub fn for_definition(definition: &RelationEndPointDefinition) -> CoreResult<Self> {
        match definition.kind() {
            EndPointKind::RealObject => Ok(Self::RealObject),
            EndPointKind::VirtualObject => Ok(Self::VirtualObject),
            EndPointKind::Collection | EndPointKind::Anonymous => Err(CoreError::invalid_argument(
                format!("'{definition}' is not an object end point"),
            )),
        }
    }

    /// Writes `opposite` into the storage of `end_point_id`.
    pub fn apply(
        self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        opposite: Option<&ObjectId>,
    ) -> CoreResult<()> {
        match self {
            Self::RealObject => transaction.write_foreign_key(end_point_id, opposite),
            Self::VirtualObject => transaction.write_virtual_object(end_point_id, opposite),
        }
    }
}

/// The lifecycle shared by all commands.
pub trait DataManagementCommand {
    /// Fires the pre-change notifications.
    fn begin(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()>;

    /// Applies the change.
    fn perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()>;

    /// Fires the post-change notifications.
    fn end(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()>;

    /// Runs `begin`, `perform` and `end` in order.
    fn notify_and_perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.begin(transaction)?;
        self.perform(transaction)?;
        self.end(transaction)
    }
}

/// Any single-end-point command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationEndPointCommand {
    /// Change of an object end point.
    Object(ObjectEndPointCommand),
    /// Change of a collection end point.
    Collection(CollectionEndPointCommand),
    /// Touch without change.
    Touch(RelationEndPointTouchCommand),
}

impl RelationEndPointCommand {
    /// Returns the end point this command changes.
    #[must_use]
    pub fn modified_end_point_id(&self) -> &RelationEndPointId {
        match self {
            Self::Object(command) => command.modified_end_point_id(),
            Self::Collection(command) => command.modified_end_point_id(),
            Self::Touch(command) => command.end_point_id(),
        }
    }

    /// Returns the lifecycle position.
    #[must_use]
    pub fn state(&self) -> CommandState {
        match self {
            Self::Object(command) => command.state(),
            Self::Collection(command) => command.state(),
            Self::Touch(command) => command.state(),
        }
    }

    /// Creates the command undoing this one.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotSupported`] for delete commands.
    pub fn inverse(&self) -> CoreResult<RelationEndPointCommand> {
        match self {
            Self::Object(command) => command.inverse().map(Self::Object),
            Self::Collection(command) => command.inverse().map(Self::Collection),
            Self::Touch(command) => Ok(Self::Touch(command.inverse())),
        }
    }

    /// Adds the commands for every opposite end point affected by this change.
    pub fn expand_to_all_related_objects(
        self,
        transaction: &mut ClientTransaction,
    ) -> CoreResult<ExpandedCommand> {
        match self {
            Self::Object(command) => command.expand_to_all_related_objects(transaction),
            Self::Collection(command) => command.expand_to_all_related_objects(transaction),
            Self::Touch(command) => Ok(ExpandedCommand::new(Self::Touch(command), Vec::new())),
        }
    }
}

impl DataManagementCommand for RelationEndPointCommand {
    fn begin(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        match self {
            Self::Object(command) => command.begin(transaction),
            Self::Collection(command) => command.begin(transaction),
            Self::Touch(command) => command.begin(transaction),
        }
    }

    fn perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        match self {
            Self::Object(command) => command.perform(transaction),
            Self::Collection(command) => command.perform(transaction),
            Self::Touch(command) => command.perform(transaction),
        }
    }

    fn end(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        match self {
            Self::Object(command) => command.end(transaction),
            Self::Collection(command) => command.end(transaction),
            Self::Touch(command) => command.end(transaction),
        }
    }
}

impl From<ObjectEndPointCommand> for RelationEndPointCommand {
    fn from(command: ObjectEndPointCommand) -> Self {
        Self::Object(command)
    }
}

impl From<CollectionEndPointCommand> for RelationEndPointCommand {
    fn from(command: CollectionEndPointCommand) -> Self {
        Self::Collection(command)
    }
}

impl From<RelationEndPointTouchCommand> for RelationEndPointCommand {
    fn from(command: RelationEndPointTouchCommand) -> Self {
        Self::Touch(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassId;

    fn end_point_id() -> RelationEndPointId {
        RelationEndPointId::new(ObjectId::from_bytes(ClassId::new("Order"), [1; 16]), "Customer")
    }

    #[test]
    fn perform_without_begin_is_allowed() {
        let mut state = CommandState::Created;
        state.advance(CommandState::Performed, &end_point_id()).unwrap();
        state.advance(CommandState::Ended, &end_point_id()).unwrap();
        assert_eq!(state, CommandState::Ended);
    }

    #[test]
    fn perform_twice_is_rejected() {
        let mut state = CommandState::Created;
        state.advance(CommandState::Begun, &end_point_id()).unwrap();
        state.advance(CommandState::Performed, &end_point_id()).unwrap();
        let err = state
            .advance(CommandState::Performed, &end_point_id())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn end_requires_perform() {
        let mut state = CommandState::Begun;
        assert!(state.advance(CommandState::Ended, &end_point_id()).is_err());
    }
}
