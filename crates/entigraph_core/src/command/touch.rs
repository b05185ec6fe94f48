//! Command touching an end point without changing it.

use crate::command::{CommandState, DataManagementCommand};
use crate::end_point::RelationEndPointId;
use crate::error::CoreResult;
use crate::transaction::ClientTransaction;
use serde::{Deserialize, Serialize};

/// Marks an end point as touched.
///
/// Used for the opposite side of "set to the same value" changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEndPointTouchCommand {
    end_point_id: RelationEndPointId,
    state: CommandState,
}

impl RelationEndPointTouchCommand {
    /// Creates a touch command.
    #[must_use]
    pub fn new(end_point_id: RelationEndPointId) -> Self {
        Self {
            end_point_id,
            state: CommandState::Created,
        }
    }

    /// Returns the touched end point.
    #[must_use]
    pub fn end_point_id(&self) -> &RelationEndPointId {
        &self.end_point_id
    }

    /// Returns the lifecycle position.
    #[must_use]
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// A touch cannot be undone; its inverse touches again.
    #[must_use]
    pub fn inverse(&self) -> RelationEndPointTouchCommand {
        Self::new(self.end_point_id.clone())
    }
}

impl DataManagementCommand for RelationEndPointTouchCommand {
    fn begin(&mut self, _transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state.advance(CommandState::Begun, &self.end_point_id)
    }

    fn perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state
            .ensure_can_advance(CommandState::Performed, &self.end_point_id)?;
        transaction.touch_end_point(&self.end_point_id)?;
        self.state = CommandState::Performed;
        Ok(())
    }

    fn end(&mut self, _transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.state.advance(CommandState::Ended, &self.end_point_id)
    }
}
