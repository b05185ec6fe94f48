//! Commands combining several end-point commands.

use crate::command::{DataManagementCommand, RelationEndPointCommand};
use crate::error::CoreResult;
use crate::transaction::ClientTransaction;
use serde::{Deserialize, Serialize};

/// An ordered sequence of commands run as one.
///
/// `begin` and `perform` visit the commands in order, `end` in reverse
/// order, so notifications nest around the whole change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeCommand {
    commands: Vec<RelationEndPointCommand>,
}

impl CompositeCommand {
    /// Creates a composite of `commands`.
    #[must_use]
    pub fn new(commands: Vec<RelationEndPointCommand>) -> Self {
        Self { commands }
    }

    /// Returns the contained commands.
    #[must_use]
    pub fn commands(&self) -> &[RelationEndPointCommand] {
        &self.commands
    }

    /// Returns the number of contained commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if there are no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Appends the commands of `other`.
    #[must_use]
    pub fn combine(mut self, other: impl Into<CompositeCommand>) -> Self {
        self.commands.extend(other.into().commands);
        self
    }

    pub(crate) fn push(&mut self, command: impl Into<RelationEndPointCommand>) {
        self.commands.push(command.into());
    }

    /// Creates the composite undoing this one: every inverse, in reverse order.
    pub fn inverse(&self) -> CoreResult<CompositeCommand> {
        self.commands
            .iter()
            .rev()
            .map(RelationEndPointCommand::inverse)
            .collect::<CoreResult<Vec<_>>>()
            .map(Self::new)
    }

    /// Returns the contained commands.
    #[must_use]
    pub fn into_commands(self) -> Vec<RelationEndPointCommand> {
        self.commands
    }
}

impl DataManagementCommand for CompositeCommand {
    fn begin(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        for command in &mut self.commands {
            command.begin(transaction)?;
        }
        Ok(())
    }

    fn perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        for command in &mut self.commands {
            command.perform(transaction)?;
        }
        Ok(())
    }

    fn end(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        for command in self.commands.iter_mut().rev() {
            command.end(transaction)?;
        }
        Ok(())
    }
}

impl From<RelationEndPointCommand> for CompositeCommand {
    fn from(command: RelationEndPointCommand) -> Self {
        Self::new(vec![command])
    }
}

/// A command together with the commands for every opposite end point it affects.
///
/// The first command is the one that was expanded; it performs first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedCommand {
    inner: CompositeCommand,
}

impl ExpandedCommand {
    /// Creates an expanded command from the original and its related commands.
    #[must_use]
    pub fn new(command: RelationEndPointCommand, related: Vec<RelationEndPointCommand>) -> Self {
        let mut commands = Vec::with_capacity(related.len() + 1);
        commands.push(command);
        commands.extend(related);
        Self {
            inner: CompositeCommand::new(commands),
        }
    }

    /// Returns all commands, the expanded one first.
    #[must_use]
    pub fn commands(&self) -> &[RelationEndPointCommand] {
        self.inner.commands()
    }

    /// Creates the composite undoing this change.
    pub fn inverse(&self) -> CoreResult<CompositeCommand> {
        self.inner.inverse()
    }

    /// Returns the underlying composite.
    #[must_use]
    pub fn into_composite(self) -> CompositeCommand {
        self.inner
    }
}

impl From<ExpandedCommand> for CompositeCommand {
    fn from(command: ExpandedCommand) -> Self {
        command.inner
    }
}

impl DataManagementCommand for ExpandedCommand {
    fn begin(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.inner.begin(transaction)
    }

    fn perform(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.inner.perform(transaction)
    }

    fn end(&mut self, transaction: &mut ClientTransaction) -> CoreResult<()> {
        self.inner.end(transaction)
    }
}
