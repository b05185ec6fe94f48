//! Flattened form of transactions and commands.
//!
//! A transaction is flattened into plain data: its data containers, and per
//! end point the state needed to rebuild it. Relation end-point definitions
//! are not stored; they are re-resolved from the mapping using the
//! end-point ID. Synchronization states are stored as their
//! [`SyncStateKind`], and the lazy loader of `Unknown` states is injected
//! again when the transaction is restored.
//!
//! The flattened types encode to CBOR with [`to_cbor`] and decode with
//! [`from_cbor`].

use crate::command::CompositeCommand;
use crate::config::{ChangeDetection, TransactionConfig};
use crate::data::DataContainer;
use crate::end_point::{RelationEndPointId, SyncStateKind, VirtualObjectCache};
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::transaction::TransactionState;
use crate::types::TransactionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Encodes a value as CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|err| CoreError::serialization(err.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|err| CoreError::serialization(err.to_string()))
}

/// Flattened state of one relation end point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlattenedEndPoint {
    /// A real object end point. Its value lives in the data container.
    RealObject {
        /// End-point ID.
        id: RelationEndPointId,
        /// Synchronization state at the time of flattening.
        sync_state: SyncStateKind,
    },
    /// A virtual object end point.
    VirtualObject {
        /// End-point ID.
        id: RelationEndPointId,
        /// Cached value.
        cache: VirtualObjectCache,
        /// Real end points registered with this one.
        registered: Vec<RelationEndPointId>,
    },
    /// A collection end point.
    Collection {
        /// End-point ID.
        id: RelationEndPointId,
        /// Change detection strategy.
        change_detection: ChangeDetection,
        /// Whether the contents are loaded.
        is_data_complete: bool,
        /// Current contents.
        current: Vec<ObjectId>,
        /// Contents as of the last load or commit.
        original: Vec<ObjectId>,
        /// Whether the end point was touched.
        touched: bool,
        /// Real end points registered with this one.
        registered: Vec<RelationEndPointId>,
    },
}

impl FlattenedEndPoint {
    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        match self {
            Self::RealObject { id, .. }
            | Self::VirtualObject { id, .. }
            | Self::Collection { id, .. } => id,
        }
    }
}

/// Flattened state of a whole client transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedTransaction {
    pub(crate) id: TransactionId,
    pub(crate) state: TransactionState,
    pub(crate) config: TransactionConfig,
    pub(crate) containers: Vec<DataContainer>,
    pub(crate) end_points: Vec<FlattenedEndPoint>,
}

impl FlattenedTransaction {
    /// Returns the ID of the flattened transaction.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the state of the flattened transaction.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the flattened data containers.
    #[must_use]
    pub fn containers(&self) -> &[DataContainer] {
        &self.containers
    }

    /// Returns the flattened end points.
    #[must_use]
    pub fn end_points(&self) -> &[FlattenedEndPoint] {
        &self.end_points
    }

    /// Encodes the transaction as CBOR.
    pub fn to_cbor(&self) -> CoreResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes a transaction from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> CoreResult<Self> {
        from_cbor(bytes)
    }
}

/// A command handed over together with the transaction it was created in.
///
/// Commands address end points by ID, so they can only run against the
/// transaction they were created for (or its restored copy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedCommand {
    transaction_id: TransactionId,
    command: CompositeCommand,
}

impl FlattenedCommand {
    /// Flattens `command`, created in `transaction_id`.
    #[must_use]
    pub fn new(transaction_id: TransactionId, command: impl Into<CompositeCommand>) -> Self {
        Self {
            transaction_id,
            command: command.into(),
        }
    }

    /// Returns the transaction the command was created in.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Returns the command if it belongs to `transaction_id`.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidOperation`] for a different transaction.
    pub fn into_command(self, transaction_id: TransactionId) -> CoreResult<CompositeCommand> {
        if self.transaction_id != transaction_id {
            return Err(CoreError::invalid_operation(format!(
                "command of transaction {} cannot run in transaction {transaction_id}",
                self.transaction_id
            )));
        }
        Ok(self.command)
    }

    /// Encodes the command as CBOR.
    pub fn to_cbor(&self) -> CoreResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes a command from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> CoreResult<Self> {
        from_cbor(bytes)
    }
}
