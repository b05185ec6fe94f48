//! Synchronization states of object end points.
//!
//! A real object end point is `Synchronized` when its foreign key and the
//! opposite virtual end point agree, `Unsynchronized` when they are known to
//! disagree, and `Unknown` until the opposite side has been loaded. The state
//! is a strategy object the end point holds and swaps; every relation change
//! of the end point is created through it.

use crate::command::{ObjectCommandKind, ObjectEndPointCommand, OppositeObjectIdSetter};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::lazy_loader::RelationEndPointLazyLoader;
use crate::mapping::{Cardinality, EndPointKind};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Discriminant of a synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStateKind {
    /// Both sides agree.
    Synchronized,
    /// The sides are known to disagree.
    Unsynchronized,
    /// Not established until the opposite side is loaded.
    Unknown,
}

/// Strategy deciding how an object end point handles synchronization and changes.
pub trait ObjectEndPointSyncState: fmt::Debug + Send + Sync {
    /// Returns the state discriminant.
    fn kind(&self) -> SyncStateKind;

    /// Returns `true` if the end point agrees with its opposite side.
    fn is_synchronized(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<bool>;

    /// Brings the opposite side in line with this end point.
    fn synchronize(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()>;

    /// Creates the command run when the owning object is deleted.
    fn create_delete_command(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand>;

    /// Creates the command setting the end point to `new_related_object`.
    fn create_set_command(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        new_related_object: Option<&ObjectId>,
        setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand>;
}

/// Both sides agree; changes are created directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynchronizedObjectEndPointSyncState;

impl ObjectEndPointSyncState for SynchronizedObjectEndPointSyncState {
    fn kind(&self) -> SyncStateKind {
        SyncStateKind::Synchronized
    }

    fn is_synchronized(
        &self,
        _transaction: &mut ClientTransaction,
        _end_point_id: &RelationEndPointId,
    ) -> CoreResult<bool> {
        Ok(true)
    }

    fn synchronize(
        &self,
        _transaction: &mut ClientTransaction,
        _end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        Ok(())
    }

    fn create_delete_command(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand> {
        let old_related_object = transaction.opposite_object_id(end_point_id)?;
        Ok(ObjectEndPointCommand::new(
            ObjectCommandKind::Delete,
            end_point_id.clone(),
            old_related_object,
            None,
            setter,
        ))
    }

    fn create_set_command(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        new_related_object: Option<&ObjectId>,
        setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand> {
        let definition = transaction.definition_of(end_point_id)?;
        if definition.cardinality() != Cardinality::One {
            return Err(CoreError::invalid_argument(format!(
                "'{end_point_id}' is not an object end point"
            )));
        }
        let mapping = Arc::clone(transaction.mapping());
        let opposite = mapping.opposite_end_point_definition(&definition)?;
        if let Some(new_id) = new_related_object {
            if !mapping.is_same_or_base_class(opposite.class_id(), new_id.class_id()) {
                return Err(CoreError::invalid_argument(format!(
                    "'{new_id}' cannot be assigned to '{end_point_id}', which expects '{}'",
                    opposite.class_id()
                )));
            }
        }

        let old_related_object = transaction.opposite_object_id(end_point_id)?;
        let kind = if old_related_object.as_ref() == new_related_object {
            ObjectCommandKind::SetSame
        } else {
            match opposite.kind() {
                EndPointKind::Anonymous => ObjectCommandKind::SetUnidirectional,
                EndPointKind::Collection => ObjectCommandKind::SetOneMany,
                EndPointKind::RealObject | EndPointKind::VirtualObject => {
                    ObjectCommandKind::SetOneOne
                }
            }
        };
        trace!(end_point = %end_point_id, ?kind, "created set command");

        Ok(ObjectEndPointCommand::new(
            kind,
            end_point_id.clone(),
            old_related_object,
            new_related_object.cloned(),
            setter,
        ))
    }
}

/// The sides disagree; changes fail until the end point is synchronized.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsynchronizedObjectEndPointSyncState;

impl ObjectEndPointSyncState for UnsynchronizedObjectEndPointSyncState {
    fn kind(&self) -> SyncStateKind {
        SyncStateKind::Unsynchronized
    }

    fn is_synchronized(
        &self,
        _transaction: &mut ClientTransaction,
        _end_point_id: &RelationEndPointId,
    ) -> CoreResult<bool> {
        Ok(false)
    }

    fn synchronize(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        transaction.synchronize_with_opposite(end_point_id)
    }

    fn create_delete_command(
        &self,
        _transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        _setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand> {
        Err(CoreError::out_of_sync(end_point_id.clone()))
    }

    fn create_set_command(
        &self,
        _transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        _new_related_object: Option<&ObjectId>,
        _setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand> {
        Err(CoreError::out_of_sync(end_point_id.clone()))
    }
}

/// Not yet established; every call loads the opposite side first and
/// forwards to the state the end point has afterwards.
#[derive(Debug, Clone)]
pub struct UnknownObjectEndPointSyncState {
    lazy_loader: Arc<dyn RelationEndPointLazyLoader>,
}

impl UnknownObjectEndPointSyncState {
    /// Creates the state around the loader used to resolve it.
    #[must_use]
    pub fn new(lazy_loader: Arc<dyn RelationEndPointLazyLoader>) -> Self {
        Self { lazy_loader }
    }

    /// Returns the injected lazy loader.
    #[must_use]
    pub fn lazy_loader(&self) -> &Arc<dyn RelationEndPointLazyLoader> {
        &self.lazy_loader
    }

    fn resolve(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<Arc<dyn ObjectEndPointSyncState>> {
        self.lazy_loader
            .load_opposite_end_point(transaction, end_point_id)?;
        let state = Arc::clone(
            transaction
                .end_points()
                .real_object(end_point_id)?
                .sync_state(),
        );
        if state.kind() == SyncStateKind::Unknown {
            return Err(CoreError::invalid_operation(format!(
                "loading the opposite end point of '{end_point_id}' did not establish its synchronization state"
            )));
        }
        Ok(state)
    }
}

impl ObjectEndPointSyncState for UnknownObjectEndPointSyncState {
    fn kind(&self) -> SyncStateKind {
        SyncStateKind::Unknown
    }

    fn is_synchronized(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<bool> {
        self.resolve(transaction, end_point_id)?
            .is_synchronized(transaction, end_point_id)
    }

    fn synchronize(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        self.resolve(transaction, end_point_id)?
            .synchronize(transaction, end_point_id)
    }

    fn create_delete_command(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand> {
        self.resolve(transaction, end_point_id)?
            .create_delete_command(transaction, end_point_id, setter)
    }

    fn create_set_command(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
        new_related_object: Option<&ObjectId>,
        setter: OppositeObjectIdSetter,
    ) -> CoreResult<ObjectEndPointCommand> {
        self.resolve(transaction, end_point_id)?.create_set_command(
            transaction,
            end_point_id,
            new_related_object,
            setter,
        )
    }
}
