//! Relation end points.
//!
//! An end point is the in-memory representative of one side of one relation
//! instance for one object within one transaction. There are exactly three
//! kinds, modelled as the variants of [`RelationEndPoint`]:
//!
//! - [`RealObjectEndPoint`]: 1:1 side owning a foreign key,
//! - [`VirtualObjectEndPoint`]: 1:1 side derived from the opposite real side,
//! - [`CollectionEndPoint`]: 1:many side holding an ordered collection.

mod collection;
mod domain_object_collection;
mod id;
mod map;
mod real_object;
pub mod sync_state;
mod virtual_object;

pub use collection::CollectionEndPoint;
pub use domain_object_collection::DomainObjectCollection;
pub use id::RelationEndPointId;
pub use map::RelationEndPointMap;
pub use real_object::RealObjectEndPoint;
pub use sync_state::{
    ObjectEndPointSyncState, SyncStateKind, SynchronizedObjectEndPointSyncState,
    UnknownObjectEndPointSyncState, UnsynchronizedObjectEndPointSyncState,
};
pub use virtual_object::{VirtualObjectCache, VirtualObjectData, VirtualObjectEndPoint};

use crate::data::DataContainerMap;
use crate::error::CoreResult;
use crate::mapping::{EndPointKind, RelationEndPointDefinition};
use crate::types::TransactionId;
use std::sync::Arc;

/// One relation end point of any kind.
#[derive(Debug, Clone)]
pub enum RelationEndPoint {
    /// Foreign-key side of a 1:1 or 1:many relation.
    RealObject(RealObjectEndPoint),
    /// Column-less 1:1 side.
    VirtualObject(VirtualObjectEndPoint),
    /// Collection side of a 1:many relation.
    Collection(CollectionEndPoint),
}

impl RelationEndPoint {
    /// Returns the end-point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        match self {
            Self::RealObject(end_point) => end_point.id(),
            Self::VirtualObject(end_point) => end_point.id(),
            Self::Collection(end_point) => end_point.id(),
        }
    }

    /// Returns the relation definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<RelationEndPointDefinition> {
        match self {
            Self::RealObject(end_point) => end_point.definition(),
            Self::VirtualObject(end_point) => end_point.definition(),
            Self::Collection(end_point) => end_point.definition(),
        }
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Self::RealObject(end_point) => end_point.transaction_id(),
            Self::VirtualObject(end_point) => end_point.transaction_id(),
            Self::Collection(end_point) => end_point.transaction_id(),
        }
    }

    /// Returns the end-point kind.
    #[must_use]
    pub fn kind(&self) -> EndPointKind {
        match self {
            Self::RealObject(_) => EndPointKind::RealObject,
            Self::VirtualObject(_) => EndPointKind::VirtualObject,
            Self::Collection(_) => EndPointKind::Collection,
        }
    }

    /// Returns `true` if the end point's data is available without loading.
    #[must_use]
    pub fn is_data_complete(&self) -> bool {
        match self {
            Self::RealObject(_) => true,
            Self::VirtualObject(end_point) => end_point.is_data_complete(),
            Self::Collection(end_point) => end_point.is_data_complete(),
        }
    }

    /// Returns `true` if the end point differs from its original state.
    pub fn has_changed(&self, containers: &DataContainerMap) -> CoreResult<bool> {
        match self {
            Self::RealObject(end_point) => {
                end_point.has_changed(containers.get_required(end_point.id().object_id())?)
            }
            Self::VirtualObject(end_point) => Ok(end_point.has_changed()),
            Self::Collection(end_point) => Ok(end_point.has_changed()),
        }
    }

    /// Returns `true` if the end point was modified or touched since the last commit or rollback.
    pub fn has_been_touched(&self, containers: &DataContainerMap) -> CoreResult<bool> {
        match self {
            Self::RealObject(end_point) => {
                end_point.has_been_touched(containers.get_required(end_point.id().object_id())?)
            }
            Self::VirtualObject(end_point) => Ok(end_point.has_been_touched()),
            Self::Collection(end_point) => Ok(end_point.has_been_touched()),
        }
    }

    /// Makes the current state the new original state.
    pub fn commit(&mut self, containers: &mut DataContainerMap) -> CoreResult<()> {
        match self {
            Self::RealObject(end_point) => {
                end_point.commit(containers.get_required_mut(end_point.id().object_id())?)
            }
            Self::VirtualObject(end_point) => {
                end_point.commit();
                Ok(())
            }
            Self::Collection(end_point) => {
                end_point.commit();
                Ok(())
            }
        }
    }

    /// Restores the original state.
    pub fn rollback(&mut self, containers: &mut DataContainerMap) -> CoreResult<()> {
        match self {
            Self::RealObject(end_point) => {
                end_point.rollback(containers.get_required_mut(end_point.id().object_id())?)
            }
            Self::VirtualObject(end_point) => {
                end_point.rollback();
                Ok(())
            }
            Self::Collection(end_point) => {
                end_point.rollback();
                Ok(())
            }
        }
    }

    /// Returns the real object end point, if this is one.
    #[must_use]
    pub fn as_real_object(&self) -> Option<&RealObjectEndPoint> {
        match self {
            Self::RealObject(end_point) => Some(end_point),
            _ => None,
        }
    }

    /// Returns the virtual object end point, if this is one.
    #[must_use]
    pub fn as_virtual_object(&self) -> Option<&VirtualObjectEndPoint> {
        match self {
            Self::VirtualObject(end_point) => Some(end_point),
            _ => None,
        }
    }

    /// Returns the collection end point, if this is one.
    #[must_use]
    pub fn as_collection(&self) -> Option<&CollectionEndPoint> {
        match self {
            Self::Collection(end_point) => Some(end_point),
            _ => None,
        }
    }
}

impl From<RealObjectEndPoint> for RelationEndPoint {
    fn from(end_point: RealObjectEndPoint) -> Self {
        Self::RealObject(end_point)
    }
}

impl From<VirtualObjectEndPoint> for RelationEndPoint {
    fn from(end_point: VirtualObjectEndPoint) -> Self {
        Self::VirtualObject(end_point)
    }
}

impl From<CollectionEndPoint> for RelationEndPoint {
    fn from(end_point: CollectionEndPoint) -> Self {
        Self::Collection(end_point)
    }
}
