//! Lazy loading of relation end points.

use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::EndPointKind;
use crate::transaction::ClientTransaction;
use std::fmt;

/// Loads end-point data on demand.
///
/// Virtual end points are loaded the first time their contents are needed.
/// Real object end points in the `Unknown` synchronization state use
/// [`load_opposite_end_point`](Self::load_opposite_end_point) to establish
/// their state. Load failures are propagated unchanged.
pub trait RelationEndPointLazyLoader: fmt::Debug + Send + Sync {
    /// Loads the contents of a collection end point.
    fn load_lazy_collection_end_point(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()>;

    /// Resolves the value of a virtual object end point.
    fn load_lazy_virtual_object_end_point(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()>;

    /// Loads the virtual end point a real object end point points at.
    fn load_opposite_end_point(
        &self,
        transaction: &mut ClientTransaction,
        real_end_point_id: &RelationEndPointId,
    ) -> CoreResult<()>;
}

/// Loader backed by the transaction's own load routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataManagerLazyLoader;

impl RelationEndPointLazyLoader for DataManagerLazyLoader {
    fn load_lazy_collection_end_point(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        expect_kind(transaction, end_point_id, EndPointKind::Collection)?;
        transaction.load_virtual_end_point_data(end_point_id)
    }

    fn load_lazy_virtual_object_end_point(
        &self,
        transaction: &mut ClientTransaction,
        end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        expect_kind(transaction, end_point_id, EndPointKind::VirtualObject)?;
        transaction.load_virtual_end_point_data(end_point_id)
    }

    fn load_opposite_end_point(
        &self,
        transaction: &mut ClientTransaction,
        real_end_point_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        expect_kind(transaction, real_end_point_id, EndPointKind::RealObject)?;
        transaction.load_opposite_virtual_end_point(real_end_point_id)
    }
}

fn expect_kind(
    transaction: &ClientTransaction,
    end_point_id: &RelationEndPointId,
    expected: EndPointKind,
) -> CoreResult<()> {
    let actual = transaction.definition_of(end_point_id)?.kind();
    if actual != expected {
        return Err(CoreError::invalid_argument(format!(
            "end point '{end_point_id}' is {actual:?}, expected {expected:?}"
        )));
    }
    Ok(())
}
