//! Verification of the bidirectional relation invariant.
//!
//! Walks every loaded end point of a transaction and checks that both sides
//! of each synchronized bidirectional relation agree. Pairs involving a
//! deleted object, an incomplete virtual end point or an end point that is
//! not synchronized are skipped.

use crate::end_point::{RelationEndPoint, RelationEndPointId, SyncStateKind};
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use tracing::warn;

/// Checks that every synchronized pair of loaded end points agrees.
///
/// # Errors
///
/// Returns [`CoreError::InconsistentRelation`] describing the first
/// disagreement found.
pub fn verify_consistency(transaction: &ClientTransaction) -> CoreResult<()> {
    for end_point in transaction.end_points().iter() {
        if is_deleted(transaction, end_point.id().object_id()) {
            continue;
        }
        let result = match end_point {
            RelationEndPoint::RealObject(_) => verify_real(transaction, end_point),
            RelationEndPoint::VirtualObject(virtual_end_point) => {
                match virtual_end_point.opposite_object_id() {
                    Ok(opposite) => verify_related_item(transaction, end_point, opposite),
                    Err(_) => Ok(()),
                }
            }
            RelationEndPoint::Collection(collection) if collection.is_data_complete() => collection
                .opposite_domain_objects()
                .iter()
                .try_for_each(|item| verify_related_item(transaction, end_point, Some(item))),
            RelationEndPoint::Collection(_) => Ok(()),
        };
        if let Err(err) = result {
            warn!(transaction = %transaction.id(), end_point = %end_point.id(), error = %err, "relation inconsistency");
            return Err(err);
        }
    }
    Ok(())
}

/// A synchronized foreign key must be held by a complete opposite end point.
fn verify_real(transaction: &ClientTransaction, end_point: &RelationEndPoint) -> CoreResult<()> {
    let Some(real) = end_point.as_real_object() else {
        return Ok(());
    };
    if real.sync_state_kind() != SyncStateKind::Synchronized {
        return Ok(());
    }
    let Some(opposite_property) = opposite_property(transaction, end_point)? else {
        return Ok(());
    };
    let Some(foreign_key) = foreign_key(transaction, real.id())? else {
        return Ok(());
    };
    if is_deleted(transaction, &foreign_key) {
        return Ok(());
    }
    let opposite_id = RelationEndPointId::new(foreign_key, opposite_property);
    let Some(opposite) = transaction.end_points().get(&opposite_id) else {
        return Ok(());
    };
    if !opposite.is_data_complete() {
        return Ok(());
    }
    let object_id = real.id().object_id();
    let holds = match opposite {
        RelationEndPoint::VirtualObject(virtual_end_point) => {
            virtual_end_point.opposite_object_id()? == Some(object_id)
        }
        RelationEndPoint::Collection(collection) => {
            collection.opposite_domain_objects().contains(object_id)
        }
        RelationEndPoint::RealObject(_) => true,
    };
    if holds {
        Ok(())
    } else {
        Err(CoreError::inconsistent_relation(format!(
            "'{}' points at '{}', but '{opposite_id}' does not hold '{object_id}'",
            real.id(),
            opposite_id.object_id()
        )))
    }
}

/// An object held by a virtual end point must point back at its owner.
fn verify_related_item(
    transaction: &ClientTransaction,
    end_point: &RelationEndPoint,
    item: Option<&ObjectId>,
) -> CoreResult<()> {
    let Some(item) = item else {
        return Ok(());
    };
    if is_deleted(transaction, item) || !transaction.data_containers().contains(item) {
        return Ok(());
    }
    let Some(opposite_property) = opposite_property(transaction, end_point)? else {
        return Ok(());
    };
    let real_id = RelationEndPointId::new(item.clone(), opposite_property);
    let synchronized = transaction
        .end_points()
        .get(&real_id)
        .and_then(RelationEndPoint::as_real_object)
        .is_some_and(|real| real.sync_state_kind() == SyncStateKind::Synchronized);
    if !synchronized {
        return Ok(());
    }
    let owner = end_point.id().object_id();
    let foreign_key = foreign_key(transaction, &real_id)?;
    if foreign_key.as_ref() == Some(owner) {
        Ok(())
    } else {
        Err(CoreError::inconsistent_relation(format!(
            "'{}' holds '{item}', but '{real_id}' points at {}",
            end_point.id(),
            foreign_key.map_or_else(|| "nothing".to_string(), |id| format!("'{id}'"))
        )))
    }
}

fn opposite_property(
    transaction: &ClientTransaction,
    end_point: &RelationEndPoint,
) -> CoreResult<Option<String>> {
    let opposite = transaction
        .mapping()
        .opposite_end_point_definition(end_point.definition())?;
    Ok(opposite.property_name().map(str::to_string))
}

fn foreign_key(
    transaction: &ClientTransaction,
    real_id: &RelationEndPointId,
) -> CoreResult<Option<ObjectId>> {
    Ok(transaction
        .data_containers()
        .get_required(real_id.object_id())?
        .value(real_id.property_name())?
        .as_object_id()
        .cloned())
}

fn is_deleted(transaction: &ClientTransaction, object_id: &ObjectId) -> bool {
    transaction
        .data_containers()
        .get(object_id)
        .is_some_and(|container| container.is_deleted())
}
