//! Flattening a transaction for hand-over and restoring it.

use crate::end_point::{
    CollectionEndPoint, ObjectEndPointSyncState, RealObjectEndPoint, RelationEndPoint,
    SyncStateKind, SynchronizedObjectEndPointSyncState, UnknownObjectEndPointSyncState,
    UnsynchronizedObjectEndPointSyncState, VirtualObjectEndPoint,
};
use crate::error::CoreResult;
use crate::serialization::{FlattenedEndPoint, FlattenedTransaction};
use crate::transaction::{ClientTransaction, ClientTransactionBuilder, NEXT_TRANSACTION_ID};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

impl ClientTransaction {
    /// Captures the data containers and end points of the transaction.
    ///
    /// Listeners, statistics, the persistence source and the lazy loader
    /// are not part of the flattened form.
    #[must_use]
    pub fn flatten(&self) -> FlattenedTransaction {
        let end_points = self
            .end_points
            .iter()
            .map(|end_point| match end_point {
                RelationEndPoint::RealObject(end_point) => FlattenedEndPoint::RealObject {
                    id: end_point.id().clone(),
                    sync_state: end_point.sync_state_kind(),
                },
                RelationEndPoint::VirtualObject(end_point) => FlattenedEndPoint::VirtualObject {
                    id: end_point.id().clone(),
                    cache: end_point.cache().clone(),
                    registered: end_point
                        .registered_opposite_end_points()
                        .iter()
                        .cloned()
                        .collect(),
                },
                RelationEndPoint::Collection(end_point) => FlattenedEndPoint::Collection {
                    id: end_point.id().clone(),
                    change_detection: end_point.change_detection(),
                    is_data_complete: end_point.is_data_complete(),
                    current: end_point.opposite_domain_objects().to_vec(),
                    original: end_point.original_opposite_domain_objects().to_vec(),
                    touched: end_point.has_been_touched(),
                    registered: end_point
                        .registered_opposite_end_points()
                        .iter()
                        .cloned()
                        .collect(),
                },
            })
            .collect();

        FlattenedTransaction {
            id: self.id,
            state: self.state,
            config: self.config.clone(),
            containers: self.data_containers.iter().cloned().collect(),
            end_points,
        }
    }
}

impl ClientTransactionBuilder {
    /// Rebuilds a flattened transaction under its original ID.
    ///
    /// The builder supplies the mapping, persistence source, lazy loader,
    /// listeners and statistics; the configuration is taken from the
    /// flattened transaction. End-point definitions are resolved against
    /// the builder's mapping.
    ///
    /// # Errors
    ///
    /// Fails if a container or end point does not fit the mapping.
    pub fn restore(mut self, flattened: FlattenedTransaction) -> CoreResult<ClientTransaction> {
        let FlattenedTransaction {
            id,
            state,
            config,
            containers,
            end_points,
        } = flattened;
        NEXT_TRANSACTION_ID.fetch_max(id.as_u64() + 1, Ordering::Relaxed);
        self.config = config;

        let mut transaction = self.build_with_id(id);
        transaction.state = state;
        for mut container in containers {
            container.complete_properties(&transaction.mapping)?;
            transaction.data_containers.register(container)?;
        }
        for end_point in end_points {
            let end_point = transaction.restore_end_point(end_point)?;
            transaction.end_points.register(end_point)?;
        }
        debug!(
            transaction = %transaction.id,
            objects = transaction.data_containers.len(),
            end_points = transaction.end_points.len(),
            "restored flattened transaction"
        );
        Ok(transaction)
    }
}

impl ClientTransaction {
    fn restore_end_point(&self, flattened: FlattenedEndPoint) -> CoreResult<RelationEndPoint> {
        let definition = self.definition_of(flattened.id())?;
        Ok(match flattened {
            FlattenedEndPoint::RealObject { id, sync_state } => {
                let sync_state: Arc<dyn ObjectEndPointSyncState> = match sync_state {
                    SyncStateKind::Synchronized => Arc::new(SynchronizedObjectEndPointSyncState),
                    SyncStateKind::Unsynchronized => {
                        Arc::new(UnsynchronizedObjectEndPointSyncState)
                    }
                    SyncStateKind::Unknown => Arc::new(UnknownObjectEndPointSyncState::new(
                        Arc::clone(&self.lazy_loader),
                    )),
                };
                let container = self.data_containers.get_required(id.object_id())?;
                RealObjectEndPoint::new(
                    self.id,
                    id,
                    definition,
                    container,
                    &self.mapping,
                    sync_state,
                )?
                .into()
            }
            FlattenedEndPoint::VirtualObject {
                id,
                cache,
                registered,
            } => {
                let mut end_point = VirtualObjectEndPoint::new(self.id, id, definition)?;
                end_point.restore(cache, registered);
                end_point.into()
            }
            FlattenedEndPoint::Collection {
                id,
                change_detection,
                is_data_complete,
                current,
                original,
                touched,
                registered,
            } => {
                let mut end_point = CollectionEndPoint::new_incomplete(self.id, id, definition)?
                    .with_change_detection(change_detection);
                end_point.restore(is_data_complete, current, original, touched, registered);
                end_point.into()
            }
        })
    }
}
