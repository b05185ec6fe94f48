//! Loading and unloading of objects and virtual end points.

use crate::end_point::{
    ObjectEndPointSyncState, RelationEndPoint, RelationEndPointId, SyncStateKind,
    SynchronizedObjectEndPointSyncState, UnknownObjectEndPointSyncState,
    UnsynchronizedObjectEndPointSyncState,
};
use crate::error::{CoreError, CoreResult};
use crate::mapping::EndPointKind;
use crate::object::ObjectId;
use crate::transaction::registration::holds_object;
use crate::transaction::ClientTransaction;
use std::sync::Arc;
use tracing::debug;

impl ClientTransaction {
    /// Loads an object from the persistence source unless it is registered already.
    pub(crate) fn ensure_object_loaded(&mut self, object_id: &ObjectId) -> CoreResult<()> {
        if self.data_containers.contains(object_id) {
            return Ok(());
        }
        let mut container = self
            .source
            .load_data_container(object_id)?
            .ok_or_else(|| CoreError::object_not_found(object_id.clone()))?;
        container.complete_properties(&self.mapping)?;
        self.stats.record_object_loaded();
        debug!(transaction = %self.id, object = %object_id, "loaded object");
        self.register_data_container(container)
    }

    /// Makes sure the end point exists and its data is available, loading
    /// virtual end points through the lazy loader.
    pub(crate) fn ensure_end_point_complete(&mut self, id: &RelationEndPointId) -> CoreResult<()> {
        let kind = self.definition_of(id)?.kind();
        self.ensure_object_loaded(id.object_id())?;
        if self
            .end_points
            .get(id)
            .is_some_and(RelationEndPoint::is_data_complete)
        {
            return Ok(());
        }
        let lazy_loader = Arc::clone(&self.lazy_loader);
        match kind {
            EndPointKind::RealObject => Ok(()),
            EndPointKind::VirtualObject => {
                lazy_loader.load_lazy_virtual_object_end_point(self, id)
            }
            EndPointKind::Collection => lazy_loader.load_lazy_collection_end_point(self, id),
            EndPointKind::Anonymous => Err(CoreError::invalid_argument(format!(
                "anonymous end point '{id}' cannot be loaded"
            ))),
        }
    }

    /// Loads the contents of a virtual end point from the persistence source.
    ///
    /// Related objects not yet part of the transaction are registered. The
    /// end point holds every related object whose current foreign key points
    /// at its owner. Afterwards all real end points registered with it have a
    /// known synchronization state: synchronized if the end point holds
    /// their object, unsynchronized otherwise.
    ///
    /// Loading a complete end point does nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Load`] if a 1:1 end point would hold more than
    /// one object, and propagates persistence failures unchanged.
    pub fn load_virtual_end_point_data(&mut self, id: &RelationEndPointId) -> CoreResult<()> {
        self.ensure_active()?;
        let definition = self.definition_of(id)?;
        if !matches!(
            definition.kind(),
            EndPointKind::VirtualObject | EndPointKind::Collection
        ) {
            return Err(CoreError::invalid_argument(format!(
                "'{id}' is not a virtual end point"
            )));
        }
        self.ensure_object_loaded(id.object_id())?;
        self.ensure_virtual_end_point(id)?;
        if self.end_points.get_required(id)?.is_data_complete() {
            return Ok(());
        }

        let real_definition = self.mapping.opposite_end_point_definition(&definition)?;
        let real_property = real_definition.property_name().ok_or_else(|| {
            CoreError::mapping(format!("'{definition}' has no navigable opposite"))
        })?;
        let loaded = self
            .source
            .load_related_data_containers(id, &real_definition)?;

        let mut items = Vec::with_capacity(loaded.len());
        for mut container in loaded {
            let object_id = container.id().clone();
            if !self.data_containers.contains(&object_id) {
                container.complete_properties(&self.mapping)?;
                self.stats.record_object_loaded();
                self.register_data_container(container)?;
            }
            let current = self.data_containers.get_required(&object_id)?;
            let points_here =
                current.value(real_property)?.as_object_id() == Some(id.object_id());
            if !current.is_deleted() && points_here {
                items.push(object_id);
            }
        }

        match self.end_points.get_required_mut(id)? {
            RelationEndPoint::VirtualObject(end_point) => {
                if items.len() > 1 {
                    return Err(CoreError::load(format!(
                        "'{id}' is a 1:1 end point but {} objects point at it",
                        items.len()
                    )));
                }
                end_point.mark_data_complete(items.first().cloned())?;
            }
            RelationEndPoint::Collection(end_point) => {
                end_point.mark_data_complete(items.iter().cloned())?;
            }
            RelationEndPoint::RealObject(_) => {
                return Err(CoreError::invalid_operation(format!(
                    "'{id}' is registered as a real end point"
                )))
            }
        }
        self.stats.record_end_point_loaded();
        debug!(
            end_point = %id,
            transaction = %self.id,
            objects = items.len(),
            "loaded virtual end point"
        );

        let registered = registered_opposite_end_points(self.end_points.get_required(id)?);
        for real_id in registered {
            let contained = items.contains(real_id.object_id());
            self.resolve_unknown_sync_state(&real_id, contained)?;
        }
        Ok(())
    }

    /// Loads the virtual end point a real end point points at and settles
    /// its synchronization state.
    ///
    /// Real end points with a null foreign key or a unidirectional relation
    /// become synchronized without loading anything.
    pub fn load_opposite_virtual_end_point(
        &mut self,
        real_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        self.ensure_object_loaded(real_id.object_id())?;
        let definition = self.definition_of(real_id)?;
        let foreign_key = self.foreign_key(real_id)?;
        let Some(opposite_id) =
            self.opposite_virtual_end_point_id(&definition, foreign_key.as_ref())?
        else {
            return self.resolve_unknown_sync_state(real_id, true);
        };

        self.load_virtual_end_point_data(&opposite_id)?;
        let contained = holds_object(
            self.end_points.get_required(&opposite_id)?,
            real_id.object_id(),
        );
        self.resolve_unknown_sync_state(real_id, contained)
    }

    /// Drops the loaded data of a virtual end point.
    ///
    /// Real end points registered with it return to the unknown state; a
    /// virtual object end point is invalidated, a collection end point
    /// becomes incomplete. Unloading an end point that is not loaded does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidOperation`] if the end point has changed.
    pub fn unload_virtual_end_point(&mut self, id: &RelationEndPointId) -> CoreResult<()> {
        self.ensure_active()?;
        let kind = self.definition_of(id)?.kind();
        if !matches!(kind, EndPointKind::VirtualObject | EndPointKind::Collection) {
            return Err(CoreError::invalid_argument(format!(
                "'{id}' is not a virtual end point"
            )));
        }
        let Some(end_point) = self.end_points.get(id) else {
            return Ok(());
        };
        if !end_point.is_data_complete() {
            return Ok(());
        }
        if end_point.has_changed(&self.data_containers)? {
            return Err(CoreError::invalid_operation(format!(
                "end point '{id}' cannot be unloaded because it has changed"
            )));
        }

        for real_id in registered_opposite_end_points(end_point) {
            let unknown = UnknownObjectEndPointSyncState::new(Arc::clone(&self.lazy_loader));
            self.end_points
                .real_object_mut(&real_id)?
                .set_sync_state(Arc::new(unknown));
        }
        match self.end_points.get_required_mut(id)? {
            RelationEndPoint::VirtualObject(end_point) => end_point.invalidate()?,
            RelationEndPoint::Collection(end_point) => end_point.mark_data_incomplete()?,
            RelationEndPoint::RealObject(_) => {}
        }
        self.stats.record_end_point_unloaded();
        debug!(end_point = %id, transaction = %self.id, "unloaded virtual end point");
        Ok(())
    }

    fn resolve_unknown_sync_state(
        &mut self,
        real_id: &RelationEndPointId,
        contained: bool,
    ) -> CoreResult<()> {
        let end_point = self.end_points.real_object_mut(real_id)?;
        if end_point.sync_state_kind() != SyncStateKind::Unknown {
            return Ok(());
        }
        let state: Arc<dyn ObjectEndPointSyncState> = if contained {
            Arc::new(SynchronizedObjectEndPointSyncState)
        } else {
            Arc::new(UnsynchronizedObjectEndPointSyncState)
        };
        debug!(
            end_point = %real_id,
            transaction = %self.id,
            sync_state = ?state.kind(),
            "resolved synchronization state"
        );
        end_point.set_sync_state(state);
        Ok(())
    }
}

fn registered_opposite_end_points(end_point: &RelationEndPoint) -> Vec<RelationEndPointId> {
    match end_point {
        RelationEndPoint::VirtualObject(end_point) => {
            end_point.registered_opposite_end_points().iter().cloned().collect()
        }
        RelationEndPoint::Collection(end_point) => {
            end_point.registered_opposite_end_points().iter().cloned().collect()
        }
        RelationEndPoint::RealObject(_) => Vec::new(),
    }
}
