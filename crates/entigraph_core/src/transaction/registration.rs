//! Registration of data containers and their end points.
//!
//! Real end points register with the opposite virtual end point of the
//! object their foreign key points at. The registration is what lets a
//! virtual end point resolve the synchronization state of its real side
//! when it is loaded or unloaded.

use crate::data::DataContainer;
use crate::end_point::{
    CollectionEndPoint, ObjectEndPointSyncState, RealObjectEndPoint, RelationEndPoint,
    RelationEndPointId, SynchronizedObjectEndPointSyncState, UnknownObjectEndPointSyncState,
    UnsynchronizedObjectEndPointSyncState, VirtualObjectEndPoint,
};
use crate::error::{CoreError, CoreResult};
use crate::mapping::{EndPointKind, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use std::sync::Arc;
use tracing::trace;

impl ClientTransaction {
    /// Registers a container and creates the end points it needs right away.
    ///
    /// Real end points are created for every object. Virtual end points are
    /// created complete and empty for new objects; for loaded objects they
    /// are created on first use.
    pub(crate) fn register_data_container(&mut self, container: DataContainer) -> CoreResult<()> {
        let object_id = container.id().clone();
        let is_new = container.is_new();
        self.data_containers.register(container)?;

        for definition in self.mapping.end_point_definitions(object_id.class_id()) {
            let Some(property_name) = definition.property_name() else {
                continue;
            };
            let id = RelationEndPointId::new(object_id.clone(), property_name);
            if self.end_points.contains(&id) {
                continue;
            }
            match definition.kind() {
                EndPointKind::RealObject => self.register_real_end_point(id, definition)?,
                EndPointKind::VirtualObject if is_new => {
                    let end_point =
                        VirtualObjectEndPoint::new_complete(self.id, id, definition, None)?;
                    self.end_points.register(end_point.into())?;
                }
                EndPointKind::Collection if is_new => {
                    let end_point = CollectionEndPoint::new(self.id, id, definition, [])?
                        .with_change_detection(self.config.collection_change_detection);
                    self.end_points.register(end_point.into())?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn register_real_end_point(
        &mut self,
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
    ) -> CoreResult<()> {
        let container = self.data_containers.get_required(id.object_id())?;
        let is_new = container.is_new();
        let foreign_key = container
            .value(id.property_name())?
            .as_object_id()
            .cloned();
        let opposite_id = self.opposite_virtual_end_point_id(&definition, foreign_key.as_ref())?;

        let sync_state: Arc<dyn ObjectEndPointSyncState> = match opposite_id {
            None => Arc::new(SynchronizedObjectEndPointSyncState),
            Some(opposite_id) => {
                self.register_with_opposite(&opposite_id, id.clone())?;
                let opposite = self.end_points.get_required(&opposite_id)?;
                if is_new {
                    Arc::new(SynchronizedObjectEndPointSyncState)
                } else if opposite.is_data_complete() {
                    if holds_object(opposite, id.object_id()) {
                        Arc::new(SynchronizedObjectEndPointSyncState)
                    } else {
                        Arc::new(UnsynchronizedObjectEndPointSyncState)
                    }
                } else {
                    Arc::new(UnknownObjectEndPointSyncState::new(Arc::clone(
                        &self.lazy_loader,
                    )))
                }
            }
        };
        trace!(
            end_point = %id,
            transaction = %self.id,
            sync_state = ?sync_state.kind(),
            "registering real object end point"
        );

        let container = self.data_containers.get_required(id.object_id())?;
        let end_point = RealObjectEndPoint::new(
            self.id,
            id,
            definition,
            container,
            &self.mapping,
            sync_state,
        )?;
        self.end_points.register(end_point.into())
    }

    /// Returns the virtual end point a real end point with `foreign_key`
    /// points at, or `None` for null foreign keys and unidirectional relations.
    pub(crate) fn opposite_virtual_end_point_id(
        &self,
        real_definition: &RelationEndPointDefinition,
        foreign_key: Option<&ObjectId>,
    ) -> CoreResult<Option<RelationEndPointId>> {
        let Some(foreign_key) = foreign_key else {
            return Ok(None);
        };
        let opposite = self
            .mapping
            .opposite_end_point_definition(real_definition)?;
        Ok(opposite
            .property_name()
            .map(|property_name| RelationEndPointId::new(foreign_key.clone(), property_name)))
    }

    /// Creates an incomplete virtual end point unless it is registered already.
    pub(crate) fn ensure_virtual_end_point(&mut self, id: &RelationEndPointId) -> CoreResult<()> {
        if self.end_points.contains(id) {
            return Ok(());
        }
        let definition = self.definition_of(id)?;
        let end_point: RelationEndPoint = match definition.kind() {
            EndPointKind::VirtualObject => {
                VirtualObjectEndPoint::new(self.id, id.clone(), definition)?.into()
            }
            EndPointKind::Collection => {
                CollectionEndPoint::new_incomplete(self.id, id.clone(), definition)?
                    .with_change_detection(self.config.collection_change_detection)
                    .into()
            }
            EndPointKind::RealObject | EndPointKind::Anonymous => {
                return Err(CoreError::invalid_argument(format!(
                    "'{id}' is not a virtual end point"
                )))
            }
        };
        self.end_points.register(end_point)
    }

    pub(crate) fn register_with_opposite(
        &mut self,
        virtual_id: &RelationEndPointId,
        real_id: RelationEndPointId,
    ) -> CoreResult<()> {
        self.ensure_virtual_end_point(virtual_id)?;
        match self.end_points.get_required_mut(virtual_id)? {
            RelationEndPoint::VirtualObject(end_point) => {
                end_point.register_opposite_end_point(real_id);
                Ok(())
            }
            RelationEndPoint::Collection(end_point) => {
                end_point.register_opposite_end_point(real_id);
                Ok(())
            }
            RelationEndPoint::RealObject(_) => Err(CoreError::invalid_argument(format!(
                "'{virtual_id}' is not a virtual end point"
            ))),
        }
    }

    pub(crate) fn unregister_from_opposite(
        &mut self,
        virtual_id: &RelationEndPointId,
        real_id: &RelationEndPointId,
    ) -> CoreResult<()> {
        if !self.end_points.contains(virtual_id) {
            return Ok(());
        }
        match self.end_points.get_required_mut(virtual_id)? {
            RelationEndPoint::VirtualObject(end_point) => {
                end_point.unregister_opposite_end_point(real_id);
            }
            RelationEndPoint::Collection(end_point) => {
                end_point.unregister_opposite_end_point(real_id);
            }
            RelationEndPoint::RealObject(_) => {}
        }
        Ok(())
    }

    /// Moves the registration of a real end point from the end point
    /// `old` points at to the one `new` points at.
    pub(crate) fn move_registration(
        &mut self,
        real_id: &RelationEndPointId,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
    ) -> CoreResult<()> {
        if old == new {
            return Ok(());
        }
        let definition = self.definition_of(real_id)?;
        if let Some(old_id) = self.opposite_virtual_end_point_id(&definition, old)? {
            self.unregister_from_opposite(&old_id, real_id)?;
        }
        if let Some(new_id) = self.opposite_virtual_end_point_id(&definition, new)? {
            self.register_with_opposite(&new_id, real_id.clone())?;
        }
        Ok(())
    }
}

/// Returns `true` if the complete virtual end point holds `object_id`.
pub(crate) fn holds_object(end_point: &RelationEndPoint, object_id: &ObjectId) -> bool {
    match end_point {
        RelationEndPoint::VirtualObject(end_point) => {
            matches!(end_point.opposite_object_id(), Ok(Some(current)) if current == object_id)
        }
        RelationEndPoint::Collection(end_point) => {
            end_point.opposite_domain_objects().contains(object_id)
        }
        RelationEndPoint::RealObject(_) => false,
    }
}
