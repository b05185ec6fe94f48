//! The client transaction: unit of work over an in-memory object graph.
//!
//! A [`ClientTransaction`] owns the data containers and relation end points
//! of every object it has loaded or created. All relation changes are
//! expressed as commands, expanded to both sides of the relation and
//! performed against the transaction, which is passed explicitly to every
//! end point, sync state and command that needs it.
//!
//! Commit makes the current state the new original state (and hands the
//! changes to the persistence source); rollback restores the original
//! state. The transaction stays usable after both.

mod commit;
mod delete;
mod flatten;
mod loading;
mod registration;
mod relations;
mod state;

pub use relations::RelatedObjectsMut;
pub use state::TransactionState;

use crate::config::TransactionConfig;
use crate::data::{DataContainer, DataContainerMap, Value};
use crate::end_point::{RelationEndPointId, RelationEndPointMap};
use crate::error::{CoreError, CoreResult};
use crate::lazy_loader::{DataManagerLazyLoader, RelationEndPointLazyLoader};
use crate::listener::ClientTransactionListener;
use crate::mapping::{MappingConfiguration, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::persistence::PersistenceSource;
use crate::stats::TransactionStats;
use crate::types::{ClassId, TransactionId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// A unit of work tracking objects, relations and their changes.
///
/// The transaction is driven by one thread of control at a time; it holds
/// no locks. Shared collaborators (mapping, persistence source, lazy
/// loader, listeners, stats) are `Send + Sync` and held through `Arc`.
pub struct ClientTransaction {
    id: TransactionId,
    state: TransactionState,
    config: TransactionConfig,
    mapping: Arc<MappingConfiguration>,
    source: Arc<dyn PersistenceSource>,
    lazy_loader: Arc<dyn RelationEndPointLazyLoader>,
    listeners: Vec<Arc<dyn ClientTransactionListener>>,
    stats: Arc<TransactionStats>,
    data_containers: DataContainerMap,
    end_points: RelationEndPointMap,
}

impl ClientTransaction {
    /// Creates a transaction with default configuration and the
    /// [`DataManagerLazyLoader`].
    #[must_use]
    pub fn new(mapping: Arc<MappingConfiguration>, source: Arc<dyn PersistenceSource>) -> Self {
        Self::builder(mapping, source).build()
    }

    /// Starts building a transaction.
    #[must_use]
    pub fn builder(
        mapping: Arc<MappingConfiguration>,
        source: Arc<dyn PersistenceSource>,
    ) -> ClientTransactionBuilder {
        ClientTransactionBuilder::new(mapping, source)
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction can still be used.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Returns the mapping configuration.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.mapping
    }

    /// Returns the injected lazy loader.
    #[must_use]
    pub fn lazy_loader(&self) -> &Arc<dyn RelationEndPointLazyLoader> {
        &self.lazy_loader
    }

    /// Returns the statistics this transaction records into.
    #[must_use]
    pub fn stats(&self) -> &Arc<TransactionStats> {
        &self.stats
    }

    /// Returns the registered data containers.
    #[must_use]
    pub fn data_containers(&self) -> &DataContainerMap {
        &self.data_containers
    }

    pub(crate) fn data_containers_mut(&mut self) -> &mut DataContainerMap {
        &mut self.data_containers
    }

    /// Returns the registered relation end points.
    #[must_use]
    pub fn end_points(&self) -> &RelationEndPointMap {
        &self.end_points
    }

    pub(crate) fn end_points_mut(&mut self) -> &mut RelationEndPointMap {
        &mut self.end_points
    }

    /// Returns the definition of the relation end point `id` names.
    pub fn definition_of(
        &self,
        id: &RelationEndPointId,
    ) -> CoreResult<Arc<RelationEndPointDefinition>> {
        self.mapping
            .end_point_definition(id.object_id().class_id(), id.property_name())
    }

    /// Ends the transaction. Every later operation fails.
    pub fn discard(&mut self) {
        if self.state == TransactionState::Active {
            debug!(transaction = %self.id, "discarding transaction");
            self.state = TransactionState::Discarded;
        }
    }

    /// Creates a new object of `class_id` with all properties at their defaults.
    pub fn new_object(&mut self, class_id: impl Into<ClassId>) -> CoreResult<ObjectId> {
        self.ensure_active()?;
        let class_id = class_id.into();
        self.mapping.class_definition(&class_id)?;
        let object_id = ObjectId::new(class_id);
        let container = DataContainer::new_object(object_id.clone(), &self.mapping)?;
        self.register_data_container(container)?;
        debug!(transaction = %self.id, object = %object_id, "created new object");
        Ok(object_id)
    }

    /// Returns the data container of an object, loading it if necessary.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::ObjectNotFound`] if the object exists neither
    /// in the transaction nor in the persistence source.
    pub fn get_object(&mut self, object_id: &ObjectId) -> CoreResult<&DataContainer> {
        self.ensure_active()?;
        self.ensure_object_loaded(object_id)?;
        self.data_containers.get_required(object_id)
    }

    /// Reads a property and notifies listeners about the read.
    pub fn property_value(&mut self, object_id: &ObjectId, property_name: &str) -> CoreResult<&Value> {
        self.ensure_active()?;
        self.ensure_object_loaded(object_id)?;
        self.data_containers
            .get_required(object_id)?
            .value(property_name)?;

        let transaction_id = self.id;
        self.notify_listeners(|listener| {
            listener.property_value_read(transaction_id, object_id, property_name);
        });
        self.data_containers
            .get_required(object_id)?
            .value(property_name)
    }

    /// Writes a scalar property.
    ///
    /// # Errors
    ///
    /// Foreign-key properties are rejected with [`CoreError::InvalidOperation`];
    /// relations change through [`set_related_object`](Self::set_related_object).
    pub fn set_property_value(
        &mut self,
        object_id: &ObjectId,
        property_name: &str,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        self.ensure_object_loaded(object_id)?;
        let property = self
            .mapping
            .property_definition(object_id.class_id(), property_name)?;
        if property.is_foreign_key() {
            return Err(CoreError::invalid_operation(format!(
                "'{property_name}' of '{object_id}' is a relation property; set the related object instead"
            )));
        }
        self.data_containers
            .get_required_mut(object_id)?
            .set_value(property_name, value.into())
    }

    pub(crate) fn notify_listeners(&self, notify: impl Fn(&dyn ClientTransactionListener)) {
        for listener in &self.listeners {
            notify(listener.as_ref());
        }
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.state != TransactionState::Active {
            return Err(CoreError::invalid_operation(format!(
                "transaction {} has been discarded",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_not_deleted(&self, object_id: &ObjectId) -> CoreResult<()> {
        if self.data_containers.get_required(object_id)?.is_deleted() {
            return Err(CoreError::object_deleted(object_id.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTransaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("lazy_loader", &self.lazy_loader)
            .field("listeners", &self.listeners.len())
            .field("data_containers", &self.data_containers.len())
            .field("end_points", &self.end_points.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientTransaction`].
pub struct ClientTransactionBuilder {
    mapping: Arc<MappingConfiguration>,
    source: Arc<dyn PersistenceSource>,
    config: TransactionConfig,
    lazy_loader: Arc<dyn RelationEndPointLazyLoader>,
    listeners: Vec<Arc<dyn ClientTransactionListener>>,
    stats: Arc<TransactionStats>,
}

impl ClientTransactionBuilder {
    fn new(mapping: Arc<MappingConfiguration>, source: Arc<dyn PersistenceSource>) -> Self {
        Self {
            mapping,
            source,
            config: TransactionConfig::default(),
            lazy_loader: Arc::new(DataManagerLazyLoader),
            listeners: Vec::new(),
            stats: Arc::new(TransactionStats::new()),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the lazy loader injected into end points.
    #[must_use]
    pub fn lazy_loader(mut self, lazy_loader: Arc<dyn RelationEndPointLazyLoader>) -> Self {
        self.lazy_loader = lazy_loader;
        self
    }

    /// Adds a listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ClientTransactionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Records statistics into `stats` instead of a private instance.
    #[must_use]
    pub fn stats(mut self, stats: Arc<TransactionStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Builds the transaction with a fresh ID.
    #[must_use]
    pub fn build(self) -> ClientTransaction {
        let id = TransactionId::new(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed));
        self.build_with_id(id)
    }

    fn build_with_id(self, id: TransactionId) -> ClientTransaction {
        debug!(transaction = %id, "starting client transaction");
        ClientTransaction {
            id,
            state: TransactionState::Active,
            config: self.config,
            mapping: self.mapping,
            source: self.source,
            lazy_loader: self.lazy_loader,
            listeners: self.listeners,
            stats: self.stats,
            data_containers: DataContainerMap::new(),
            end_points: RelationEndPointMap::new(),
        }
    }
}

impl fmt::Debug for ClientTransactionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTransactionBuilder")
            .field("config", &self.config)
            .field("lazy_loader", &self.lazy_loader)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
