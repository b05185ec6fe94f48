//! # Entigraph Core
//!
//! Relation end points, change tracking and modification commands for an
//! in-memory object graph.
//!
//! This crate provides:
//! - Relation end points for both sides of 1:1 and 1:many relations
//! - Per-end-point synchronization states with lazy loading
//! - Reversible modification commands with a begin/perform/end lifecycle
//! - A client transaction (unit of work) with commit and rollback
//! - A flattened CBOR form for handing transactions between processes
//!
//! ## Key Invariants
//!
//! - Both sides of a synchronized bidirectional relation agree after every
//!   completed command
//! - Every relation change is expanded to the opposite end points it affects
//! - Commit makes the current state the original state; rollback restores it
//! - Virtual end points are loaded at most once until they are unloaded
//!
//! ## Example
//!
//! ```rust
//! use entigraph_core::{
//!     ClassDefinition, ClientTransaction, InMemoryPersistenceSource, MappingConfiguration,
//!     RelationDefinition,
//! };
//! use std::sync::Arc;
//!
//! let mapping = MappingConfiguration::builder()
//!     .class(ClassDefinition::new("Customer"))
//!     .class(ClassDefinition::new("Order"))
//!     .relation(RelationDefinition::one_to_many(
//!         "CustomerToOrder",
//!         "Customer",
//!         "Orders",
//!         "Order",
//!         "Customer",
//!     ))
//!     .build()
//!     .unwrap();
//! let source = Arc::new(InMemoryPersistenceSource::new(Arc::clone(&mapping)));
//! let mut tx = ClientTransaction::new(mapping, source);
//!
//! let customer = tx.new_object("Customer").unwrap();
//! let order = tx.new_object("Order").unwrap();
//! tx.set_related_object(&order, "Customer", Some(&customer)).unwrap();
//!
//! assert!(tx.related_objects(&customer, "Orders").unwrap().contains(&order));
//! tx.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
pub mod command;
mod config;
mod consistency;
pub mod data;
pub mod end_point;
mod error;
mod lazy_loader;
mod listener;
pub mod mapping;
mod object;
pub mod persistence;
mod serialization;
mod stats;
pub mod transaction;
mod types;

pub use change_feed::{ChangeType, RelationChangeEvent, RelationChangeFeed};
pub use command::{
    CollectionCommandKind, CollectionEndPointCommand, CommandState, CompositeCommand,
    DataManagementCommand, ExpandedCommand, ObjectCommandKind, ObjectEndPointCommand,
    OppositeObjectIdSetter, RelationEndPointCommand, RelationEndPointTouchCommand,
};
pub use config::{ChangeDetection, TransactionConfig};
pub use consistency::verify_consistency;
pub use data::{DataContainer, DataContainerMap, DataContainerState, PropertyValue, Value};
pub use end_point::{
    CollectionEndPoint, DomainObjectCollection, ObjectEndPointSyncState, RealObjectEndPoint,
    RelationEndPoint, RelationEndPointId, RelationEndPointMap, SyncStateKind,
    SynchronizedObjectEndPointSyncState, UnknownObjectEndPointSyncState,
    UnsynchronizedObjectEndPointSyncState, VirtualObjectCache, VirtualObjectData,
    VirtualObjectEndPoint,
};
pub use error::{CoreError, CoreResult};
pub use lazy_loader::{DataManagerLazyLoader, RelationEndPointLazyLoader};
pub use listener::ClientTransactionListener;
pub use mapping::{
    Cardinality, ClassDefinition, EndPointKind, MappingBuilder, MappingConfiguration,
    PropertyDefinition, PropertyKind, RelationDefinition, RelationEndPointDefinition,
};
pub use object::ObjectId;
pub use persistence::{
    InMemoryPersistenceSource, PersistedChange, PersistedChangeKind, PersistenceSource,
};
pub use serialization::{
    from_cbor, to_cbor, FlattenedCommand, FlattenedEndPoint, FlattenedTransaction,
};
pub use stats::{StatsSnapshot, TransactionStats};
pub use transaction::{
    ClientTransaction, ClientTransactionBuilder, RelatedObjectsMut, TransactionState,
};
pub use types::{ClassId, TransactionId};
