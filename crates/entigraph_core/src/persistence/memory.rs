//! In-memory persistence source.

use crate::data::{DataContainer, Value};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::{MappingConfiguration, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::persistence::{PersistedChange, PersistedChangeKind, PersistenceSource};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Row = IndexMap<String, Value>;

/// A persistence source keeping all rows in memory.
///
/// # Thread Safety
///
/// Rows live behind a `RwLock`; the source can be shared by several
/// transactions and threads.
#[derive(Debug)]
pub struct InMemoryPersistenceSource {
    mapping: Arc<MappingConfiguration>,
    rows: RwLock<IndexMap<ObjectId, Row>>,
    persist_calls: AtomicU64,
}

impl InMemoryPersistenceSource {
    /// Creates an empty source for `mapping`.
    #[must_use]
    pub fn new(mapping: Arc<MappingConfiguration>) -> Self {
        Self {
            mapping,
            rows: RwLock::new(IndexMap::new()),
            persist_calls: AtomicU64::new(0),
        }
    }

    /// Stores a row, replacing any previous row of the same object.
    ///
    /// # Errors
    ///
    /// Fails if the class or one of the properties is not mapped.
    pub fn insert(
        &self,
        object_id: ObjectId,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> CoreResult<()> {
        let mut container = DataContainer::existing(object_id.clone(), values);
        container.complete_properties(&self.mapping)?;
        let row = container
            .properties()
            .map(|(name, value)| (name.to_string(), value.value().clone()))
            .collect();
        self.rows.write().insert(object_id, row);
        Ok(())
    }

    /// Returns a copy of the stored row of an object.
    #[must_use]
    pub fn row(&self, object_id: &ObjectId) -> Option<Row> {
        self.rows.read().get(object_id).cloned()
    }

    /// Returns `true` if a row for the object exists.
    #[must_use]
    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.rows.read().contains_key(object_id)
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns `true` if no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Returns how often [`persist`](PersistenceSource::persist) was called.
    #[must_use]
    pub fn persist_calls(&self) -> u64 {
        self.persist_calls.load(Ordering::Relaxed)
    }
}

impl PersistenceSource for InMemoryPersistenceSource {
    fn load_data_container(&self, object_id: &ObjectId) -> CoreResult<Option<DataContainer>> {
        Ok(self
            .rows
            .read()
            .get(object_id)
            .map(|row| DataContainer::existing(object_id.clone(), row.clone())))
    }

    fn load_related_data_containers(
        &self,
        end_point_id: &RelationEndPointId,
        real_definition: &RelationEndPointDefinition,
    ) -> CoreResult<Vec<DataContainer>> {
        let foreign_key = real_definition.property_name().ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "'{real_definition}' has no foreign-key property"
            ))
        })?;
        let owner = Value::ObjectId(end_point_id.object_id().clone());

        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|(object_id, _)| {
                self.mapping
                    .is_same_or_base_class(real_definition.class_id(), object_id.class_id())
            })
            .filter(|(_, row)| row.get(foreign_key) == Some(&owner))
            .map(|(object_id, row)| DataContainer::existing(object_id.clone(), row.clone()))
            .collect())
    }

    fn persist(&self, changes: &[PersistedChange]) -> CoreResult<()> {
        let mut rows = self.rows.write();
        for change in changes {
            let exists = rows.contains_key(&change.object_id);
            match (change.kind, exists) {
                (PersistedChangeKind::New, true) => {
                    return Err(CoreError::invalid_operation(format!(
                        "object '{}' already exists in the persistence source",
                        change.object_id
                    )))
                }
                (PersistedChangeKind::Changed | PersistedChangeKind::Deleted, false) => {
                    return Err(CoreError::object_not_found(change.object_id.clone()))
                }
                _ => {}
            }
        }

        for change in changes {
            match change.kind {
                PersistedChangeKind::New | PersistedChangeKind::Changed => {
                    rows.insert(change.object_id.clone(), change.values.iter().cloned().collect());
                }
                PersistedChangeKind::Deleted => {
                    rows.shift_remove(&change.object_id);
                }
            }
        }
        self.persist_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
