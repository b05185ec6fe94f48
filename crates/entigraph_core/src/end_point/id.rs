//! Relation end-point identifier.

use crate::object::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one relation end point: an object plus one of its relation properties.
///
/// The same ID names the same end-point slot in every transaction; the
/// end point itself exists at most once per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationEndPointId {
    object_id: ObjectId,
    property_name: String,
}

impl RelationEndPointId {
    /// Creates an end-point ID.
    #[must_use]
    pub fn new(object_id: ObjectId, property_name: impl Into<String>) -> Self {
        Self {
            object_id,
            property_name: property_name.into(),
        }
    }

    /// Returns the owning object.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Returns the relation property name.
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }
}

impl fmt::Display for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_id, self.property_name)
    }
}
