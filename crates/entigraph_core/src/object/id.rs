//! Object identifier.

use crate::types::ClassId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a domain object.
///
/// An object ID pairs the object's class with its physical key value. It is:
/// - Immutable once constructed
/// - Hashable, and used as a map key throughout a transaction
/// - Never reused for another object
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    class_id: ClassId,
    value: Uuid,
}

impl ObjectId {
    /// Creates an object ID from a class and a key value.
    #[must_use]
    pub fn from_parts(class_id: ClassId, value: Uuid) -> Self {
        Self { class_id, value }
    }

    /// Creates a new object ID with a random key value.
    #[must_use]
    pub fn new(class_id: ClassId) -> Self {
        Self::from_parts(class_id, Uuid::new_v4())
    }

    /// Creates an object ID from a class and raw key bytes.
    #[must_use]
    pub fn from_bytes(class_id: ClassId, bytes: [u8; 16]) -> Self {
        Self::from_parts(class_id, Uuid::from_bytes(bytes))
    }

    /// Returns the class of the object.
    #[inline]
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the physical key value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.value
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}|{})", self.class_id, self.value)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class_id, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let id1 = ObjectId::new(ClassId::new("Order"));
        let id2 = ObjectId::new(ClassId::new("Order"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn same_key_different_class_differs() {
        let a = ObjectId::from_bytes(ClassId::new("Order"), [1; 16]);
        let b = ObjectId::from_bytes(ClassId::new("Customer"), [1; 16]);
        assert_ne!(a, b);
    }

    #[test]
    fn from_bytes_keeps_value() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let id = ObjectId::from_bytes(ClassId::new("Order"), bytes);
        assert_eq!(id.value().into_bytes(), bytes);
        assert_eq!(id.class_id().as_str(), "Order");
    }

    #[test]
    fn display() {
        let id = ObjectId::from_bytes(ClassId::new("Order"), [0; 16]);
        assert_eq!(
            format!("{id}"),
            "Order|00000000-0000-0000-0000-000000000000"
        );
    }
}
