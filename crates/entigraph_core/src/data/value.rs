//! Property values.

use crate::object::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A persisted property value.
///
/// Foreign-key columns hold either [`Value::ObjectId`] or [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Reference to another object (foreign key).
    ObjectId(ObjectId),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the referenced object for foreign-key values.
    #[must_use]
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    /// Converts an optional object reference into a foreign-key value.
    #[must_use]
    pub fn from_object_id(id: Option<&ObjectId>) -> Self {
        id.map_or(Self::Null, |id| Self::ObjectId(id.clone()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::ObjectId(id) => write!(f, "{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::ObjectId(id)
    }
}
