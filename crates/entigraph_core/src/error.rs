//! Error types for entigraph core.

use crate::end_point::RelationEndPointId;
use crate::object::ObjectId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in entigraph core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An argument violated the contract of the called operation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated contract.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Operation is not supported by this kind of object.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of the unsupported operation.
        message: String,
    },

    /// The relation is out of sync with its opposite side.
    #[error(
        "the relation property '{}' of object '{}' cannot be changed because it is out of sync \
         with the opposite property; call synchronize first",
        .end_point_id.property_name(),
        .end_point_id.object_id()
    )]
    OutOfSync {
        /// The end point that is out of sync.
        end_point_id: RelationEndPointId,
    },

    /// Object could not be found in the transaction or the persistence source.
    #[error("object not found: {object_id}")]
    ObjectNotFound {
        /// The object that was not found.
        object_id: ObjectId,
    },

    /// Object has been deleted in the transaction.
    #[error("object has been deleted: {object_id}")]
    ObjectDeleted {
        /// The deleted object.
        object_id: ObjectId,
    },

    /// End point is not registered in the transaction.
    #[error("end point not found: {end_point_id}")]
    EndPointNotFound {
        /// The missing end point.
        end_point_id: RelationEndPointId,
    },

    /// Mapping configuration is invalid or incomplete.
    #[error("mapping error: {message}")]
    Mapping {
        /// Description of the mapping issue.
        message: String,
    },

    /// The bidirectional invariant of a relation is violated.
    #[error("inconsistent relation: {message}")]
    InconsistentRelation {
        /// Description of the inconsistency.
        message: String,
    },

    /// The persistence source failed to load or persist data.
    #[error("load failed: {message}")]
    Load {
        /// Description of the failure.
        message: String,
    },

    /// Flattened state could not be encoded or decoded.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates an out-of-sync error for the given end point.
    pub fn out_of_sync(end_point_id: RelationEndPointId) -> Self {
        Self::OutOfSync { end_point_id }
    }

    /// Creates an object not found error.
    pub fn object_not_found(object_id: ObjectId) -> Self {
        Self::ObjectNotFound { object_id }
    }

    /// Creates an object deleted error.
    pub fn object_deleted(object_id: ObjectId) -> Self {
        Self::ObjectDeleted { object_id }
    }

    /// Creates an end point not found error.
    pub fn end_point_not_found(end_point_id: RelationEndPointId) -> Self {
        Self::EndPointNotFound { end_point_id }
    }

    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Creates an inconsistent relation error.
    pub fn inconsistent_relation(message: impl Into<String>) -> Self {
        Self::InconsistentRelation {
            message: message.into(),
        }
    }

    /// Creates a load error.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this is the out-of-sync hard stop.
    #[must_use]
    pub fn is_out_of_sync(&self) -> bool {
        matches!(self, Self::OutOfSync { .. })
    }
}
