//! Transaction configuration.

use serde::{Deserialize, Serialize};

/// How a collection end point decides whether it has changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChangeDetection {
    /// Order is significant: a reordered collection counts as changed.
    #[default]
    Sequence,
    /// Only membership is compared.
    Set,
}

/// Configuration options for a client transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Change detection used by collection end points.
    pub collection_change_detection: ChangeDetection,

    /// Run the bidirectional consistency check before committing.
    pub verify_consistency_on_commit: bool,

    /// Hand changed data containers to the persistence source on commit.
    pub persist_on_commit: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            collection_change_detection: ChangeDetection::Sequence,
            verify_consistency_on_commit: false,
            persist_on_commit: true,
        }
    }
}

impl TransactionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection change detection.
    #[must_use]
    pub const fn collection_change_detection(mut self, value: ChangeDetection) -> Self {
        self.collection_change_detection = value;
        self
    }

    /// Sets whether to verify relation consistency on commit.
    #[must_use]
    pub const fn verify_consistency_on_commit(mut self, value: bool) -> Self {
        self.verify_consistency_on_commit = value;
        self
    }

    /// Sets whether to persist changes on commit.
    #[must_use]
    pub const fn persist_on_commit(mut self, value: bool) -> Self {
        self.persist_on_commit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransactionConfig::default();
        assert_eq!(config.collection_change_detection, ChangeDetection::Sequence);
        assert!(!config.verify_consistency_on_commit);
        assert!(config.persist_on_commit);
    }

    #[test]
    fn builder_pattern() {
        let config = TransactionConfig::new()
            .collection_change_detection(ChangeDetection::Set)
            .verify_consistency_on_commit(true)
            .persist_on_commit(false);

        assert_eq!(config.collection_change_detection, ChangeDetection::Set);
        assert!(config.verify_consistency_on_commit);
        assert!(!config.persist_on_commit);
    }
}
