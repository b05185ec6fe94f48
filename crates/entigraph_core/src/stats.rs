//! Transaction statistics.
//!
//! Counters describing the work transactions did: loads, performed
//! commands, commits and rollbacks. A [`TransactionStats`] instance can be
//! shared by several transactions through `Arc`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let stats = Arc::new(TransactionStats::new());
//! let mut transaction = ClientTransaction::builder(mapping, source)
//!     .stats(Arc::clone(&stats))
//!     .build();
//!
//! // Work with the transaction...
//!
//! println!("Objects loaded: {}", stats.objects_loaded());
//! println!("Commits: {}", stats.commits());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction statistics.
///
/// All counters are atomic and can be read while transactions are working.
/// Values only ever increase.
#[derive(Debug, Default)]
pub struct TransactionStats {
    // Loading
    /// Data containers loaded from the persistence source.
    objects_loaded: AtomicU64,
    /// Virtual end points whose contents were loaded.
    end_points_loaded: AtomicU64,
    /// Virtual end points unloaded again.
    end_points_unloaded: AtomicU64,

    // Modification
    /// Relation commands performed, expanded commands counted per part.
    commands_performed: AtomicU64,
    /// Objects deleted.
    objects_deleted: AtomicU64,
    /// Real end points synchronized explicitly.
    synchronizations: AtomicU64,

    // Transaction outcome
    /// Successful commits.
    commits: AtomicU64,
    /// Rollbacks.
    rollbacks: AtomicU64,
    /// Object changes handed to the persistence source.
    changes_persisted: AtomicU64,
}

impl TransactionStats {
    /// Creates a new stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_object_loaded(&self) {
        self.objects_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_end_point_loaded(&self) {
        self.end_points_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_end_point_unloaded(&self) {
        self.end_points_unloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commands_performed(&self, count: u64) {
        self.commands_performed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_object_deleted(&self) {
        self.objects_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_synchronization(&self) {
        self.synchronizations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a commit and the number of persisted object changes.
    pub(crate) fn record_commit(&self, changes: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.changes_persisted.fetch_add(changes, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of data containers loaded from the persistence source.
    pub fn objects_loaded(&self) -> u64 {
        self.objects_loaded.load(Ordering::Relaxed)
    }

    /// Returns the number of virtual end points loaded.
    pub fn end_points_loaded(&self) -> u64 {
        self.end_points_loaded.load(Ordering::Relaxed)
    }

    /// Returns the number of virtual end points unloaded.
    pub fn end_points_unloaded(&self) -> u64 {
        self.end_points_unloaded.load(Ordering::Relaxed)
    }

    /// Returns the number of performed relation commands.
    pub fn commands_performed(&self) -> u64 {
        self.commands_performed.load(Ordering::Relaxed)
    }

    /// Returns the number of deleted objects.
    pub fn objects_deleted(&self) -> u64 {
        self.objects_deleted.load(Ordering::Relaxed)
    }

    /// Returns the number of explicit synchronizations.
    pub fn synchronizations(&self) -> u64 {
        self.synchronizations.load(Ordering::Relaxed)
    }

    /// Returns the number of commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of rollbacks.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Returns the number of object changes handed to the persistence source.
    pub fn changes_persisted(&self) -> u64 {
        self.changes_persisted.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            objects_loaded: self.objects_loaded(),
            end_points_loaded: self.end_points_loaded(),
            end_points_unloaded: self.end_points_unloaded(),
            commands_performed: self.commands_performed(),
            objects_deleted: self.objects_deleted(),
            synchronizations: self.synchronizations(),
            commits: self.commits(),
            rollbacks: self.rollbacks(),
            changes_persisted: self.changes_persisted(),
        }
    }
}

/// A point-in-time snapshot of transaction statistics.
///
/// Unlike `TransactionStats`, this is a plain struct that can be compared
/// or passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Data containers loaded from the persistence source.
    pub objects_loaded: u64,
    /// Virtual end points loaded.
    pub end_points_loaded: u64,
    /// Virtual end points unloaded.
    pub end_points_unloaded: u64,
    /// Relation commands performed.
    pub commands_performed: u64,
    /// Objects deleted.
    pub objects_deleted: u64,
    /// Explicit synchronizations.
    pub synchronizations: u64,
    /// Commits.
    pub commits: u64,
    /// Rollbacks.
    pub rollbacks: u64,
    /// Object changes handed to the persistence source.
    pub changes_persisted: u64,
}
