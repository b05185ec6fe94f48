//! Transaction state.

use serde::{Deserialize, Serialize};

/// State of a client transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been discarded; every operation fails.
    Discarded,
}
