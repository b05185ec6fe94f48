//! Change-tracked property value.

use crate::data::Value;
use serde::{Deserialize, Serialize};

/// A property value with change tracking.
///
/// Tracks the original (loaded or last committed) value, the current value
/// and whether any write happened since the last commit or rollback.
/// `has_been_touched` is set by every write, including writes of the value
/// the property already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    original: Value,
    current: Value,
    touched: bool,
}

impl PropertyValue {
    /// Creates an unchanged property value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            original: value.clone(),
            current: value,
            touched: false,
        }
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.current
    }

    /// Returns the value as of the last load or commit.
    #[must_use]
    pub fn original_value(&self) -> &Value {
        &self.original
    }

    /// Sets the current value and marks the property as touched.
    pub fn set_value(&mut self, value: Value) {
        self.current = value;
        self.touched = true;
    }

    /// Returns `true` if the current value differs from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.current != self.original
    }

    /// Returns `true` if a write or touch happened since the last commit or rollback.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.touched
    }

    /// Marks the property as touched without changing it.
    pub fn touch(&mut self) {
        self.touched = true;
    }

    /// Makes the current value the new original.
    pub fn commit(&mut self) {
        if self.has_changed() {
            self.original = self.current.clone();
        }
        self.touched = false;
    }

    /// Restores the original value.
    pub fn rollback(&mut self) {
        if self.has_changed() {
            self.current = self.original.clone();
        }
        self.touched = false;
    }

    /// Takes over the current value of `source`, leaving the original untouched.
    pub fn take_over_committed_data(&mut self, source: &PropertyValue) {
        self.current = source.current.clone();
        if source.touched || self.has_changed() {
            self.touched = true;
        }
    }
}
