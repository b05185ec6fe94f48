//! Ordered, duplicate-free view over the opposite objects of a collection end point.

use crate::object::ObjectId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Ordered set of object IDs held by a collection end point.
///
/// Order is the order of load or modification. Membership tests are O(1).
/// Outside this crate the collection is read-only: structural changes are
/// only possible through the commands of the owning end point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainObjectCollection {
    items: IndexSet<ObjectId>,
}

impl DomainObjectCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the collection holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the object at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ObjectId> {
        self.items.get_index(index)
    }

    /// Returns `true` if the collection holds `object_id`.
    #[must_use]
    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.items.contains(object_id)
    }

    /// Returns the position of `object_id`.
    #[must_use]
    pub fn index_of(&self, object_id: &ObjectId) -> Option<usize> {
        self.items.get_index_of(object_id)
    }

    /// Iterates over the objects in order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectId> {
        self.items.iter()
    }

    /// Copies the objects into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ObjectId> {
        self.items.iter().cloned().collect()
    }

    /// Returns `true` if both collections hold the same objects, ignoring order.
    #[must_use]
    pub fn set_equals(&self, other: &DomainObjectCollection) -> bool {
        self.len() == other.len() && self.items.iter().all(|item| other.contains(item))
    }

    /// Returns `true` if both collections hold the same objects in the same order.
    #[must_use]
    pub fn sequence_equals(&self, other: &DomainObjectCollection) -> bool {
        self.items.iter().eq(other.items.iter())
    }

    /// Inserts `object_id` at `index`. Returns `false` if it was already present.
    pub(crate) fn insert(&mut self, index: usize, object_id: ObjectId) -> bool {
        if self.items.contains(&object_id) {
            return false;
        }
        self.items.shift_insert(index, object_id);
        true
    }

    /// Appends `object_id`. Returns `false` if it was already present.
    pub(crate) fn push(&mut self, object_id: ObjectId) -> bool {
        self.items.insert(object_id)
    }

    /// Removes `object_id`, returning its former position.
    pub(crate) fn remove(&mut self, object_id: &ObjectId) -> Option<usize> {
        self.items
            .shift_remove_full(object_id)
            .map(|(index, _)| index)
    }

    /// Replaces the object at `index`, returning the previous one.
    pub(crate) fn replace(&mut self, index: usize, object_id: ObjectId) -> Option<ObjectId> {
        let previous = self.items.shift_remove_index(index)?;
        self.items.shift_insert(index, object_id);
        Some(previous)
    }

    /// Replaces the whole content, keeping this instance.
    pub(crate) fn set_contents<'a>(&mut self, items: impl IntoIterator<Item = &'a ObjectId>) {
        self.items.clear();
        self.items.extend(items.into_iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

impl FromIterator<ObjectId> for DomainObjectCollection {
    fn from_iter<T: IntoIterator<Item = ObjectId>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DomainObjectCollection {
    type Item = &'a ObjectId;
    type IntoIter = indexmap::set::Iter<'a, ObjectId>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassId;

    fn order(n: u8) -> ObjectId {
        ObjectId::from_bytes(ClassId::new("Order"), [n; 16])
    }

    #[test]
    fn insert_keeps_order_and_rejects_duplicates() {
        let mut collection = DomainObjectCollection::new();
        assert!(collection.push(order(1)));
        assert!(collection.push(order(3)));
        assert!(collection.insert(1, order(2)));
        assert!(!collection.insert(0, order(3)));

        assert_eq!(collection.to_vec(), vec![order(1), order(2), order(3)]);
        assert_eq!(collection.index_of(&order(3)), Some(2));
    }

    #[test]
    fn remove_shifts_following_items() {
        let mut collection: DomainObjectCollection = [order(1), order(2), order(3)].into_iter().collect();
        assert_eq!(collection.remove(&order(1)), Some(0));
        assert_eq!(collection.get(0), Some(&order(2)));
        assert_eq!(collection.remove(&order(9)), None);
    }

    #[test]
    fn replace_keeps_position() {
        let mut collection: DomainObjectCollection = [order(1), order(2), order(3)].into_iter().collect();
        assert_eq!(collection.replace(1, order(5)), Some(order(2)));
        assert_eq!(collection.to_vec(), vec![order(1), order(5), order(3)]);
        assert_eq!(collection.replace(7, order(6)), None);
    }

    #[test]
    fn set_and_sequence_equality() {
        let a: DomainObjectCollection = [order(1), order(2)].into_iter().collect();
        let b: DomainObjectCollection = [order(2), order(1)].into_iter().collect();
        assert!(a.set_equals(&b));
        assert!(!a.sequence_equals(&b));
    }
}
