//! Relation and relation end-point definitions.

use crate::types::ClassId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of objects one side of a relation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// The side holds at most one opposite object.
    One,
    /// The side holds an ordered collection of opposite objects.
    Many,
}

/// Shape of the end point a definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndPointKind {
    /// 1:1 side backed by a foreign-key column.
    RealObject,
    /// 1:1 side without a column, derived from the opposite real side.
    VirtualObject,
    /// 1:many side holding a collection of opposite objects.
    Collection,
    /// Non-navigable side of a unidirectional relation.
    Anonymous,
}

/// Static metadata of one side of a relation.
///
/// Definitions are owned by the mapping configuration, immutable after
/// the mapping is built, and shared between end points through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationEndPointDefinition {
    relation_id: String,
    class_id: ClassId,
    property_name: Option<String>,
    cardinality: Cardinality,
    is_virtual: bool,
    is_mandatory: bool,
}

impl RelationEndPointDefinition {
    fn real(relation_id: &str, class_id: ClassId, property_name: String) -> Self {
        Self {
            relation_id: relation_id.to_string(),
            class_id,
            property_name: Some(property_name),
            cardinality: Cardinality::One,
            is_virtual: false,
            is_mandatory: false,
        }
    }

    fn virtual_side(
        relation_id: &str,
        class_id: ClassId,
        property_name: String,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            relation_id: relation_id.to_string(),
            class_id,
            property_name: Some(property_name),
            cardinality,
            is_virtual: true,
            is_mandatory: false,
        }
    }

    fn anonymous(relation_id: &str, class_id: ClassId) -> Self {
        Self {
            relation_id: relation_id.to_string(),
            class_id,
            property_name: None,
            cardinality: Cardinality::Many,
            is_virtual: true,
            is_mandatory: false,
        }
    }

    /// Returns the ID of the relation this side belongs to.
    #[must_use]
    pub fn relation_id(&self) -> &str {
        &self.relation_id
    }

    /// Returns the class declaring this side.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the relation property name, `None` for anonymous sides.
    #[must_use]
    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    /// Returns the cardinality of this side.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns `true` if this side has no foreign-key column.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Returns `true` if the relation must not be null when committed.
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.is_mandatory
    }

    /// Returns `true` if this side is not navigable.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.property_name.is_none()
    }

    /// Returns the shape of end point this definition produces.
    #[must_use]
    pub fn kind(&self) -> EndPointKind {
        if self.is_anonymous() {
            EndPointKind::Anonymous
        } else if !self.is_virtual {
            EndPointKind::RealObject
        } else if self.cardinality == Cardinality::One {
            EndPointKind::VirtualObject
        } else {
            EndPointKind::Collection
        }
    }
}

impl fmt::Display for RelationEndPointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property_name {
            Some(name) => write!(f, "{}.{}", self.class_id, name),
            None => write!(f, "{}.<anonymous>", self.class_id),
        }
    }
}

/// A relation between two classes.
///
/// Every relation has exactly two sides. Bidirectional relations have a
/// real side (owning the foreign key) and a virtual side; unidirectional
/// relations pair a real side with an anonymous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    id: String,
    end_points: [RelationEndPointDefinition; 2],
}

impl RelationDefinition {
    /// Creates a bidirectional 1:many relation.
    ///
    /// `one_class.collection_property` is the virtual collection side,
    /// `many_class.foreign_key_property` the real side.
    #[must_use]
    pub fn one_to_many(
        id: impl Into<String>,
        one_class: impl Into<ClassId>,
        collection_property: impl Into<String>,
        many_class: impl Into<ClassId>,
        foreign_key_property: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            end_points: [
                RelationEndPointDefinition::virtual_side(
                    &id,
                    one_class.into(),
                    collection_property.into(),
                    Cardinality::Many,
                ),
                RelationEndPointDefinition::real(
                    &id,
                    many_class.into(),
                    foreign_key_property.into(),
                ),
            ],
            id,
        }
    }

    /// Creates a bidirectional 1:1 relation.
    ///
    /// `virtual_class.virtual_property` has no column, `real_class.real_property`
    /// owns the foreign key.
    #[must_use]
    pub fn one_to_one(
        id: impl Into<String>,
        virtual_class: impl Into<ClassId>,
        virtual_property: impl Into<String>,
        real_class: impl Into<ClassId>,
        real_property: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            end_points: [
                RelationEndPointDefinition::virtual_side(
                    &id,
                    virtual_class.into(),
                    virtual_property.into(),
                    Cardinality::One,
                ),
                RelationEndPointDefinition::real(&id, real_class.into(), real_property.into()),
            ],
            id,
        }
    }

    /// Creates a unidirectional relation navigable only from `real_class`.
    #[must_use]
    pub fn unidirectional(
        id: impl Into<String>,
        real_class: impl Into<ClassId>,
        real_property: impl Into<String>,
        opposite_class: impl Into<ClassId>,
    ) -> Self {
        let id = id.into();
        Self {
            end_points: [
                RelationEndPointDefinition::anonymous(&id, opposite_class.into()),
                RelationEndPointDefinition::real(&id, real_class.into(), real_property.into()),
            ],
            id,
        }
    }

    /// Marks the real side as mandatory.
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.end_points[1].is_mandatory = true;
        self
    }

    /// Returns the relation ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns both sides of the relation.
    #[must_use]
    pub fn end_points(&self) -> &[RelationEndPointDefinition; 2] {
        &self.end_points
    }
}
