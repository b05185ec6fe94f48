//! Class and property definitions.

use crate::data::Value;
use crate::types::ClassId;
use indexmap::IndexMap;

/// Kind of a persisted property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// Plain value column.
    Scalar {
        /// Value of the property on newly created objects.
        default: Value,
    },
    /// Foreign-key column backing a real relation end point.
    ForeignKey {
        /// Class the foreign key points at.
        opposite_class: ClassId,
    },
}

/// Definition of one persisted property of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    name: String,
    kind: PropertyKind,
}

impl PropertyDefinition {
    /// Creates a scalar property defaulting to `Value::Null`.
    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::scalar_with_default(name, Value::Null)
    }

    /// Creates a scalar property with an explicit default value.
    #[must_use]
    pub fn scalar_with_default(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Scalar { default },
        }
    }

    /// Creates a foreign-key property pointing at `opposite_class`.
    #[must_use]
    pub fn foreign_key(name: impl Into<String>, opposite_class: ClassId) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::ForeignKey { opposite_class },
        }
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property kind.
    #[must_use]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Returns `true` if this property backs a real relation end point.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, PropertyKind::ForeignKey { .. })
    }

    /// Returns the value a new object starts with.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match &self.kind {
            PropertyKind::Scalar { default } => default.clone(),
            PropertyKind::ForeignKey { .. } => Value::Null,
        }
    }
}

/// Definition of a mapped class.
///
/// Class definitions are immutable once the mapping is built and are
/// shared by every transaction through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    id: ClassId,
    base_class: Option<ClassId>,
    properties: IndexMap<String, PropertyDefinition>,
}

impl ClassDefinition {
    /// Creates a class definition without properties.
    #[must_use]
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: id.into(),
            base_class: None,
            properties: IndexMap::new(),
        }
    }

    /// Sets the base class.
    #[must_use]
    pub fn with_base_class(mut self, base_class: impl Into<ClassId>) -> Self {
        self.base_class = Some(base_class.into());
        self
    }

    /// Adds a scalar property defaulting to null.
    #[must_use]
    pub fn with_property(self, name: impl Into<String>) -> Self {
        self.with_property_definition(PropertyDefinition::scalar(name))
    }

    /// Adds a property definition.
    #[must_use]
    pub fn with_property_definition(mut self, definition: PropertyDefinition) -> Self {
        self.properties
            .insert(definition.name().to_string(), definition);
        self
    }

    pub(crate) fn add_property(&mut self, definition: PropertyDefinition) -> bool {
        if self.properties.contains_key(definition.name()) {
            return false;
        }
        self.properties
            .insert(definition.name().to_string(), definition);
        true
    }

    /// Returns the class ID.
    #[must_use]
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    /// Returns the base class, if any.
    #[must_use]
    pub fn base_class(&self) -> Option<&ClassId> {
        self.base_class.as_ref()
    }

    /// Returns a property declared directly on this class.
    #[must_use]
    pub fn declared_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.get(name)
    }

    /// Iterates over the properties declared directly on this class.
    pub fn declared_properties(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.properties.values()
    }
}
