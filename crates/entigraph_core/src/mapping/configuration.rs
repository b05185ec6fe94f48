//! Mapping configuration and its builder.

use crate::error::{CoreError, CoreResult};
use crate::mapping::class::{ClassDefinition, PropertyDefinition};
use crate::mapping::relation::{EndPointKind, RelationDefinition, RelationEndPointDefinition};
use crate::types::ClassId;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Upper bound on inheritance depth; deeper chains are treated as cycles.
const MAX_INHERITANCE_DEPTH: usize = 64;

#[derive(Debug)]
struct EndPointEntry {
    definition: Arc<RelationEndPointDefinition>,
    opposite: Arc<RelationEndPointDefinition>,
}

/// Immutable mapping metadata shared by all transactions.
///
/// The configuration answers the questions the end-point machinery asks
/// about the object model:
/// - Which relation end points does a class have?
/// - What is the opposite side of an end point?
/// - Is one class the same as or derived from another?
#[derive(Debug)]
pub struct MappingConfiguration {
    classes: IndexMap<ClassId, Arc<ClassDefinition>>,
    relations: Vec<RelationDefinition>,
    end_points: HashMap<(ClassId, String), EndPointEntry>,
    declared_end_points: HashMap<ClassId, Vec<Arc<RelationEndPointDefinition>>>,
}

impl MappingConfiguration {
    /// Starts building a mapping configuration.
    #[must_use]
    pub fn builder() -> MappingBuilder {
        MappingBuilder::new()
    }

    /// Returns the definition of a class.
    pub fn class_definition(&self, class_id: &ClassId) -> CoreResult<&Arc<ClassDefinition>> {
        self.classes
            .get(class_id)
            .ok_or_else(|| CoreError::mapping(format!("class '{class_id}' is not mapped")))
    }

    /// Iterates over all mapped classes.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassDefinition>> {
        self.classes.values()
    }

    /// Iterates over all relations.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.iter()
    }

    /// Returns `true` if `derived` is `base` or inherits from it.
    #[must_use]
    pub fn is_same_or_base_class(&self, base: &ClassId, derived: &ClassId) -> bool {
        self.class_hierarchy(derived).any(|class| class.id() == base)
    }

    /// Looks up a property, walking up the inheritance chain.
    pub fn property_definition(
        &self,
        class_id: &ClassId,
        property_name: &str,
    ) -> CoreResult<&PropertyDefinition> {
        self.class_hierarchy(class_id)
            .find_map(|class| class.declared_property(property_name))
            .ok_or_else(|| {
                CoreError::mapping(format!(
                    "class '{class_id}' has no property '{property_name}'"
                ))
            })
    }

    /// Looks up the relation end-point definition of `class_id.property_name`.
    pub fn end_point_definition(
        &self,
        class_id: &ClassId,
        property_name: &str,
    ) -> CoreResult<Arc<RelationEndPointDefinition>> {
        self.entry(class_id, property_name)
            .map(|entry| Arc::clone(&entry.definition))
    }

    /// Returns the opposite side of a relation end point.
    ///
    /// For unidirectional relations the opposite side is anonymous.
    pub fn opposite_end_point_definition(
        &self,
        definition: &RelationEndPointDefinition,
    ) -> CoreResult<Arc<RelationEndPointDefinition>> {
        let property_name = definition.property_name().ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "anonymous end point '{definition}' has no navigable opposite"
            ))
        })?;
        self.entry(definition.class_id(), property_name)
            .map(|entry| Arc::clone(&entry.opposite))
    }

    /// Returns every navigable end-point definition of a class, including inherited ones.
    #[must_use]
    pub fn end_point_definitions(&self, class_id: &ClassId) -> Vec<Arc<RelationEndPointDefinition>> {
        let mut result = Vec::new();
        for class in self.class_hierarchy(class_id) {
            if let Some(declared) = self.declared_end_points.get(class.id()) {
                result.extend(declared.iter().cloned());
            }
        }
        result
    }

    fn entry(&self, class_id: &ClassId, property_name: &str) -> CoreResult<&EndPointEntry> {
        self.class_hierarchy(class_id)
            .find_map(|class| {
                self.end_points
                    .get(&(class.id().clone(), property_name.to_string()))
            })
            .ok_or_else(|| {
                CoreError::mapping(format!(
                    "class '{class_id}' has no relation property '{property_name}'"
                ))
            })
    }

    fn class_hierarchy<'a>(
        &'a self,
        class_id: &ClassId,
    ) -> impl Iterator<Item = &'a Arc<ClassDefinition>> + 'a {
        let mut next = self.classes.get(class_id);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .base_class()
                .and_then(|base| self.classes.get(base));
            Some(current)
        })
        .take(MAX_INHERITANCE_DEPTH)
    }
}

/// Builder for [`MappingConfiguration`].
///
/// Real relation end points get their foreign-key property added to the
/// declaring class automatically.
#[derive(Debug, Default)]
pub struct MappingBuilder {
    classes: Vec<ClassDefinition>,
    relations: Vec<RelationDefinition>,
}

impl MappingBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class.
    #[must_use]
    pub fn class(mut self, class: ClassDefinition) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validates the model and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Mapping`] if a class is defined twice, a base
    /// class or relation class is unknown, the inheritance chain is cyclic,
    /// or a relation property collides with an existing property.
    pub fn build(self) -> CoreResult<Arc<MappingConfiguration>> {
        let mut classes: IndexMap<ClassId, ClassDefinition> = IndexMap::new();
        for class in self.classes {
            if classes.contains_key(class.id()) {
                return Err(CoreError::mapping(format!(
                    "class '{}' is defined more than once",
                    class.id()
                )));
            }
            classes.insert(class.id().clone(), class);
        }

        for class in classes.values() {
            let mut depth = 0;
            let mut current = class.base_class();
            while let Some(base) = current {
                let base_class = classes.get(base).ok_or_else(|| {
                    CoreError::mapping(format!(
                        "base class '{base}' of '{}' is not mapped",
                        class.id()
                    ))
                })?;
                depth += 1;
                if depth >= MAX_INHERITANCE_DEPTH || base_class.id() == class.id() {
                    return Err(CoreError::mapping(format!(
                        "inheritance chain of '{}' is cyclic",
                        class.id()
                    )));
                }
                current = base_class.base_class();
            }
        }

        let mut end_points = HashMap::new();
        let mut declared_end_points: HashMap<ClassId, Vec<Arc<RelationEndPointDefinition>>> =
            HashMap::new();

        for relation in &self.relations {
            let [first, second] = relation.end_points();
            let first = Arc::new(first.clone());
            let second = Arc::new(second.clone());

            for (definition, opposite) in [(&first, &second), (&second, &first)] {
                if !classes.contains_key(definition.class_id()) {
                    return Err(CoreError::mapping(format!(
                        "relation '{}' refers to unmapped class '{}'",
                        relation.id(),
                        definition.class_id()
                    )));
                }
                let Some(property_name) = definition.property_name() else {
                    continue;
                };

                let key = (definition.class_id().clone(), property_name.to_string());
                if end_points.contains_key(&key) {
                    return Err(CoreError::mapping(format!(
                        "relation property '{definition}' is defined more than once"
                    )));
                }

                if definition.kind() == EndPointKind::RealObject {
                    let class = classes
                        .get_mut(definition.class_id())
                        .ok_or_else(|| CoreError::mapping("relation class vanished"))?;
                    let foreign_key = PropertyDefinition::foreign_key(
                        property_name,
                        opposite.class_id().clone(),
                    );
                    if !class.add_property(foreign_key) {
                        return Err(CoreError::mapping(format!(
                            "foreign key '{definition}' collides with an existing property"
                        )));
                    }
                }

                declared_end_points
                    .entry(definition.class_id().clone())
                    .or_default()
                    .push(Arc::clone(definition));
                end_points.insert(
                    key,
                    EndPointEntry {
                        definition: Arc::clone(definition),
                        opposite: Arc::clone(opposite),
                    },
                );
            }
        }

        Ok(Arc::new(MappingConfiguration {
            classes: classes
                .into_iter()
                .map(|(id, class)| (id, Arc::new(class)))
                .collect(),
            relations: self.relations,
            end_points,
            declared_end_points,
        }))
    }
}
