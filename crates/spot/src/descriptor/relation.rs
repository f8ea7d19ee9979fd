//! Relation declarations.

use super::{EntityRef, EntityType};
use crate::query::{Condition, Conditions, Direction};
use crate::{Result, SpotError, Value};

/// Relation cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
    HasManyThrough,
}

/// Entity a relation points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationTarget {
    /// The declaring entity itself
    SelfType,
    Entity(EntityRef),
}

/// A declared relation.
///
/// Condition values may reference the owning entity with `":entity.<field>"`.
/// For has-many-through relations, the target conditions may reference the
/// loaded through entities with `":throughEntity.<field>"`, which expands to
/// the list of that field's distinct values.
///
/// ```ignore
/// fn relations() -> Vec<(&'static str, RelationSpec)> {
///     vec![
///         ("comments", Relation::has_many::<Comment>()
///             .with("post_id", ":entity.id")
///             .order_by("date_created", Direction::Asc)),
///         ("tags", Relation::has_many_through::<Tag, PostTag>()
///             .with("id", ":throughEntity.tag_id")
///             .through_with("post_id", ":entity.id")),
///     ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSpec {
    pub kind: RelationKind,
    pub entity: Option<RelationTarget>,
    pub conditions: Conditions,
    pub through_entity: Option<RelationTarget>,
    pub through_conditions: Conditions,
    pub order: Vec<(String, Direction)>,
    /// First declaration error, reported when the relation is accessed
    invalid: Option<String>,
}

impl RelationSpec {
    pub fn new(kind: RelationKind) -> Self {
        Self {
            kind,
            entity: None,
            conditions: Conditions::new(),
            through_entity: None,
            through_conditions: Conditions::new(),
            order: Vec::new(),
            invalid: None,
        }
    }

    /// Sets the target entity.
    pub fn entity(mut self, target: RelationTarget) -> Self {
        self.entity = Some(target);
        self
    }

    /// Sets the through entity of a has-many-through relation.
    pub fn through(mut self, target: RelationTarget) -> Self {
        self.through_entity = Some(target);
        self
    }

    /// Adds a target condition written as a condition key.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        match Condition::parse(key, value) {
            Ok(cond) => self.conditions = self.conditions.push(cond),
            Err(e) => self.record_invalid(e),
        }
        self
    }

    /// Adds a through-entity condition written as a condition key.
    pub fn through_with(mut self, key: &str, value: impl Into<Value>) -> Self {
        match Condition::parse(key, value) {
            Ok(cond) => self.through_conditions = self.through_conditions.push(cond),
            Err(e) => self.record_invalid(e),
        }
        self
    }

    /// Adds an ORDER BY applied to the related query.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order.push((field.to_string(), direction));
        self
    }

    fn record_invalid(&mut self, error: SpotError) {
        if self.invalid.is_none() {
            self.invalid = Some(error.to_string());
        }
    }

    /// Checks the declaration is complete for its kind.
    pub fn validate(&self, name: &str) -> Result<()> {
        if let Some(reason) = &self.invalid {
            return Err(SpotError::Configuration(format!(
                "Relation '{}' has an invalid condition: {}",
                name, reason
            )));
        }
        if self.entity.is_none() {
            return Err(SpotError::Configuration(format!(
                "Relation '{}' does not name a target entity",
                name
            )));
        }
        if self.kind == RelationKind::HasManyThrough {
            if self.through_entity.is_none() {
                return Err(SpotError::Configuration(format!(
                    "Relation '{}' requires a through entity",
                    name
                )));
            }
            if self.through_conditions.is_empty() {
                return Err(SpotError::Configuration(format!(
                    "Relation '{}' requires through conditions",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Constructors for [`RelationSpec`].
pub struct Relation;

impl Relation {
    pub fn has_one<T: EntityType>() -> RelationSpec {
        RelationSpec::new(RelationKind::HasOne).entity(RelationTarget::Entity(EntityRef::of::<T>()))
    }

    pub fn has_many<T: EntityType>() -> RelationSpec {
        RelationSpec::new(RelationKind::HasMany).entity(RelationTarget::Entity(EntityRef::of::<T>()))
    }

    /// Has-many relation reached through a join entity `Through`.
    pub fn has_many_through<T: EntityType, Through: EntityType>() -> RelationSpec {
        RelationSpec::new(RelationKind::HasManyThrough)
            .entity(RelationTarget::Entity(EntityRef::of::<T>()))
            .through(RelationTarget::Entity(EntityRef::of::<Through>()))
    }

    /// Has-one relation targeting the declaring entity.
    pub fn has_one_self() -> RelationSpec {
        RelationSpec::new(RelationKind::HasOne).entity(RelationTarget::SelfType)
    }

    /// Has-many relation targeting the declaring entity.
    pub fn has_many_self() -> RelationSpec {
        RelationSpec::new(RelationKind::HasMany).entity(RelationTarget::SelfType)
    }
}
