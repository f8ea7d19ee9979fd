//! Entity declarations and their normalized descriptors.
//!
//! An entity type implements [`EntityType`] to declare its datasource,
//! fields, relations and hooks. The [`EntityRegistry`] turns a declaration
//! into an [`EntityDescriptor`] once and serves it from cache afterwards.

mod field;
mod registry;
mod relation;

use std::fmt;

use indexmap::IndexMap;

pub use field::{Field, FieldSpec, FieldType, KeyGroup};
pub use registry::EntityRegistry;
pub use relation::{Relation, RelationKind, RelationSpec, RelationTarget};

use crate::entity::Entity;
use crate::query::validate_identifier;
use crate::{Record, Result, SpotError};

/// Declares an entity type.
///
/// ```ignore
/// struct Post;
///
/// impl EntityType for Post {
///     fn datasource() -> &'static str {
///         "posts"
///     }
///
///     fn fields() -> Vec<(&'static str, Field)> {
///         vec![
///             ("id", Field::int().primary().serial()),
///             ("title", Field::string().required()),
///             ("status", Field::int().default(0)),
///         ]
///     }
/// }
/// ```
pub trait EntityType: 'static {
    /// Name of the table backing this entity.
    fn datasource() -> &'static str;

    /// Declared fields, in column order.
    fn fields() -> Vec<(&'static str, Field)>;

    fn relations() -> Vec<(&'static str, RelationSpec)> {
        Vec::new()
    }

    /// Named connection to use instead of the default one.
    fn connection() -> Option<&'static str> {
        None
    }

    fn hooks() -> Hooks {
        Hooks::default()
    }
}

/// Raw declaration gathered from an [`EntityType`].
struct Declaration {
    datasource: &'static str,
    connection: Option<&'static str>,
    fields: Vec<(&'static str, Field)>,
    relations: Vec<(&'static str, RelationSpec)>,
    hooks: Hooks,
}

fn declare<T: EntityType>() -> Declaration {
    Declaration {
        datasource: T::datasource(),
        connection: T::connection(),
        fields: T::fields(),
        relations: T::relations(),
        hooks: T::hooks(),
    }
}

/// Type-erased handle to an entity type.
#[derive(Clone, Copy)]
pub struct EntityRef {
    name: &'static str,
    declare: fn() -> Declaration,
}

impl EntityRef {
    pub fn of<T: EntityType>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            declare: declare::<T>,
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EntityRef {}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.name).finish()
    }
}

/// Hook run before a write. Returning `false` aborts the operation.
pub type BeforeHook = fn(&mut Entity) -> bool;
/// Hook run after a write. Receives the result and may override it.
pub type AfterHook = fn(&mut Entity, bool) -> bool;

/// Lifecycle hooks of an entity type.
///
/// ```ignore
/// fn hooks() -> Hooks {
///     Hooks {
///         before_insert: |entity| {
///             entity.set("date_created", chrono::Utc::now().naive_utc());
///             true
///         },
///         ..Hooks::default()
///     }
/// }
/// ```
#[derive(Clone, Copy)]
pub struct Hooks {
    pub before_save: BeforeHook,
    pub after_save: AfterHook,
    pub before_insert: BeforeHook,
    pub after_insert: AfterHook,
    pub before_update: BeforeHook,
    pub after_update: AfterHook,
    pub before_delete: BeforeHook,
    pub after_delete: AfterHook,
}

fn proceed(_: &mut Entity) -> bool {
    true
}

fn pass_through(_: &mut Entity, result: bool) -> bool {
    result
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            before_save: proceed,
            after_save: pass_through,
            before_insert: proceed,
            after_insert: pass_through,
            before_update: proceed,
            after_update: pass_through,
            before_delete: proceed,
            after_delete: pass_through,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

/// Normalized, immutable description of an entity type.
#[derive(Debug)]
pub struct EntityDescriptor {
    entity: EntityRef,
    datasource: String,
    connection: Option<String>,
    fields: IndexMap<String, FieldSpec>,
    primary_key: Option<String>,
    relations: IndexMap<String, RelationSpec>,
    defaults: Record,
    hooks: Hooks,
}

impl EntityDescriptor {
    /// Builds a descriptor from the entity's declaration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the datasource is missing or
    /// invalid, when no fields are declared, or when a field is declared
    /// twice.
    pub fn build(entity: EntityRef) -> Result<Self> {
        let declaration = (entity.declare)();

        if declaration.datasource.trim().is_empty() {
            return Err(SpotError::Configuration(format!(
                "Entity {} must declare a datasource",
                entity.short_name()
            )));
        }
        validate_identifier(declaration.datasource).map_err(|e| {
            SpotError::Configuration(format!("Entity {}: {}", entity.short_name(), e))
        })?;

        if declaration.fields.is_empty() {
            return Err(SpotError::Configuration(format!(
                "Entity {} must declare at least one field",
                entity.short_name()
            )));
        }

        let mut fields = IndexMap::with_capacity(declaration.fields.len());
        let mut primary_key = None;
        let mut defaults = Record::with_capacity(declaration.fields.len());
        for (name, declared) in declaration.fields {
            validate_identifier(name).map_err(|e| {
                SpotError::Configuration(format!("Entity {}: {}", entity.short_name(), e))
            })?;
            if fields.contains_key(name) {
                return Err(SpotError::Configuration(format!(
                    "Entity {} declares field '{}' twice",
                    entity.short_name(),
                    name
                )));
            }
            let spec = FieldSpec::normalize(name, declared);
            if spec.primary && primary_key.is_none() {
                primary_key = Some(name.to_string());
            }
            defaults.insert(name.to_string(), spec.default.clone());
            fields.insert(name.to_string(), spec);
        }

        let relations = declaration
            .relations
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect();

        Ok(Self {
            entity,
            datasource: declaration.datasource.to_string(),
            connection: declaration.connection.map(str::to_string),
            fields,
            primary_key,
            relations,
            defaults,
            hooks: declaration.hooks,
        })
    }

    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub fn connection(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    pub fn fields(&self) -> &IndexMap<String, FieldSpec> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Name of the first field declared `primary`.
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn relations(&self) -> &IndexMap<String, RelationSpec> {
        &self.relations
    }

    /// Field name -> default value, for every declared field.
    pub fn defaults(&self) -> &Record {
        &self.defaults
    }

    pub fn hooks(&self) -> Hooks {
        self.hooks
    }
}
