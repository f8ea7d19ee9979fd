//! The mapper: CRUD, queries and schema sync for declared entities.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, instrument};

use crate::adapter::Adapter;
use crate::collection::Collection;
use crate::config::{Config, Settings};
use crate::descriptor::{EntityDescriptor, EntityRef, EntityRegistry, EntityType, FieldSpec};
use crate::entity::Entity;
use crate::log::QueryLog;
use crate::query::{Conditions, Query};
use crate::relation::RelationHandle;
use crate::schema::{MigrateOptions, MigrationReport};
use crate::{Record, Result, SpotError, Value};

/// How [`Mapper::get`] should produce an entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Identifier {
    /// A new entity holding only defaults
    #[default]
    New,
    /// A new entity populated from data
    Data(Record),
    /// The stored entity with this primary key
    Key(Value),
}

impl From<Record> for Identifier {
    fn from(data: Record) -> Self {
        Identifier::Data(data)
    }
}

impl From<Value> for Identifier {
    fn from(key: Value) -> Self {
        Identifier::Key(key)
    }
}

impl From<i64> for Identifier {
    fn from(key: i64) -> Self {
        Identifier::Key(Value::Int(key))
    }
}

impl From<i32> for Identifier {
    fn from(key: i32) -> Self {
        Identifier::Key(Value::from(key))
    }
}

impl From<&str> for Identifier {
    fn from(key: &str) -> Self {
        Identifier::Key(Value::from(key))
    }
}

impl From<String> for Identifier {
    fn from(key: String) -> Self {
        Identifier::Key(Value::String(key))
    }
}

/// Entry point for reading and writing entities.
///
/// Cheap to clone; clones share connections and descriptors.
///
/// ```ignore
/// let mapper = Mapper::new(config);
/// mapper.migrate::<Post>().await?;
///
/// let mut post = mapper.get::<Post>(Identifier::New).await?.unwrap();
/// post.set("title", "Hello");
/// mapper.save(&mut post).await?;
///
/// let drafts = mapper
///     .execute(&mapper.all::<Post>()?.where_clause(Conditions::new().eq("status", 0)?)?)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Mapper {
    config: Arc<Config>,
    registry: Arc<EntityRegistry>,
    migrate_options: MigrateOptions,
}

impl Mapper {
    pub fn new(config: Config) -> Self {
        Self::with_registry(Arc::new(config), Arc::new(EntityRegistry::new()))
    }

    /// Shares an existing configuration and descriptor cache.
    pub fn with_registry(config: Arc<Config>, registry: Arc<EntityRegistry>) -> Self {
        Self {
            config,
            registry,
            migrate_options: MigrateOptions::default(),
        }
    }

    /// Connects every connection in `settings`.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(Config::from_settings(settings).await?))
    }

    /// Table options used by [`migrate`](Self::migrate).
    pub fn with_migrate_options(mut self, options: MigrateOptions) -> Self {
        self.migrate_options = options;
        self
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn query_log(&self) -> &Arc<QueryLog> {
        self.config.query_log()
    }

    // ========================================================================
    // Descriptors
    // ========================================================================

    pub fn descriptor<T: EntityType>(&self) -> Result<Arc<EntityDescriptor>> {
        self.registry.descriptor_of::<T>()
    }

    pub fn descriptor_ref(&self, entity: EntityRef) -> Result<Arc<EntityDescriptor>> {
        self.registry.descriptor(entity)
    }

    /// Normalized fields of `T`.
    pub fn fields<T: EntityType>(&self) -> Result<IndexMap<String, FieldSpec>> {
        Ok(self.descriptor::<T>()?.fields().clone())
    }

    pub fn primary_key_field<T: EntityType>(&self) -> Result<Option<String>> {
        Ok(self.descriptor::<T>()?.primary_key().map(str::to_string))
    }

    pub fn datasource<T: EntityType>(&self) -> Result<String> {
        Ok(self.descriptor::<T>()?.datasource().to_string())
    }

    /// Adapter of the connection the entity is bound to.
    pub fn adapter_for(&self, descriptor: &EntityDescriptor) -> Result<Arc<dyn Adapter>> {
        self.config.connection(descriptor.connection())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Gets a new entity or loads one by primary key.
    ///
    /// Returns `None` when no entity has the key.
    pub async fn get<T: EntityType>(&self, identifier: impl Into<Identifier>) -> Result<Option<Entity>> {
        self.get_ref(EntityRef::of::<T>(), identifier.into()).await
    }

    pub async fn get_ref(&self, entity: EntityRef, identifier: Identifier) -> Result<Option<Entity>> {
        let descriptor = self.descriptor_ref(entity)?;
        match identifier {
            Identifier::New => {
                let mut entity = Entity::new(descriptor);
                self.load_relations(&mut entity);
                Ok(Some(entity))
            }
            Identifier::Data(data) => {
                let mut entity = Entity::new(descriptor);
                entity.set_data(data);
                self.load_relations(&mut entity);
                Ok(Some(entity))
            }
            Identifier::Key(key) => {
                let pk = Self::require_primary_key(&descriptor)?;
                self.first_ref(entity, Conditions::new().eq(pk, key)?).await
            }
        }
    }

    /// Builds a new entity from `data` and saves it.
    ///
    /// Returns `None` when the save did not succeed.
    pub async fn create<T: EntityType>(&self, data: Record) -> Result<Option<Entity>> {
        let mut entity = Entity::new(self.descriptor::<T>()?);
        entity.set_data(data);
        if self.save(&mut entity).await? {
            Ok(Some(entity))
        } else {
            Ok(None)
        }
    }

    /// Query over every row of `T`.
    pub fn all<T: EntityType>(&self) -> Result<Query> {
        self.all_ref(EntityRef::of::<T>())
    }

    pub fn all_ref(&self, entity: EntityRef) -> Result<Query> {
        let descriptor = self.descriptor_ref(entity)?;
        Query::new(entity, descriptor.datasource())
    }

    /// Query over `T` projecting only `fields`.
    pub fn select<T: EntityType>(&self, fields: &[&str]) -> Result<Query> {
        self.select_ref(EntityRef::of::<T>(), fields)
    }

    pub fn select_ref(&self, entity: EntityRef, fields: &[&str]) -> Result<Query> {
        self.all_ref(entity)?.select_fields(fields)
    }

    /// First entity matching `conditions`.
    pub async fn first<T: EntityType>(&self, conditions: Conditions) -> Result<Option<Entity>> {
        self.first_ref(EntityRef::of::<T>(), conditions).await
    }

    pub async fn first_ref(&self, entity: EntityRef, conditions: Conditions) -> Result<Option<Entity>> {
        let query = self.all_ref(entity)?.where_clause(conditions)?.limit(1);
        Ok(self.execute(&query).await?.into_iter().next())
    }

    /// Runs a query and wraps the rows into entities with relations attached.
    #[instrument(skip(self, query), fields(entity = query.entity().short_name()))]
    pub async fn execute(&self, query: &Query) -> Result<Collection> {
        let descriptor = self.descriptor_ref(query.entity())?;
        let adapter = self.adapter_for(&descriptor)?;
        let rows = adapter.read(query).await?;
        Ok(self.wrap_rows(&descriptor, rows))
    }

    /// Counts the rows a query matches.
    pub async fn count(&self, query: &Query) -> Result<u64> {
        let descriptor = self.descriptor_ref(query.entity())?;
        self.adapter_for(&descriptor)?.count(query).await
    }

    /// Runs raw SQL on `T`'s connection and wraps the rows as `T`.
    pub async fn query<T: EntityType>(&self, sql: &str, binds: &Record) -> Result<Collection> {
        let descriptor = self.descriptor::<T>()?;
        let rows = self.adapter_for(&descriptor)?.query(sql, binds).await?;
        Ok(self.wrap_rows(&descriptor, rows))
    }

    fn wrap_rows(&self, descriptor: &Arc<EntityDescriptor>, rows: Vec<Record>) -> Collection {
        rows.into_iter()
            .map(|row| {
                let mut entity = Entity::from_row(Arc::clone(descriptor), row);
                self.load_relations(&mut entity);
                entity
            })
            .collect::<Vec<_>>()
            .into()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Updates entities that carry a primary key and inserts the rest.
    ///
    /// Returns `false` when a hook aborted or validation failed; the
    /// entity's errors then say why.
    pub async fn save(&self, entity: &mut Entity) -> Result<bool> {
        let hooks = entity.descriptor().hooks();
        if !(hooks.before_save)(entity) {
            debug!("before_save hook aborted save");
            return Ok(false);
        }

        let result = if entity.primary_key().is_some() {
            self.update(entity).await?
        } else {
            self.insert(entity).await?.is_some()
        };

        Ok((hooks.after_save)(entity, result))
    }

    /// Inserts the entity and returns its primary key.
    ///
    /// Entities without a primary key field yield `Value::Bool(true)`.
    /// Returns `None` when a hook aborted or validation failed.
    #[instrument(skip(self, entity), fields(entity = entity.entity_ref().short_name()))]
    pub async fn insert(&self, entity: &mut Entity) -> Result<Option<Value>> {
        let descriptor = Arc::clone(entity.descriptor());
        let hooks = descriptor.hooks();
        if !(hooks.before_insert)(entity) {
            return Ok(None);
        }
        if !self.validate(entity) {
            return Ok(None);
        }

        let mut data = Record::with_capacity(descriptor.fields().len());
        for (name, field) in descriptor.fields() {
            let value = entity.get(name).clone();
            if field.primary && field.serial && value.is_null() {
                continue;
            }
            data.insert(name.clone(), field.field_type.dump(value));
        }

        let adapter = self.adapter_for(&descriptor)?;
        let generated = adapter.create(descriptor.datasource(), &data).await?;

        let written: Vec<String> = data.keys().cloned().collect();
        entity.mark_clean(&written);
        entity.mark_persisted();

        let key = match descriptor.primary_key() {
            Some(pk) => {
                if entity.get(pk).is_null() {
                    if let Some(id) = generated {
                        entity.set_clean(pk, id);
                    }
                }
                Some(entity.get(pk).clone()).filter(|v| !v.is_null())
            }
            None => None,
        };
        self.load_relations(entity);
        info!(datasource = descriptor.datasource(), "Entity inserted");

        if !(hooks.after_insert)(entity, true) {
            return Ok(None);
        }
        Ok(Some(key.unwrap_or(Value::Bool(true))))
    }

    /// Writes every modified field, including ones set to their stored value.
    ///
    /// Nothing is sent when no declared field is modified.
    #[instrument(skip(self, entity), fields(entity = entity.entity_ref().short_name()))]
    pub async fn update(&self, entity: &mut Entity) -> Result<bool> {
        let descriptor = Arc::clone(entity.descriptor());
        let hooks = descriptor.hooks();
        if !(hooks.before_update)(entity) {
            return Ok(false);
        }
        if !self.validate(entity) {
            return Ok(false);
        }

        let pk = Self::require_primary_key(&descriptor)?;
        let Some(key) = entity.primary_key().cloned() else {
            return Ok(false);
        };

        let modified: Record = entity
            .data_modified()
            .into_iter()
            .filter_map(|(name, value)| {
                let field = descriptor.field(&name)?;
                let value = field.field_type.dump(value);
                Some((name, value))
            })
            .collect();

        if !modified.is_empty() {
            let adapter = self.adapter_for(&descriptor)?;
            adapter
                .update(descriptor.datasource(), &modified, &Conditions::new().eq(pk, key)?)
                .await?;
            let written: Vec<String> = modified.keys().cloned().collect();
            entity.mark_clean(&written);
            entity.mark_persisted();
        }

        Ok((hooks.after_update)(entity, true))
    }

    /// Deletes the stored row of the entity.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete(&self, entity: &mut Entity) -> Result<bool> {
        let descriptor = Arc::clone(entity.descriptor());
        let hooks = descriptor.hooks();
        if !(hooks.before_delete)(entity) {
            return Ok(false);
        }

        let pk = Self::require_primary_key(&descriptor)?;
        let Some(key) = entity.primary_key().cloned() else {
            return Ok(false);
        };
        let adapter = self.adapter_for(&descriptor)?;
        let deleted = adapter
            .delete(descriptor.datasource(), &Conditions::new().eq(pk, key)?)
            .await?;

        Ok((hooks.after_delete)(entity, deleted > 0))
    }

    /// Deletes every row of `T` matching `conditions`.
    pub async fn delete_where<T: EntityType>(&self, conditions: Conditions) -> Result<u64> {
        let descriptor = self.descriptor::<T>()?;
        self.adapter_for(&descriptor)?
            .delete(descriptor.datasource(), &conditions)
            .await
    }

    // ========================================================================
    // Datasources
    // ========================================================================

    pub async fn truncate_datasource<T: EntityType>(&self) -> Result<()> {
        let descriptor = self.descriptor::<T>()?;
        self.adapter_for(&descriptor)?
            .truncate_datasource(descriptor.datasource())
            .await
    }

    pub async fn drop_datasource<T: EntityType>(&self) -> Result<()> {
        let descriptor = self.descriptor::<T>()?;
        self.adapter_for(&descriptor)?
            .drop_datasource(descriptor.datasource())
            .await
    }

    /// Creates or updates `T`'s table to match its fields.
    pub async fn migrate<T: EntityType>(&self) -> Result<MigrationReport> {
        self.migrate_ref(EntityRef::of::<T>()).await
    }

    pub async fn migrate_ref(&self, entity: EntityRef) -> Result<MigrationReport> {
        let descriptor = self.descriptor_ref(entity)?;
        self.adapter_for(&descriptor)?
            .migrate(descriptor.datasource(), descriptor.fields(), &self.migrate_options)
            .await
    }

    // ========================================================================
    // Entity support
    // ========================================================================

    /// Attaches a fresh lazy handle for every declared relation.
    pub fn load_relations(&self, entity: &mut Entity) {
        let descriptor = Arc::clone(entity.descriptor());
        if descriptor.relations().is_empty() {
            return;
        }
        let snapshot = entity.data();
        for (name, spec) in descriptor.relations() {
            let handle = RelationHandle::new(
                self.clone(),
                name,
                spec.clone(),
                Arc::clone(&descriptor),
                snapshot.clone(),
            );
            entity.attach_relation(name, handle);
        }
    }

    /// Checks required fields, recording an error for each blank one.
    ///
    /// Zero and `false` are not blank.
    pub fn validate(&self, entity: &mut Entity) -> bool {
        entity.clear_errors();
        let descriptor = Arc::clone(entity.descriptor());
        for (name, field) in descriptor.fields() {
            if field.required && entity.get(name).is_empty_for_validation() {
                entity.error(name, format!("Required field '{}' was left blank", name));
            }
        }
        !entity.has_errors()
    }

    fn require_primary_key(descriptor: &EntityDescriptor) -> Result<&str> {
        descriptor.primary_key().ok_or_else(|| {
            SpotError::Configuration(format!(
                "Entity {} has no primary key",
                descriptor.entity().short_name()
            ))
        })
    }
}
