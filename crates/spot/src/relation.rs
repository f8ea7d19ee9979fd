//! Lazily resolved relations.
//!
//! The mapper attaches one [`RelationHandle`] per declared relation to every
//! entity it hands out. Nothing is queried until the handle is used; the
//! built query and the loaded entities are then kept for later calls.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::collection::Collection;
use crate::descriptor::{EntityDescriptor, EntityRef, RelationKind, RelationSpec, RelationTarget};
use crate::entity::Entity;
use crate::mapper::Mapper;
use crate::query::Query;
use crate::{Record, Result, SpotError, Value};

const ENTITY_PREFIX: &str = ":entity.";
const THROUGH_PREFIX: &str = ":throughEntity.";

/// Handle to the entities related to one owner entity.
#[derive(Clone)]
pub struct RelationHandle {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    spec: RelationSpec,
    owner: Arc<EntityDescriptor>,
    /// Owner values at the time the handle was attached
    owner_data: Record,
    mapper: Mapper,
    query: OnceCell<Query>,
    loaded: OnceCell<Collection>,
    count: OnceCell<u64>,
}

impl RelationHandle {
    pub(crate) fn new(
        mapper: Mapper,
        name: &str,
        spec: RelationSpec,
        owner: Arc<EntityDescriptor>,
        owner_data: Record,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                spec,
                owner,
                owner_data,
                mapper,
                query: OnceCell::new(),
                loaded: OnceCell::new(),
                count: OnceCell::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> RelationKind {
        self.inner.spec.kind
    }

    pub fn spec(&self) -> &RelationSpec {
        &self.inner.spec
    }

    /// Whether the related entities have been fetched.
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.initialized()
    }

    /// The query selecting the related entities.
    ///
    /// Built once; the returned copy can be refined further.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the relation declaration is incomplete
    /// or references an unknown owner field.
    pub async fn query(&self) -> Result<Query> {
        self.inner
            .query
            .get_or_try_init(|| self.build_query())
            .await
            .cloned()
    }

    /// All related entities, fetched on first use.
    pub async fn all(&self) -> Result<&Collection> {
        self.inner
            .loaded
            .get_or_try_init(|| async {
                let query = self.query().await?;
                let collection = self.inner.mapper.execute(&query).await?;
                debug!(relation = %self.inner.name, count = collection.len(), "Relation loaded");
                Ok(collection)
            })
            .await
    }

    /// Number of related entities, counted once.
    pub async fn count(&self) -> Result<u64> {
        if self.kind() == RelationKind::HasOne || self.is_loaded() {
            return Ok(self.all().await?.len() as u64);
        }
        self.inner
            .count
            .get_or_try_init(|| async {
                let query = self.query().await?;
                self.inner.mapper.count(&query).await
            })
            .await
            .copied()
    }

    pub async fn first(&self) -> Result<Option<&Entity>> {
        Ok(self.all().await?.first())
    }

    /// The related entity of a has-one relation.
    pub async fn entity(&self) -> Result<Option<&Entity>> {
        self.first().await
    }

    /// Field of the related entity, or null when there is none.
    pub async fn get(&self, field: &str) -> Result<Value> {
        Ok(self
            .entity()
            .await?
            .map(|entity| entity.get(field).clone())
            .unwrap_or(Value::Null))
    }

    fn resolve(&self, target: Option<RelationTarget>, role: &str) -> Result<EntityRef> {
        match target {
            Some(RelationTarget::SelfType) => Ok(self.inner.owner.entity()),
            Some(RelationTarget::Entity(entity)) => Ok(entity),
            None => Err(SpotError::Configuration(format!(
                "Relation '{}' does not name {}",
                self.inner.name, role
            ))),
        }
    }

    /// Replaces `:entity.<field>` with the owner's value.
    fn substitute_owner(&self, value: &Value) -> Result<Value> {
        let Some(field) = value.as_str().and_then(|s| s.strip_prefix(ENTITY_PREFIX)) else {
            return Ok(value.clone());
        };
        self.inner.owner_data.get(field).cloned().ok_or_else(|| {
            SpotError::Configuration(format!(
                "Relation '{}' references unknown field '{}' of {}",
                self.inner.name,
                field,
                self.inner.owner.entity().short_name()
            ))
        })
    }

    async fn build_query(&self) -> Result<Query> {
        let spec = &self.inner.spec;
        let mapper = &self.inner.mapper;
        spec.validate(&self.inner.name)?;

        let target = self.resolve(spec.entity, "a target entity")?;
        let mut conditions = spec.conditions.map_values(|v| self.substitute_owner(v))?;

        if spec.kind == RelationKind::HasManyThrough {
            let through = self.resolve(spec.through_entity, "a through entity")?;
            let through_conditions = spec.through_conditions.map_values(|v| self.substitute_owner(v))?;
            let through_query = mapper.all_ref(through)?.where_clause(through_conditions)?;
            let through_entities = mapper.execute(&through_query).await?;

            conditions = conditions.map_values(|v| {
                match v.as_str().and_then(|s| s.strip_prefix(THROUGH_PREFIX)) {
                    Some(field) => Ok(Value::Array(through_entities.column(field))),
                    None => Ok(v.clone()),
                }
            })?;
        }

        let mut query = mapper.all_ref(target)?.where_clause(conditions)?;
        for (field, direction) in &spec.order {
            query = query.order_by(field, *direction)?;
        }
        if spec.kind == RelationKind::HasOne {
            query = query.limit(1);
        }
        Ok(query)
    }
}

impl fmt::Debug for RelationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationHandle")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.spec.kind)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
