//! Compute-once cache of entity descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{EntityDescriptor, EntityRef, EntityType};
use crate::Result;

/// Caches one [`EntityDescriptor`] per entity type.
///
/// Safe to share between tasks. A descriptor is built at most once per
/// registry; concurrent first lookups may both build, and the first insert
/// wins.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    descriptors: RwLock<HashMap<&'static str, Arc<EntityDescriptor>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor for `entity`, building it on first use.
    pub fn descriptor(&self, entity: EntityRef) -> Result<Arc<EntityDescriptor>> {
        if let Some(descriptor) = self.descriptors.read().get(entity.name()) {
            return Ok(Arc::clone(descriptor));
        }

        let built = Arc::new(EntityDescriptor::build(entity)?);
        debug!(
            entity = entity.short_name(),
            datasource = built.datasource(),
            fields = built.fields().len(),
            "Registered entity descriptor"
        );

        let mut descriptors = self.descriptors.write();
        Ok(Arc::clone(descriptors.entry(entity.name()).or_insert(built)))
    }

    pub fn descriptor_of<T: EntityType>(&self) -> Result<Arc<EntityDescriptor>> {
        self.descriptor(EntityRef::of::<T>())
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.descriptors.read().contains_key(entity.name())
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Field;
    use crate::SpotError;

    struct Post;

    impl EntityType for Post {
        fn datasource() -> &'static str {
            "posts"
        }

        fn fields() -> Vec<(&'static str, Field)> {
            vec![
                ("id", Field::int().primary().serial()),
                ("title", Field::string().required()),
                ("status", Field::int().default(0)),
                ("slug", Field::string().primary()),
            ]
        }
    }

    struct NoSource;

    impl EntityType for NoSource {
        fn datasource() -> &'static str {
            ""
        }

        fn fields() -> Vec<(&'static str, Field)> {
            vec![("id", Field::int())]
        }
    }

    struct NoFields;

    impl EntityType for NoFields {
        fn datasource() -> &'static str {
            "nothing"
        }

        fn fields() -> Vec<(&'static str, Field)> {
            Vec::new()
        }
    }

    #[test]
    fn test_descriptor_is_cached() {
        let registry = EntityRegistry::new();
        let first = registry.descriptor_of::<Post>().unwrap();
        let second = registry.descriptor_of::<Post>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_primary_field_is_the_key() {
        let registry = EntityRegistry::new();
        let descriptor = registry.descriptor_of::<Post>().unwrap();
        assert_eq!(descriptor.primary_key(), Some("id"));
        assert_eq!(descriptor.datasource(), "posts");
        assert_eq!(
            descriptor.fields().keys().collect::<Vec<_>>(),
            vec!["id", "title", "status", "slug"]
        );
        assert_eq!(descriptor.defaults().get("status"), Some(&crate::Value::Int(0)));
    }

    #[test]
    fn test_missing_datasource_is_configuration_error() {
        let registry = EntityRegistry::new();
        let err = registry.descriptor_of::<NoSource>().unwrap_err();
        assert!(matches!(err, SpotError::Configuration(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_fields_is_configuration_error() {
        let registry = EntityRegistry::new();
        let err = registry.descriptor_of::<NoFields>().unwrap_err();
        assert!(matches!(err, SpotError::Configuration(_)));
    }
}
