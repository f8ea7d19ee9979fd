//! Ordered result sets.

use crate::entity::Entity;
use crate::{Record, Value};

/// Entities returned by a query, in result order.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    entities: Vec<Entity>,
}

impl Collection {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn first(&self) -> Option<&Entity> {
        self.entities.first()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    /// Distinct primary key values, in first-seen order.
    pub fn identities(&self) -> Vec<Value> {
        let mut seen = Vec::new();
        for key in self.entities.iter().filter_map(Entity::primary_key) {
            if !seen.contains(key) {
                seen.push(key.clone());
            }
        }
        seen
    }

    /// Distinct non-null values of `field`, in first-seen order.
    pub fn column(&self, field: &str) -> Vec<Value> {
        let mut seen: Vec<Value> = Vec::new();
        for value in self.entities.iter().map(|e| e.get(field)) {
            if !value.is_null() && !seen.contains(value) {
                seen.push(value.clone());
            }
        }
        seen
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.entities.iter().map(Entity::data).collect()
    }

    pub fn into_vec(self) -> Vec<Entity> {
        self.entities
    }
}

impl From<Vec<Entity>> for Collection {
    fn from(entities: Vec<Entity>) -> Self {
        Self::new(entities)
    }
}

impl IntoIterator for Collection {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::descriptor::{EntityDescriptor, EntityRef, EntityType, Field};

    struct Tag;

    impl EntityType for Tag {
        fn datasource() -> &'static str {
            "tags"
        }

        fn fields() -> Vec<(&'static str, Field)> {
            vec![("id", Field::int().primary().serial()), ("name", Field::string())]
        }
    }

    fn tag(id: i64, name: &str) -> Entity {
        let descriptor = Arc::new(EntityDescriptor::build(EntityRef::of::<Tag>()).unwrap());
        let mut row = Record::new();
        row.insert("id".to_string(), Value::Int(id));
        row.insert("name".to_string(), Value::from(name));
        Entity::from_row(descriptor, row)
    }

    #[test]
    fn test_identities_are_distinct() {
        let collection = Collection::new(vec![tag(1, "a"), tag(2, "b"), tag(1, "a")]);
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.identities(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(collection.column("name"), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_iteration_and_records() {
        let collection = Collection::from(vec![tag(1, "a"), tag(2, "b")]);
        assert_eq!(collection.first().map(|e| e.get("name").clone()), Some(Value::from("a")));
        assert_eq!(collection.get(1).and_then(Entity::primary_key), Some(&Value::Int(2)));
        assert_eq!(collection.iter().count(), 2);

        let records = collection.to_records();
        assert_eq!(records[1].get("name"), Some(&Value::from("b")));

        let names: Vec<Value> = collection.into_iter().map(|e| e.get("name").clone()).collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_empty() {
        let collection = Collection::default();
        assert!(collection.is_empty());
        assert!(collection.first().is_none());
        assert!(collection.identities().is_empty());
    }
}
