//! Entity instances.
//!
//! An [`Entity`] is a descriptor-aware record. Values loaded from storage
//! are kept apart from values assigned since, so updates only write the
//! assigned fields.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::descriptor::{EntityDescriptor, EntityRef};
use crate::relation::RelationHandle;
use crate::{Record, Value};

static NULL: Value = Value::Null;

/// One row of an entity type.
#[derive(Clone)]
pub struct Entity {
    descriptor: Arc<EntityDescriptor>,
    /// Values as last read from or written to storage
    data: Record,
    /// Values assigned since
    modified: Record,
    errors: IndexMap<String, Vec<String>>,
    relations: IndexMap<String, RelationHandle>,
    new: bool,
}

impl Entity {
    /// A new, unsaved entity holding only field defaults.
    pub fn new(descriptor: Arc<EntityDescriptor>) -> Self {
        Self {
            descriptor,
            data: Record::new(),
            modified: Record::new(),
            errors: IndexMap::new(),
            relations: IndexMap::new(),
            new: true,
        }
    }

    /// An entity loaded from a storage row. Declared fields are cast to
    /// their field type; other columns are kept as read.
    pub fn from_row(descriptor: Arc<EntityDescriptor>, row: Record) -> Self {
        let data = row
            .into_iter()
            .map(|(name, value)| {
                let value = match descriptor.field(&name) {
                    Some(field) => field.field_type.cast(value),
                    None => value,
                };
                (name, value)
            })
            .collect();
        Self {
            data,
            new: false,
            ..Self::new(descriptor)
        }
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    pub fn entity_ref(&self) -> EntityRef {
        self.descriptor.entity()
    }

    /// True until the entity has been written or was loaded.
    pub fn is_new(&self) -> bool {
        self.new
    }

    /// Current value of `field`.
    ///
    /// Unset declared fields read as their default, unknown ones as null.
    pub fn get(&self, field: &str) -> &Value {
        self.modified
            .get(field)
            .or_else(|| self.data.get(field))
            .or_else(|| self.descriptor.defaults().get(field))
            .unwrap_or(&NULL)
    }

    /// Assigns `field`, casting the value to the declared field type.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let value = match self.descriptor.field(field) {
            Some(spec) => spec.field_type.cast(value),
            None => value,
        };
        self.modified.insert(field.to_string(), value);
        self
    }

    /// Assigns every entry of `data`.
    pub fn set_data(&mut self, data: Record) -> &mut Self {
        for (field, value) in data {
            self.set(&field, value);
        }
        self
    }

    /// All current values: declared fields first, in declaration order,
    /// followed by any other columns.
    pub fn data(&self) -> Record {
        let mut merged = self.descriptor.defaults().clone();
        for (field, value) in self.data.iter().chain(self.modified.iter()) {
            merged.insert(field.clone(), value.clone());
        }
        merged
    }

    /// Values assigned since the last load or save, whether or not they
    /// differ from the stored ones.
    pub fn data_modified(&self) -> Record {
        self.modified.clone()
    }

    pub fn is_modified(&self, field: &str) -> bool {
        self.modified.contains_key(field)
    }

    /// True if any field is modified.
    pub fn is_dirty(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Primary key value, if the entity has a non-null one.
    pub fn primary_key(&self) -> Option<&Value> {
        let field = self.descriptor.primary_key()?;
        Some(self.get(field)).filter(|v| !v.is_null())
    }

    pub fn errors(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    /// Messages recorded for `field`.
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records a validation message for `field`.
    pub fn error(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.entry(field.to_string()).or_default().push(message.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Lazily loaded relation attached by the mapper.
    pub fn relation(&self, name: &str) -> Option<&RelationHandle> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationHandle)> {
        self.relations.iter().map(|(name, handle)| (name.as_str(), handle))
    }

    /// Current data as a JSON object.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.data()
                .into_iter()
                .map(|(field, value)| (field, value.to_json()))
                .collect(),
        )
    }

    pub(crate) fn attach_relation(&mut self, name: &str, handle: RelationHandle) {
        self.relations.insert(name.to_string(), handle);
    }

    /// Moves the given modified fields into the stored data.
    pub(crate) fn mark_clean<'a>(&mut self, fields: impl IntoIterator<Item = &'a String>) {
        for field in fields {
            if let Some(value) = self.modified.shift_remove(field) {
                self.data.insert(field.clone(), value);
            }
        }
    }

    /// Stores a value read back from storage, such as a generated key.
    pub(crate) fn set_clean(&mut self, field: &str, value: Value) {
        let value = match self.descriptor.field(field) {
            Some(spec) => spec.field_type.cast(value),
            None => value,
        };
        self.modified.shift_remove(field);
        self.data.insert(field.to_string(), value);
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.new = false;
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("entity", &self.descriptor.entity().short_name())
            .field("data", &self.data())
            .field("modified", &self.modified.keys().collect::<Vec<_>>())
            .field("errors", &self.errors)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}
