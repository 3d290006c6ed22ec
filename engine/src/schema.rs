//! Schemas: ordered, named collections of fields.
//!
//! A schema is built once per document type when the registry is constructed
//! and shared behind an `Arc`. Insertion order is initialization order, so
//! cleaned and initialized objects iterate in the order fields were declared.

use crate::{
    field::Field,
    validation::{join_path, ValidationFailures},
    FieldName, JsonObject,
};
use indexmap::IndexMap;
use serde_json::Value;

/// An ordered map of field name to field definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: IndexMap<FieldName, Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<FieldName>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn insert(&mut self, name: impl Into<FieldName>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    /// Insert a field at the front of the declaration order.
    pub fn insert_first(&mut self, name: impl Into<FieldName>, field: Field) {
        self.fields.shift_insert(0, name.into(), field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Field)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Coerce a raw value into a sealed source object.
    ///
    /// Keys outside the schema are dropped. Fields absent from the input stay
    /// absent unless they carry an initial value. Non-objects clean to the
    /// object of initials.
    pub fn clean(&self, raw: &Value) -> JsonObject {
        let empty = JsonObject::new();
        let input = raw.as_object().unwrap_or(&empty);
        let mut source = JsonObject::new();
        for (name, field) in &self.fields {
            if let Some(cleaned) = field.clean(input.get(name)) {
                source.insert(name.clone(), cleaned);
            }
        }
        source
    }

    /// Validate a full source object. Absent required fields are flagged.
    pub fn validate_source(&self, source: &JsonObject, prefix: &str) -> ValidationFailures {
        let mut failures = ValidationFailures::new();
        for (name, field) in &self.fields {
            let path = join_path(prefix, name);
            failures.extend(field.validate(source.get(name), &path));
        }
        failures
    }

    /// Validate only the fields present in a changeset.
    pub fn validate_changes(&self, changes: &JsonObject) -> ValidationFailures {
        let mut failures = ValidationFailures::new();
        for (name, field) in &self.fields {
            if let Some(value) = changes.get(name) {
                failures.extend(field.validate(Some(value), name));
            }
        }
        failures
    }

    /// Substitute per-field fallback values for failing top-level fields.
    ///
    /// Returns the failures that could not be repaired this way.
    pub fn apply_fallback(
        &self,
        source: &mut JsonObject,
        failures: &ValidationFailures,
    ) -> ValidationFailures {
        let mut unrepaired = ValidationFailures::new();
        let mut repaired: Vec<&FieldName> = Vec::new();
        for failure in failures.iter() {
            let top = failure
                .path
                .split('.')
                .next()
                .unwrap_or(failure.path.as_str());
            match self.fields.get_key_value(top) {
                Some((name, field)) => {
                    if !repaired.contains(&name) {
                        match field.fallback_value() {
                            Some(value) => {
                                source.insert(name.clone(), value);
                            }
                            None => {
                                source.remove(name.as_str());
                            }
                        }
                        repaired.push(name);
                    }
                }
                None => unrepaired.push(failure.clone()),
            }
        }
        unrepaired
    }

    /// Expand a source object into its runtime representation.
    pub fn initialize(&self, source: &JsonObject) -> JsonObject {
        let mut initialized = JsonObject::new();
        for (name, field) in &self.fields {
            if let Some(value) = source.get(name) {
                initialized.insert(name.clone(), field.initialize(value));
            }
        }
        initialized
    }

    /// Collapse a runtime object back into source form.
    pub fn to_object(&self, initialized: &JsonObject) -> JsonObject {
        let mut source = JsonObject::new();
        for (name, field) in &self.fields {
            if let Some(value) = initialized.get(name) {
                source.insert(name.clone(), field.to_object(value));
            }
        }
        source
    }
}
