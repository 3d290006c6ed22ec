//! Schema-bound value objects.
//!
//! A `DataModel` holds the sealed source object of a document, the derived
//! runtime representation, and the most recent validation failures. All
//! mutation flows through `update_source`, which cleans and re-validates a
//! candidate before committing it.

use crate::{
    error::{Error, Result},
    schema::Schema,
    validation::ValidationFailures,
    FieldName, JsonObject,
};
use serde_json::Value;
use std::sync::Arc;

/// Options controlling a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Validate only this changeset instead of the full source
    pub changes: Option<Value>,
    /// Re-clean the data before validating
    pub clean: bool,
    /// Substitute per-field fallback values for failures
    pub fallback: bool,
    /// Raise an aggregated error instead of recording failures
    pub strict: bool,
    /// Quarantine invalid embedded children instead of failing the parent
    pub drop_invalid_embedded: bool,
}

impl ValidateOptions {
    /// Strict validation, the default for construction.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Tolerant validation with fallback repair, used when re-hydrating
    /// persisted data that must not be rejected.
    pub fn lenient() -> Self {
        Self {
            fallback: true,
            ..Self::default()
        }
    }
}

/// Options controlling a source update.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Compute the diff without committing
    pub dry_run: bool,
    /// Substitute fallback values for invalid changes
    pub fallback: bool,
    /// Merge nested plain objects key-wise instead of replacing them
    pub recursive: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            fallback: false,
            recursive: true,
        }
    }
}

/// A schema-bound document body.
#[derive(Debug, Clone)]
pub struct DataModel {
    schema: Arc<Schema>,
    source: JsonObject,
    initialized: JsonObject,
    validation_failures: Option<ValidationFailures>,
}

impl DataModel {
    /// Clean and validate raw data into a model.
    ///
    /// Under `strict` options any failure aborts with
    /// [`Error::Validation`]; otherwise failures are recorded on the
    /// instance and construction succeeds.
    pub fn new(schema: Arc<Schema>, data: &Value, options: &ValidateOptions) -> Result<Self> {
        let mut source = schema.clean(data);
        let mut failures = schema.validate_source(&source, "");
        if options.fallback && !failures.is_empty() {
            let unrepaired = schema.apply_fallback(&mut source, &failures);
            failures = schema.validate_source(&source, "");
            failures.extend(unrepaired);
        }
        let recorded = if failures.is_empty() {
            None
        } else if options.strict {
            return Err(Error::Validation(failures));
        } else {
            Some(failures)
        };
        let initialized = schema.initialize(&source);
        Ok(Self {
            schema,
            source,
            initialized,
            validation_failures: recorded,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The sealed source object.
    pub fn source(&self) -> &JsonObject {
        &self.source
    }

    /// A field's runtime value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.initialized.get(name)
    }

    /// A field's source value.
    pub fn source_value(&self, name: &str) -> Option<&Value> {
        self.source.get(name)
    }

    /// Failures recorded by the most recent non-strict validation.
    pub fn validation_failures(&self) -> Option<&ValidationFailures> {
        self.validation_failures.as_ref()
    }

    /// Re-validate the current source, or a changeset against it.
    ///
    /// Returns whether the data is valid. Under `strict` options an invalid
    /// result is an error instead.
    pub fn validate(&mut self, options: &ValidateOptions) -> Result<bool> {
        if let Some(changes) = &options.changes {
            let changes = changes.as_object().ok_or_else(|| {
                Error::InvalidChanges("changes must be a json object".to_string())
            })?;
            let mut changeset = JsonObject::new();
            for (key, value) in changes {
                if let Some(field) = self.schema.get(key) {
                    if let Some(cleaned) = field.clean(Some(value)) {
                        changeset.insert(key.clone(), cleaned);
                    }
                }
            }
            let failures = self.schema.validate_changes(&changeset);
            return self.finish_validation(failures, options);
        }

        if options.clean {
            self.source = self.schema.clean(&Value::Object(self.source.clone()));
        }
        let mut failures = self.schema.validate_source(&self.source, "");
        if options.fallback && !failures.is_empty() {
            let unrepaired = self.schema.apply_fallback(&mut self.source, &failures);
            failures = self.schema.validate_source(&self.source, "");
            failures.extend(unrepaired);
            self.reset();
        }
        self.finish_validation(failures, options)
    }

    fn finish_validation(
        &mut self,
        failures: ValidationFailures,
        options: &ValidateOptions,
    ) -> Result<bool> {
        if failures.is_empty() {
            self.validation_failures = None;
            return Ok(true);
        }
        if options.strict {
            return Err(Error::Validation(failures));
        }
        self.validation_failures = Some(failures);
        Ok(false)
    }

    /// Apply a changeset to the source.
    ///
    /// The changes are cloned onto a candidate source, cleaned field-wise,
    /// and the touched fields re-validated before anything is committed.
    /// Returns the top-level field names whose committed value actually
    /// changed, decided by deep structural equality, in schema order.
    pub fn update_source(
        &mut self,
        changes: &Value,
        options: &UpdateOptions,
    ) -> Result<Vec<FieldName>> {
        let (candidate, changed) = self.prepare_update(changes, options)?;
        if !options.dry_run {
            self.commit_source(candidate);
        }
        Ok(changed)
    }

    /// Build the post-update candidate source and the effective diff without
    /// committing. Callers interpose joint validation between this and
    /// [`DataModel::commit_source`].
    pub(crate) fn prepare_update(
        &self,
        changes: &Value,
        options: &UpdateOptions,
    ) -> Result<(JsonObject, Vec<FieldName>)> {
        let changes = changes
            .as_object()
            .ok_or_else(|| Error::InvalidChanges("changes must be a json object".to_string()))?;

        for key in changes.keys() {
            if !self.schema.has(key) {
                return Err(Error::UnknownField(key.clone()));
            }
        }

        let mut candidate = self.source.clone();
        let mut touched: Vec<FieldName> = Vec::new();
        for (key, value) in changes {
            touched.push(key.clone());
            let merged = match candidate.get(key) {
                Some(current)
                    if options.recursive && current.is_object() && value.is_object() =>
                {
                    let mut base = current.clone();
                    merge_recursive(&mut base, value);
                    base
                }
                _ => value.clone(),
            };
            let field = self
                .schema
                .get(key)
                .ok_or_else(|| Error::UnknownField(key.clone()))?;
            match field.clean(Some(&merged)) {
                Some(cleaned) => {
                    candidate.insert(key.clone(), cleaned);
                }
                None => {
                    candidate.remove(key.as_str());
                }
            }
        }

        let mut failures = ValidationFailures::new();
        for key in &touched {
            if let Some(field) = self.schema.get(key) {
                failures.extend(field.validate(candidate.get(key.as_str()), key));
            }
        }
        if !failures.is_empty() {
            if options.fallback {
                let unrepaired = self.schema.apply_fallback(&mut candidate, &failures);
                let mut remaining = ValidationFailures::new();
                for key in &touched {
                    if let Some(field) = self.schema.get(key) {
                        remaining.extend(field.validate(candidate.get(key.as_str()), key));
                    }
                }
                remaining.extend(unrepaired);
                if !remaining.is_empty() {
                    return Err(Error::Validation(remaining));
                }
            } else {
                return Err(Error::Validation(failures));
            }
        }

        let mut changed: Vec<FieldName> = Vec::new();
        for name in self.schema.names() {
            if touched.contains(name) && candidate.get(name.as_str()) != self.source.get(name.as_str())
            {
                changed.push(name.clone());
            }
        }
        Ok((candidate, changed))
    }

    /// Replace the source and re-derive the runtime representation.
    pub(crate) fn commit_source(&mut self, source: JsonObject) {
        self.source = source;
        self.reset();
    }

    /// Write a field's source value directly, bypassing clean and validate.
    /// Reserved for identity assignment and embedded array synchronization.
    pub(crate) fn set_raw(&mut self, name: &str, value: Value) {
        if let Some(field) = self.schema.get(name) {
            self.initialized
                .insert(name.to_string(), field.initialize(&value));
        }
        self.source.insert(name.to_string(), value);
    }

    pub(crate) fn record_failures(&mut self, failures: ValidationFailures) {
        self.validation_failures = Some(failures);
    }

    /// Re-derive the runtime representation from the current source.
    pub fn reset(&mut self) {
        self.initialized = self.schema.initialize(&self.source);
    }

    /// An independent copy with overrides merged onto the source.
    pub fn clone_with(&self, overrides: &Value, options: &ValidateOptions) -> Result<Self> {
        let mut data = self.source.clone();
        if let Some(obj) = overrides.as_object() {
            for (key, value) in obj {
                data.insert(key.clone(), value.clone());
            }
        }
        Self::new(self.schema.clone(), &Value::Object(data), options)
    }

    /// Export the model as a plain JSON object, in source or runtime form.
    pub fn to_object(&self, source_form: bool) -> Value {
        if source_form {
            Value::Object(self.source.clone())
        } else {
            Value::Object(self.initialized.clone())
        }
    }
}

/// Key-wise merge of a patch object onto a base value. Non-object values
/// replace wholesale.
fn merge_recursive(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_recursive(existing, value);
                    }
                    _ => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}
