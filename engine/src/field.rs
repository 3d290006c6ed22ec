//! Field definitions: the atomic typed slots of a schema.
//!
//! A field knows how to move a value between three representations:
//! the *source* form (wire/storage), the *initialized* form (runtime), and
//! the *assignment* form (whatever a caller handed in). `clean` coerces an
//! assignment into source form and never fails; `validate` is a pure check
//! over a source value; `initialize`/`to_object` convert between source and
//! runtime forms and obey the round-trip law
//! `to_object(initialize(clean(x))) == clean(x)`.

use crate::{
    schema::Schema,
    validation::{join_path, FailureKind, ValidationFailure, ValidationFailures},
    DocumentType,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Deriving function for an initial value.
pub type InitialFn = fn() -> Value;

/// Custom validation predicate. Returns `true` when the value is acceptable.
pub type ValidateFn = fn(&Value) -> bool;

/// Options shared by every field kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldOptions {
    /// Whether the field must be present in the source
    pub required: bool,
    /// Whether explicit null is acceptable
    pub nullable: bool,
    /// Literal initial value applied when the raw value is absent
    pub initial: Option<Value>,
    /// Deriving function for the initial value; takes precedence over `initial`
    pub initial_fn: Option<InitialFn>,
    /// Custom predicate checked after the built-in constraints
    pub validate: Option<ValidateFn>,
    /// Message used when the custom predicate rejects a value
    pub validation_error: Option<String>,
}

impl FieldOptions {
    /// Options for a required field.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    /// Set the literal initial value.
    pub fn initial(mut self, value: Value) -> Self {
        self.initial = Some(value);
        self
    }

    /// Set a deriving function for the initial value.
    pub fn initial_fn(mut self, f: InitialFn) -> Self {
        self.initial_fn = Some(f);
        self
    }

    /// Allow explicit null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attach a custom validation predicate with its failure message.
    pub fn validator(mut self, f: ValidateFn, message: impl Into<String>) -> Self {
        self.validate = Some(f);
        self.validation_error = Some(message.into());
        self
    }

    /// The initial value, if one is configured.
    pub fn initial_value(&self) -> Option<Value> {
        if let Some(f) = self.initial_fn {
            return Some(f());
        }
        self.initial.clone()
    }
}

/// A free-form text field.
#[derive(Debug, Clone, PartialEq)]
pub struct StringField {
    pub options: FieldOptions,
    /// Whether the empty string is acceptable
    pub blank: bool,
    /// Closed enumeration of acceptable values
    pub choices: Option<Vec<String>>,
}

/// A numeric field.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberField {
    pub options: FieldOptions,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Whether only whole numbers are acceptable
    pub integer: bool,
    pub choices: Option<Vec<f64>>,
}

/// A boolean field.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanField {
    pub options: FieldOptions,
}

/// A color field. Source form is a lowercase `#rrggbb` string; initialized
/// form is an `{r, g, b}` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorField {
    pub options: FieldOptions,
}

/// A file path field with an optional extension allow-list.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePathField {
    pub options: FieldOptions,
    /// Acceptable extensions without the dot; empty means any
    pub extensions: Vec<String>,
}

/// A reference to another document, stored as its id string.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignRefField {
    pub options: FieldOptions,
    pub document_type: DocumentType,
}

/// An ordered list of homogeneous elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayField {
    pub options: FieldOptions,
    pub element: Box<Field>,
}

/// An unordered set of unique homogeneous elements, stored as an array.
#[derive(Debug, Clone, PartialEq)]
pub struct SetField {
    pub options: FieldOptions,
    pub element: Box<Field>,
}

/// A nested object with its own schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub options: FieldOptions,
    pub fields: Arc<Schema>,
}

/// A collection of embedded child documents, stored as an array of child
/// source objects. At the field level children are cleaned against the child
/// schema and shape-checked; the owning document builds the live collection
/// and validates each child in depth.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedField {
    pub options: FieldOptions,
    pub document_type: DocumentType,
    pub schema: Arc<Schema>,
}

/// Arbitrary nested JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonField {
    pub options: FieldOptions,
}

/// Enumeration over all field kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    String(StringField),
    Number(NumberField),
    Boolean(BooleanField),
    Color(ColorField),
    FilePath(FilePathField),
    ForeignRef(ForeignRefField),
    Array(ArrayField),
    Set(SetField),
    Schema(SchemaField),
    Embedded(EmbeddedField),
    Json(JsonField),
}

impl Field {
    /// A string field accepting blanks, without choices.
    pub fn string(options: FieldOptions) -> Self {
        Field::String(StringField {
            options,
            blank: true,
            choices: None,
        })
    }

    /// An unconstrained number field.
    pub fn number(options: FieldOptions) -> Self {
        Field::Number(NumberField {
            options,
            min: None,
            max: None,
            integer: false,
            choices: None,
        })
    }

    /// A whole-number field.
    pub fn integer(options: FieldOptions) -> Self {
        Field::Number(NumberField {
            options,
            min: None,
            max: None,
            integer: true,
            choices: None,
        })
    }

    pub fn boolean(options: FieldOptions) -> Self {
        Field::Boolean(BooleanField { options })
    }

    pub fn color(options: FieldOptions) -> Self {
        Field::Color(ColorField { options })
    }

    pub fn file_path(options: FieldOptions, extensions: Vec<String>) -> Self {
        Field::FilePath(FilePathField {
            options,
            extensions,
        })
    }

    pub fn foreign_ref(options: FieldOptions, document_type: impl Into<DocumentType>) -> Self {
        Field::ForeignRef(ForeignRefField {
            options,
            document_type: document_type.into(),
        })
    }

    pub fn array(options: FieldOptions, element: Field) -> Self {
        Field::Array(ArrayField {
            options,
            element: Box::new(element),
        })
    }

    pub fn set(options: FieldOptions, element: Field) -> Self {
        Field::Set(SetField {
            options,
            element: Box::new(element),
        })
    }

    pub fn nested(options: FieldOptions, fields: Schema) -> Self {
        Field::Schema(SchemaField {
            options,
            fields: Arc::new(fields),
        })
    }

    pub fn embedded(
        options: FieldOptions,
        document_type: impl Into<DocumentType>,
        schema: Arc<Schema>,
    ) -> Self {
        Field::Embedded(EmbeddedField {
            options,
            document_type: document_type.into(),
            schema,
        })
    }

    pub fn json(options: FieldOptions) -> Self {
        Field::Json(JsonField { options })
    }

    /// Shared options for this field.
    pub fn options(&self) -> &FieldOptions {
        match self {
            Field::String(f) => &f.options,
            Field::Number(f) => &f.options,
            Field::Boolean(f) => &f.options,
            Field::Color(f) => &f.options,
            Field::FilePath(f) => &f.options,
            Field::ForeignRef(f) => &f.options,
            Field::Array(f) => &f.options,
            Field::Set(f) => &f.options,
            Field::Schema(f) => &f.options,
            Field::Embedded(f) => &f.options,
            Field::Json(f) => &f.options,
        }
    }

    /// Human-readable name of this field kind, used in failure messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Field::String(_) => "string",
            Field::Number(_) => "number",
            Field::Boolean(_) => "boolean",
            Field::Color(_) => "color",
            Field::FilePath(_) => "file path",
            Field::ForeignRef(_) => "reference",
            Field::Array(_) => "array",
            Field::Set(_) => "set",
            Field::Schema(_) => "object",
            Field::Embedded(_) => "embedded collection",
            Field::Json(_) => "json",
        }
    }

    /// Best-effort coercion of a raw value into source form.
    ///
    /// `None` means the value is absent; an absent value resolves to the
    /// configured initial, or stays absent. Never fails: uncoercible values
    /// pass through unchanged for `validate` to flag. Idempotent.
    pub fn clean(&self, value: Option<&Value>) -> Option<Value> {
        let value = match value {
            None => return self.options().initial_value(),
            Some(v) => v,
        };
        if value.is_null() {
            return Some(Value::Null);
        }
        Some(self.clean_present(value))
    }

    fn clean_present(&self, value: &Value) -> Value {
        match self {
            // non-strings pass through for validate to flag
            Field::String(_) => match value {
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other.clone(),
            },
            Field::Number(f) => {
                let parsed = match value {
                    Value::Number(_) => Some(value.clone()),
                    Value::String(s) => s.trim().parse::<f64>().ok().and_then(number_value),
                    _ => None,
                };
                match parsed {
                    Some(v) if f.integer => v
                        .as_f64()
                        .filter(|n| n.is_finite())
                        .map(|n| json!(n.round() as i64))
                        .unwrap_or(v),
                    Some(v) => v,
                    None => value.clone(),
                }
            }
            Field::Boolean(_) => match value {
                Value::String(s) if s.trim() == "true" => json!(true),
                Value::String(s) if s.trim() == "false" => json!(false),
                Value::Number(n) if n.as_i64() == Some(0) => json!(false),
                Value::Number(n) if n.as_i64() == Some(1) => json!(true),
                other => other.clone(),
            },
            Field::Color(_) => match value {
                Value::String(s) => {
                    let trimmed = s.trim().to_lowercase();
                    if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
                        Value::String(format!("#{trimmed}"))
                    } else {
                        Value::String(trimmed)
                    }
                }
                other => other.clone(),
            },
            Field::FilePath(_) => match value {
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other.clone(),
            },
            Field::ForeignRef(_) => match value {
                Value::String(s) if s.trim().is_empty() => Value::Null,
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other.clone(),
            },
            Field::Array(f) => {
                let elements = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                Value::Array(
                    elements
                        .iter()
                        .map(|e| f.element.clean_present(e))
                        .collect(),
                )
            }
            Field::Set(f) => {
                let elements = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                let mut seen: Vec<Value> = Vec::new();
                for element in &elements {
                    let cleaned = f.element.clean_present(element);
                    if !seen.contains(&cleaned) {
                        seen.push(cleaned);
                    }
                }
                Value::Array(seen)
            }
            Field::Schema(f) => match value {
                Value::Object(_) => Value::Object(f.fields.clean(value)),
                other => other.clone(),
            },
            Field::Embedded(f) => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Object(_) => {
                                let mut cleaned = f.schema.clean(item);
                                // children keep their identity through cleaning
                                if let Some(id) = item.get("_id") {
                                    cleaned.insert("_id".to_string(), id.clone());
                                }
                                Value::Object(cleaned)
                            }
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            },
            Field::Json(_) => value.clone(),
        }
    }

    /// Pure validation of a source value against this field's constraints.
    pub fn validate(&self, value: Option<&Value>, path: &str) -> ValidationFailures {
        let mut failures = ValidationFailures::new();
        let value = match value {
            None => {
                if self.options().required {
                    failures.push(ValidationFailure::new(
                        path,
                        FailureKind::Required,
                        Value::Null,
                        "field is required",
                    ));
                }
                return failures;
            }
            Some(v) => v,
        };
        if value.is_null() {
            if !self.options().nullable {
                failures.push(ValidationFailure::new(
                    path,
                    FailureKind::InvalidNull,
                    Value::Null,
                    "null is not allowed",
                ));
            }
            return failures;
        }

        self.validate_value(value, path, &mut failures);

        if failures.is_empty() {
            if let Some(predicate) = self.options().validate {
                if !predicate(value) {
                    let message = self
                        .options()
                        .validation_error
                        .clone()
                        .unwrap_or_else(|| "value rejected by validator".to_string());
                    failures.push(ValidationFailure::new(
                        path,
                        FailureKind::Custom,
                        value.clone(),
                        message,
                    ));
                }
            }
        }

        failures
    }

    fn validate_value(&self, value: &Value, path: &str, failures: &mut ValidationFailures) {
        match self {
            Field::String(f) => {
                let Some(s) = value.as_str() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                if s.is_empty() && !f.blank {
                    failures.push(ValidationFailure::new(
                        path,
                        FailureKind::InvalidBlank,
                        value.clone(),
                        "blank string is not allowed",
                    ));
                }
                if let Some(choices) = &f.choices {
                    if !choices.iter().any(|c| c == s) {
                        failures.push(ValidationFailure::new(
                            path,
                            FailureKind::InvalidChoice,
                            value.clone(),
                            format!("must be one of: {}", choices.join(", ")),
                        ));
                    }
                }
            }
            Field::Number(f) => {
                let Some(n) = value.as_f64() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                if f.integer && n.fract() != 0.0 {
                    failures.push(ValidationFailure::new(
                        path,
                        FailureKind::TypeMismatch,
                        value.clone(),
                        "must be a whole number",
                    ));
                }
                if let Some(min) = f.min {
                    if n < min {
                        failures.push(ValidationFailure::new(
                            path,
                            FailureKind::OutOfRange,
                            value.clone(),
                            format!("must be at least {min}"),
                        ));
                    }
                }
                if let Some(max) = f.max {
                    if n > max {
                        failures.push(ValidationFailure::new(
                            path,
                            FailureKind::OutOfRange,
                            value.clone(),
                            format!("must be at most {max}"),
                        ));
                    }
                }
                if let Some(choices) = &f.choices {
                    if !choices.iter().any(|c| (c - n).abs() < f64::EPSILON) {
                        failures.push(ValidationFailure::new(
                            path,
                            FailureKind::InvalidChoice,
                            value.clone(),
                            "value is not an allowed choice",
                        ));
                    }
                }
            }
            Field::Boolean(_) => {
                if !value.is_boolean() {
                    failures.push(type_mismatch(path, self, value));
                }
            }
            Field::Color(_) => match value.as_str() {
                Some(s) if parse_color(s).is_some() => {}
                Some(_) => failures.push(ValidationFailure::new(
                    path,
                    FailureKind::InvalidFormat,
                    value.clone(),
                    "must be a #rrggbb color string",
                )),
                None => failures.push(type_mismatch(path, self, value)),
            },
            Field::FilePath(f) => {
                let Some(s) = value.as_str() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                if !f.extensions.is_empty() {
                    let matched = f
                        .extensions
                        .iter()
                        .any(|ext| s.to_lowercase().ends_with(&format!(".{}", ext.to_lowercase())));
                    if !matched {
                        failures.push(ValidationFailure::new(
                            path,
                            FailureKind::InvalidFormat,
                            value.clone(),
                            format!("must have one of the extensions: {}", f.extensions.join(", ")),
                        ));
                    }
                }
            }
            Field::ForeignRef(_) => match value.as_str() {
                Some(s) if is_valid_id(s) => {}
                Some(_) => failures.push(ValidationFailure::new(
                    path,
                    FailureKind::InvalidFormat,
                    value.clone(),
                    "must be an alphanumeric document id",
                )),
                None => failures.push(type_mismatch(path, self, value)),
            },
            Field::Array(f) => {
                let Some(items) = value.as_array() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    let item_path = join_path(path, &index.to_string());
                    failures.extend(f.element.validate(Some(item), &item_path));
                }
            }
            Field::Set(f) => {
                let Some(items) = value.as_array() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    let item_path = join_path(path, &index.to_string());
                    failures.extend(f.element.validate(Some(item), &item_path));
                    if items[..index].contains(item) {
                        failures.push(ValidationFailure::new(
                            item_path,
                            FailureKind::Duplicate,
                            item.clone(),
                            "duplicate element in set",
                        ));
                    }
                }
            }
            Field::Schema(f) => {
                let Some(obj) = value.as_object() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                failures.extend(f.fields.validate_source(obj, path));
            }
            // children are validated deeply by the owning document, which
            // can quarantine individual failures; here only the shape
            Field::Embedded(_) => {
                let Some(items) = value.as_array() else {
                    failures.push(type_mismatch(path, self, value));
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    if !item.is_object() {
                        failures.push(ValidationFailure::new(
                            join_path(path, &index.to_string()),
                            FailureKind::TypeMismatch,
                            item.clone(),
                            "embedded document must be an object",
                        ));
                    }
                }
            }
            Field::Json(_) => {}
        }
    }

    /// Expand a source value into its runtime representation.
    pub fn initialize(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            Field::Color(_) => match value.as_str().and_then(parse_color) {
                Some((r, g, b)) => json!({ "r": r, "g": g, "b": b }),
                None => value.clone(),
            },
            Field::Array(ArrayField { element, .. }) | Field::Set(SetField { element, .. }) => {
                match value.as_array() {
                    Some(items) => {
                        Value::Array(items.iter().map(|item| element.initialize(item)).collect())
                    }
                    None => value.clone(),
                }
            }
            Field::Schema(f) => match value.as_object() {
                Some(obj) => Value::Object(f.fields.initialize(obj)),
                None => value.clone(),
            },
            // the owning document builds the live collection; the field-level
            // runtime form stays the array of child sources
            Field::Embedded(_) => value.clone(),
            _ => value.clone(),
        }
    }

    /// Collapse a runtime value back into source form. Inverse of
    /// [`Field::initialize`] for every value `initialize` produced.
    pub fn to_object(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            Field::Color(_) => {
                let rgb = value.as_object().and_then(|obj| {
                    let r = obj.get("r")?.as_u64()?;
                    let g = obj.get("g")?.as_u64()?;
                    let b = obj.get("b")?.as_u64()?;
                    Some((r, g, b))
                });
                match rgb {
                    Some((r, g, b)) => Value::String(format!("#{r:02x}{g:02x}{b:02x}")),
                    None => value.clone(),
                }
            }
            Field::Array(ArrayField { element, .. }) | Field::Set(SetField { element, .. }) => {
                match value.as_array() {
                    Some(items) => {
                        Value::Array(items.iter().map(|item| element.to_object(item)).collect())
                    }
                    None => value.clone(),
                }
            }
            Field::Schema(f) => match value.as_object() {
                Some(obj) => Value::Object(f.fields.to_object(obj)),
                None => value.clone(),
            },
            _ => value.clone(),
        }
    }

    /// The value substituted for this field when validation falls back to
    /// defaults. `None` means the field is removed instead.
    pub fn fallback_value(&self) -> Option<Value> {
        if let Some(initial) = self.options().initial_value() {
            return Some(initial);
        }
        if self.options().nullable {
            return Some(Value::Null);
        }
        if !self.options().required {
            return None;
        }
        Some(self.zero_value())
    }

    fn zero_value(&self) -> Value {
        match self {
            Field::String(f) => match &f.choices {
                Some(choices) if !choices.is_empty() => json!(choices[0]),
                _ => json!(""),
            },
            Field::Number(f) => {
                let mut n: f64 = 0.0;
                if let Some(min) = f.min {
                    n = n.max(min);
                }
                if let Some(max) = f.max {
                    n = n.min(max);
                }
                if f.integer {
                    json!(n as i64)
                } else {
                    json!(n)
                }
            }
            Field::Boolean(_) => json!(false),
            Field::Color(_) => json!("#000000"),
            Field::FilePath(_) => json!(""),
            Field::ForeignRef(_) => Value::Null,
            Field::Array(_) | Field::Set(_) | Field::Embedded(_) => json!([]),
            Field::Schema(f) => Value::Object(f.fields.clean(&json!({}))),
            Field::Json(_) => json!({}),
        }
    }
}

fn type_mismatch(path: &str, field: &Field, value: &Value) -> ValidationFailure {
    ValidationFailure::new(
        path,
        FailureKind::TypeMismatch,
        value.clone(),
        format!(
            "expected a {}, got {}",
            field.kind_name(),
            json_type_name(value)
        ),
    )
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn number_value(n: f64) -> Option<Value> {
    serde_json::Number::from_f64(n).map(Value::Number)
}

/// Parse a `#rrggbb` color string.
pub(crate) fn parse_color(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Whether a string is acceptable as a document id.
pub(crate) fn is_valid_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}
