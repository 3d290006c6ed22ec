//! The document-type registry.
//!
//! Type metadata is assembled explicitly at process start: each document
//! type registers a `DocumentTypeDef` carrying its schema, embedded child
//! types, required ownership levels, joint validator, and hook handler. The
//! registry is the factory for documents; nothing is discovered at runtime.

use crate::{
    document::{Document, ParentRef},
    error::{Error, Result},
    field::{Field, FieldOptions},
    hooks::{DocumentHooks, NoHooks},
    model::ValidateOptions,
    ownership::{Action, OwnershipLevel},
    schema::Schema,
    validation::ValidationFailure,
    CollectionName, DocumentType, FieldName, JsonObject,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Minimum ownership level required per action on a document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredLevels {
    pub view: OwnershipLevel,
    pub update: OwnershipLevel,
    pub delete: OwnershipLevel,
}

impl Default for RequiredLevels {
    fn default() -> Self {
        Self {
            view: OwnershipLevel::Limited,
            update: OwnershipLevel::Owner,
            delete: OwnershipLevel::Owner,
        }
    }
}

impl RequiredLevels {
    pub fn for_action(&self, action: Action) -> OwnershipLevel {
        match action {
            Action::View => self.view,
            // creation is gated by the target type's update level
            Action::Create | Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

/// Cross-field validator over a candidate source object.
pub type JointValidator = fn(&JsonObject) -> std::result::Result<(), ValidationFailure>;

/// Static metadata for one document type.
pub struct DocumentTypeDef {
    name: DocumentType,
    collection: CollectionName,
    schema: Arc<Schema>,
    embedded: BTreeMap<FieldName, Arc<DocumentTypeDef>>,
    preserve_on_import: Vec<FieldName>,
    required_levels: RequiredLevels,
    joint_validate: Option<JointValidator>,
    hooks: Arc<dyn DocumentHooks>,
}

impl DocumentTypeDef {
    /// Define a document type. The identity field `_id` is provided
    /// automatically at the front of the schema when absent.
    pub fn new(
        name: impl Into<DocumentType>,
        collection: impl Into<CollectionName>,
        mut schema: Schema,
    ) -> Self {
        if !schema.has("_id") {
            schema.insert_first("_id", Field::string(FieldOptions::default().nullable()));
        }
        Self {
            name: name.into(),
            collection: collection.into(),
            schema: Arc::new(schema),
            embedded: BTreeMap::new(),
            preserve_on_import: Vec::new(),
            required_levels: RequiredLevels::default(),
            joint_validate: None,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Declare an embedded child type living under a schema field.
    pub fn with_embedded(mut self, field: impl Into<FieldName>, def: Arc<DocumentTypeDef>) -> Self {
        self.embedded.insert(field.into(), def);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn DocumentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_joint_validator(mut self, validator: JointValidator) -> Self {
        self.joint_validate = Some(validator);
        self
    }

    /// Fields kept through `import_source`.
    pub fn with_preserved<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FieldName>,
    {
        self.preserve_on_import = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_levels(mut self, levels: RequiredLevels) -> Self {
        self.required_levels = levels;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn embedded_defs(&self) -> &BTreeMap<FieldName, Arc<DocumentTypeDef>> {
        &self.embedded
    }

    /// The child type living under an embedded field.
    pub fn embedded_def(&self, field: &str) -> Result<&Arc<DocumentTypeDef>> {
        self.embedded
            .get(field)
            .ok_or_else(|| Error::UnknownEmbeddedCollection(field.to_string()))
    }

    pub fn preserve_on_import(&self) -> &[FieldName] {
        &self.preserve_on_import
    }

    pub fn required_levels(&self) -> &RequiredLevels {
        &self.required_levels
    }

    pub fn joint_validator(&self) -> Option<JointValidator> {
        self.joint_validate
    }

    pub fn hooks(&self) -> &Arc<dyn DocumentHooks> {
        &self.hooks
    }
}

impl fmt::Debug for DocumentTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTypeDef")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("embedded", &self.embedded.keys().collect::<Vec<_>>())
            .field("preserve_on_import", &self.preserve_on_import)
            .field("required_levels", &self.required_levels)
            .field("joint_validate", &self.joint_validate.is_some())
            .finish()
    }
}

/// Maps type tags to their definitions and constructs documents.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    types: HashMap<DocumentType, Arc<DocumentTypeDef>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, returning the shared handle.
    pub fn register(&mut self, def: DocumentTypeDef) -> Arc<DocumentTypeDef> {
        let def = Arc::new(def);
        self.register_arc(def.clone());
        def
    }

    pub fn register_arc(&mut self, def: Arc<DocumentTypeDef>) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<DocumentTypeDef>> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownDocumentType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &DocumentType> {
        self.types.keys()
    }

    /// Construct a document of a registered type.
    pub fn create(
        &self,
        document_type: &str,
        data: &Value,
        options: &ValidateOptions,
    ) -> Result<Document> {
        self.create_with_parent(document_type, data, options, None)
    }

    pub fn create_with_parent(
        &self,
        document_type: &str,
        data: &Value,
        options: &ValidateOptions,
        parent: Option<ParentRef>,
    ) -> Result<Document> {
        let def = self.get(document_type)?;
        Document::new(def.clone(), data, options, parent)
    }
}
