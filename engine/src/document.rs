//! Documents: identified, lifecycle-tracked data models.
//!
//! A document couples a `DataModel` with an identity, a lifecycle state
//! machine, an ownership map, static type metadata from the registry, and
//! live embedded collections built from its source arrays.

use crate::{
    collection::{EmbeddedCollection, InvalidDocument},
    error::{Error, Result},
    hooks::DocumentHooks,
    model::{DataModel, UpdateOptions, ValidateOptions},
    ownership::{Action, Ownership, OwnershipLevel},
    registry::DocumentTypeDef,
    validation::{join_path, FailureKind, ValidationFailure, ValidationFailures},
    DocumentId, DocumentType, FieldName, JsonObject,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Where a document sits in the persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// In memory only, never dispatched
    Transient,
    /// Submitted to the backend, awaiting acknowledgment
    Pending,
    /// Acknowledged by the backend
    Stored,
    /// Deletion acknowledged; terminal
    Deleted,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Transient => "transient",
            LifecycleState::Pending => "pending",
            LifecycleState::Stored => "stored",
            LifecycleState::Deleted => "deleted",
        };
        write!(f, "{name}")
    }
}

/// A weak reference to the owning document of an embedded child. Carries no
/// ownership of the parent, only enough to address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub document_type: DocumentType,
    pub id: DocumentId,
    /// The embedded field of the parent this child lives under
    pub collection: FieldName,
}

/// An instance of a registered document type.
#[derive(Debug, Clone)]
pub struct Document {
    model: DataModel,
    def: Arc<DocumentTypeDef>,
    parent: Option<ParentRef>,
    state: LifecycleState,
    prior_state: LifecycleState,
    embedded: BTreeMap<FieldName, EmbeddedCollection>,
    invalid: Vec<InvalidDocument>,
}

impl Document {
    /// Construct a document from raw data.
    ///
    /// Cleans and validates the body, then materializes embedded children
    /// from the source arrays. An invalid child fails the parent with its
    /// failure paths prefixed, unless `drop_invalid_embedded` is set, in
    /// which case the child is quarantined and the parent survives.
    pub fn new(
        def: Arc<DocumentTypeDef>,
        data: &Value,
        options: &ValidateOptions,
        parent: Option<ParentRef>,
    ) -> Result<Self> {
        let model = DataModel::new(def.schema().clone(), data, options)?;
        let mut document = Self {
            model,
            def,
            parent,
            state: LifecycleState::Transient,
            prior_state: LifecycleState::Transient,
            embedded: BTreeMap::new(),
            invalid: Vec::new(),
        };
        document.rebuild_embedded(options)?;
        document.validate_joint(options)?;
        Ok(document)
    }

    pub fn id(&self) -> Option<&str> {
        self.model
            .source_value("_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn document_type(&self) -> &str {
        self.def.name()
    }

    /// The canonical collection name of this document type.
    pub fn collection_name(&self) -> &str {
        self.def.collection()
    }

    pub fn definition(&self) -> &Arc<DocumentTypeDef> {
        &self.def
    }

    pub fn hooks(&self) -> &Arc<dyn DocumentHooks> {
        self.def.hooks()
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ParentRef>) {
        self.parent = parent;
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// A field's runtime value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.model.get(name)
    }

    /// The sealed source object.
    pub fn source(&self) -> &JsonObject {
        self.model.source()
    }

    pub fn validation_failures(&self) -> Option<&ValidationFailures> {
        self.model.validation_failures()
    }

    /// Assign the backend-issued identity. Fails once an id is present.
    pub fn set_id(&mut self, id: impl Into<DocumentId>) -> Result<()> {
        if self.id().is_some() {
            return Err(Error::ImmutableId);
        }
        let id = id.into();
        self.model.set_raw("_id", json!(id));
        for collection in self.embedded.values_mut() {
            collection.set_owner_id(id.clone());
        }
        Ok(())
    }

    /// The document's ownership map. A document whose source carries no
    /// ownership object is unrestricted.
    pub fn ownership(&self) -> Ownership {
        match self.model.source_value("ownership") {
            Some(value) => Ownership::from_value(value),
            None => Ownership {
                default: OwnershipLevel::Owner,
                users: BTreeMap::new(),
            },
        }
    }

    pub fn user_level(&self, user: &str) -> OwnershipLevel {
        self.ownership().level_for(user)
    }

    pub fn can_user(&self, user: &str, action: Action) -> bool {
        self.user_level(user) >= self.def.required_levels().for_action(action)
    }

    /// Permission check that surfaces the missing level on failure.
    pub fn check_permission(&self, user: &str, action: Action) -> Result<()> {
        let required = self.def.required_levels().for_action(action);
        let actual = self.user_level(user);
        if actual >= required {
            Ok(())
        } else {
            Err(Error::Permission {
                user: user.to_string(),
                document_type: self.def.name().to_string(),
                required,
                actual,
            })
        }
    }

    /// Re-validate the document, including the joint cross-field check. A
    /// changeset validates the proposed subset plus the joint rules over the
    /// source with the changes merged on; nothing is committed.
    pub fn validate(&mut self, options: &ValidateOptions) -> Result<bool> {
        let valid = self.model.validate(options)?;
        if !valid {
            return Ok(false);
        }
        let joint = match &options.changes {
            Some(changes) => self.joint_failures_for_changes(changes),
            None => self.joint_failures(),
        };
        match joint {
            None => Ok(true),
            Some(failures) => {
                if options.strict {
                    return Err(Error::Validation(failures));
                }
                self.model.record_failures(failures);
                Ok(false)
            }
        }
    }

    /// Apply a changeset to the document source.
    ///
    /// `_id` may not change once assigned. Joint validation runs against the
    /// candidate before commit. When an embedded field is touched the live
    /// collection is rebuilt from the committed array.
    pub fn update_source(
        &mut self,
        changes: &Value,
        options: &UpdateOptions,
    ) -> Result<Vec<FieldName>> {
        if let Some(new_id) = changes.get("_id") {
            if let Some(current) = self.id() {
                if new_id.as_str() != Some(current) {
                    return Err(Error::ImmutableId);
                }
            }
        }
        let (candidate, changed) = self.model.prepare_update(changes, options)?;
        if let Some(validator) = self.def.joint_validator() {
            if let Err(failure) = validator(&candidate) {
                return Err(Error::Validation(joint_failures(failure)));
            }
        }
        let touched_embedded: Vec<FieldName> = changed
            .iter()
            .filter(|name| self.def.embedded_defs().contains_key(name.as_str()))
            .cloned()
            .collect();
        for field in &touched_embedded {
            self.validate_embedded_candidate(field, candidate.get(field.as_str()))?;
        }
        if options.dry_run {
            return Ok(changed);
        }
        self.model.commit_source(candidate);
        if !touched_embedded.is_empty() {
            self.rebuild_embedded(&ValidateOptions::strict())?;
        }
        Ok(changed)
    }

    /// Re-initialize the document from foreign source data, keeping the
    /// fields listed in the type's preserve-on-import set and the identity.
    pub fn import_source(&mut self, data: &Value, options: &ValidateOptions) -> Result<()> {
        let mut incoming = match data.as_object() {
            Some(obj) => obj.clone(),
            None => {
                return Err(Error::InvalidChanges(
                    "import data must be a json object".to_string(),
                ))
            }
        };
        for name in self.def.preserve_on_import() {
            if let Some(kept) = self.model.source_value(name) {
                incoming.insert(name.clone(), kept.clone());
            }
        }
        if let Some(id) = self.id() {
            incoming.insert("_id".to_string(), json!(id));
        }
        self.model = DataModel::new(self.def.schema().clone(), &Value::Object(incoming), options)?;
        self.rebuild_embedded(options)?;
        self.validate_joint(options)?;
        Ok(())
    }

    /// A new transient document with overrides merged onto this source.
    pub fn clone_with(&self, overrides: &Value, options: &ValidateOptions) -> Result<Document> {
        let mut data = self.model.source().clone();
        if let Some(obj) = overrides.as_object() {
            for (key, value) in obj {
                data.insert(key.clone(), value.clone());
            }
        }
        Document::new(self.def.clone(), &Value::Object(data), options, None)
    }

    /// Export the document as a plain JSON object.
    pub fn to_object(&self, source_form: bool) -> Value {
        self.model.to_object(source_form)
    }

    // --- embedded collections ---

    pub fn embedded(&self, field: &str) -> Result<&EmbeddedCollection> {
        self.embedded
            .get(field)
            .ok_or_else(|| Error::UnknownEmbeddedCollection(field.to_string()))
    }

    pub fn embedded_mut(&mut self, field: &str) -> Result<&mut EmbeddedCollection> {
        self.embedded
            .get_mut(field)
            .ok_or_else(|| Error::UnknownEmbeddedCollection(field.to_string()))
    }

    pub fn embedded_collections(&self) -> impl Iterator<Item = &EmbeddedCollection> {
        self.embedded.values()
    }

    /// Children quarantined during construction.
    pub fn invalid_documents(&self) -> &[InvalidDocument] {
        &self.invalid
    }

    /// Write the live collection back into the source array it mirrors.
    pub fn commit_embedded(&mut self, field: &str) -> Result<()> {
        let collection = self
            .embedded
            .get(field)
            .ok_or_else(|| Error::UnknownEmbeddedCollection(field.to_string()))?;
        let source = Value::Array(collection.to_source());
        self.model.set_raw(field, source);
        Ok(())
    }

    /// Validate a candidate embedded array before it is committed, so a
    /// failed update leaves the source untouched.
    fn validate_embedded_candidate(&self, field: &str, value: Option<&Value>) -> Result<()> {
        let Ok(child_def) = self.def.embedded_def(field) else {
            return Ok(());
        };
        let elements = match value {
            Some(Value::Array(items)) => items,
            _ => return Ok(()),
        };
        let mut failures = ValidationFailures::new();
        for (index, element) in elements.iter().enumerate() {
            match Document::new(child_def.clone(), element, &ValidateOptions::strict(), None) {
                Ok(_) => {}
                Err(Error::Validation(child)) => {
                    let prefix = join_path(field, &index.to_string());
                    failures.extend(child.prefixed(&prefix));
                }
                Err(other) => return Err(other),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(failures))
        }
    }

    fn rebuild_embedded(&mut self, options: &ValidateOptions) -> Result<()> {
        self.embedded.clear();
        self.invalid.clear();
        let owner_id = self.id().map(str::to_string);
        let mut recorded = ValidationFailures::new();
        for (field, child_def) in self.def.embedded_defs() {
            let mut collection =
                EmbeddedCollection::new(self.def.name(), owner_id.clone(), field.clone());
            let elements = match self.model.source_value(field) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            let child_options = ValidateOptions {
                strict: true,
                fallback: options.fallback,
                drop_invalid_embedded: options.drop_invalid_embedded,
                ..ValidateOptions::default()
            };
            for (index, element) in elements.iter().enumerate() {
                let parent = collection.owner_ref();
                match Document::new(child_def.clone(), element, &child_options, parent) {
                    Ok(child) => {
                        // children without an id stay source-only until the
                        // backend issues one
                        if child.id().is_some() {
                            collection.insert(child)?;
                        }
                    }
                    Err(Error::Validation(failures)) => {
                        if options.drop_invalid_embedded {
                            self.invalid.push(InvalidDocument {
                                collection: field.clone(),
                                id: element
                                    .get("_id")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                                source: element.clone(),
                                failures,
                            });
                        } else if options.strict {
                            let prefix = join_path(field, &index.to_string());
                            return Err(Error::Validation(failures.prefixed(&prefix)));
                        } else {
                            let prefix = join_path(field, &index.to_string());
                            recorded.extend(failures.prefixed(&prefix));
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
            self.embedded.insert(field.clone(), collection);
        }
        if !recorded.is_empty() {
            let mut all = self
                .model
                .validation_failures()
                .cloned()
                .unwrap_or_default();
            all.extend(recorded);
            self.model.record_failures(all);
        }
        Ok(())
    }

    fn joint_failures(&self) -> Option<ValidationFailures> {
        let validator = self.def.joint_validator()?;
        match validator(self.model.source()) {
            Ok(()) => None,
            Err(failure) => Some(joint_failures(failure)),
        }
    }

    /// Joint rules over the source with a changeset merged on, without
    /// committing anything.
    fn joint_failures_for_changes(&self, changes: &Value) -> Option<ValidationFailures> {
        let validator = self.def.joint_validator()?;
        let mut candidate = self.model.source().clone();
        if let Some(obj) = changes.as_object() {
            for (key, value) in obj {
                if let Some(field) = self.model.schema().get(key) {
                    match field.clean(Some(value)) {
                        Some(cleaned) => {
                            candidate.insert(key.clone(), cleaned);
                        }
                        None => {
                            candidate.remove(key.as_str());
                        }
                    }
                }
            }
        }
        match validator(&candidate) {
            Ok(()) => None,
            Err(failure) => Some(joint_failures(failure)),
        }
    }

    fn validate_joint(&mut self, options: &ValidateOptions) -> Result<()> {
        if let Some(failures) = self.joint_failures() {
            if options.strict {
                return Err(Error::Validation(failures));
            }
            self.model.record_failures(failures);
        }
        Ok(())
    }

    // --- lifecycle ---

    /// Mark the document as submitted to the backend.
    pub fn mark_pending(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Transient | LifecycleState::Stored => {
                self.prior_state = self.state;
                self.state = LifecycleState::Pending;
                Ok(())
            }
            from => Err(Error::InvalidTransition {
                from,
                to: LifecycleState::Pending,
            }),
        }
    }

    /// Mark the document (and its embedded children) as acknowledged.
    pub fn mark_stored(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Stored => {}
            LifecycleState::Transient | LifecycleState::Pending => {
                self.prior_state = self.state;
                self.state = LifecycleState::Stored;
            }
            from => {
                return Err(Error::InvalidTransition {
                    from,
                    to: LifecycleState::Stored,
                })
            }
        }
        for collection in self.embedded.values_mut() {
            for child in collection.iter_mut() {
                child.mark_stored()?;
            }
        }
        Ok(())
    }

    /// Mark the deletion as acknowledged. Terminal.
    pub fn mark_deleted(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Pending | LifecycleState::Stored => {
                self.prior_state = self.state;
                self.state = LifecycleState::Deleted;
                Ok(())
            }
            from => Err(Error::InvalidTransition {
                from,
                to: LifecycleState::Deleted,
            }),
        }
    }

    /// Roll a pending document back to its pre-submission state. A no-op
    /// for documents that were never submitted.
    pub fn revert(&mut self) {
        if self.state == LifecycleState::Pending {
            self.state = self.prior_state;
        }
    }
}

fn joint_failures(failure: ValidationFailure) -> ValidationFailures {
    ValidationFailures::from(ValidationFailure {
        kind: FailureKind::Joint,
        ..failure
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{Field, FieldOptions},
        registry::DocumentTypeDef,
        schema::Schema,
    };
    use std::sync::Arc;

    fn item_def() -> Arc<DocumentTypeDef> {
        Arc::new(DocumentTypeDef::new(
            "Item",
            "items",
            Schema::new()
                .with_field("name", Field::string(FieldOptions::required()))
                .with_field(
                    "quantity",
                    Field::integer(FieldOptions::default().initial(json!(1))),
                ),
        ))
    }

    fn actor_def() -> Arc<DocumentTypeDef> {
        Arc::new(
            DocumentTypeDef::new(
                "Actor",
                "actors",
                Schema::new()
                    .with_field("name", Field::string(FieldOptions::required()))
                    .with_field(
                        "hp",
                        Field::integer(FieldOptions::default().initial(json!(10))),
                    )
                    .with_field(
                        "maxHp",
                        Field::integer(FieldOptions::default().initial(json!(10))),
                    )
                    .with_field("ownership", Field::json(FieldOptions::default()))
                    .with_field(
                        "items",
                        Field::embedded(
                            FieldOptions::default().initial(json!([])),
                            "Item",
                            item_def().schema().clone(),
                        ),
                    ),
            )
            .with_embedded("items", item_def())
            .with_joint_validator(|source| {
                let hp = source.get("hp").and_then(Value::as_i64).unwrap_or(0);
                let max = source.get("maxHp").and_then(Value::as_i64).unwrap_or(0);
                if hp > max {
                    Err(ValidationFailure::new(
                        "hp",
                        FailureKind::Joint,
                        json!(hp),
                        "hp may not exceed maxHp",
                    ))
                } else {
                    Ok(())
                }
            }),
        )
    }

    fn hero() -> Document {
        Document::new(
            actor_def(),
            &json!({
                "name": "Hero",
                "hp": 8,
                "maxHp": 10,
                "items": [
                    { "_id": "item1", "name": "Sword", "quantity": 1 },
                    { "_id": "item2", "name": "Potion", "quantity": 3 },
                ],
            }),
            &ValidateOptions::strict(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn builds_embedded_collections_from_source() {
        let doc = hero();
        let items = doc.embedded("items").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items.get("item1").unwrap().get("name"),
            Some(&json!("Sword"))
        );
    }

    #[test]
    fn id_is_immutable_once_assigned() {
        let mut doc = hero();
        assert_eq!(doc.id(), None);
        doc.set_id("actor1").unwrap();
        assert_eq!(doc.id(), Some("actor1"));
        assert_eq!(doc.set_id("actor2"), Err(Error::ImmutableId));
        // children now carry the owner reference
        let items = doc.embedded("items").unwrap();
        assert_eq!(items.get("item1").unwrap().parent().unwrap().id, "actor1");
    }

    #[test]
    fn update_rejects_id_change() {
        let mut doc = hero();
        doc.set_id("actor1").unwrap();
        let result = doc.update_source(&json!({ "_id": "other" }), &UpdateOptions::default());
        assert_eq!(result, Err(Error::ImmutableId));
        // assigning the same id is not a change
        doc.update_source(&json!({ "_id": "actor1" }), &UpdateOptions::default())
            .unwrap();
    }

    #[test]
    fn joint_validation_gates_construction_and_update() {
        let result = Document::new(
            actor_def(),
            &json!({ "name": "Hero", "hp": 20, "maxHp": 10 }),
            &ValidateOptions::strict(),
            None,
        );
        assert!(matches!(result, Err(Error::Validation(_))));

        let mut doc = hero();
        let result = doc.update_source(&json!({ "hp": 99 }), &UpdateOptions::default());
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(doc.get("hp"), Some(&json!(8)));

        // raising both together is fine
        doc.update_source(&json!({ "hp": 30, "maxHp": 30 }), &UpdateOptions::default())
            .unwrap();
    }

    #[test]
    fn subset_validation_applies_joint_rules() {
        let mut doc = hero();
        let strict = ValidateOptions {
            changes: Some(json!({ "hp": 99 })),
            ..ValidateOptions::strict()
        };
        assert!(matches!(doc.validate(&strict), Err(Error::Validation(_))));

        let lenient = ValidateOptions {
            changes: Some(json!({ "hp": 99 })),
            ..ValidateOptions::default()
        };
        assert!(!doc.validate(&lenient).unwrap());
        // nothing was committed
        assert_eq!(doc.get("hp"), Some(&json!(8)));

        let raised_together = ValidateOptions {
            changes: Some(json!({ "hp": 30, "maxHp": 30 })),
            ..ValidateOptions::strict()
        };
        assert!(doc.validate(&raised_together).unwrap());
    }

    #[test]
    fn invalid_child_fails_parent_with_prefixed_path() {
        let result = Document::new(
            actor_def(),
            &json!({
                "name": "Hero",
                "items": [{ "_id": "item1", "name": 42 }],
            }),
            &ValidateOptions::strict(),
            None,
        );
        match result {
            Err(Error::Validation(failures)) => {
                assert_eq!(failures.first().unwrap().path, "items.0.name");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_child_quarantined_when_dropping() {
        let options = ValidateOptions {
            drop_invalid_embedded: true,
            ..ValidateOptions::strict()
        };
        let doc = Document::new(
            actor_def(),
            &json!({
                "name": "Hero",
                "items": [
                    { "_id": "item1", "name": "Sword" },
                    { "_id": "item2", "name": 42 },
                ],
            }),
            &options,
            None,
        )
        .unwrap();
        assert_eq!(doc.embedded("items").unwrap().len(), 1);
        let quarantined = doc.invalid_documents();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(quarantined[0].id.as_deref(), Some("item2"));
    }

    #[test]
    fn ownership_gates_actions() {
        let doc = Document::new(
            actor_def(),
            &json!({
                "name": "Hero",
                "ownership": { "default": 2, "alice": 3 },
            }),
            &ValidateOptions::strict(),
            None,
        )
        .unwrap();
        assert!(doc.can_user("alice", Action::Update));
        assert!(!doc.can_user("bob", Action::Update));
        assert!(doc.can_user("bob", Action::View));
        let err = doc.check_permission("bob", Action::Delete).unwrap_err();
        assert!(matches!(err, Error::Permission { .. }));
    }

    #[test]
    fn missing_ownership_means_unrestricted() {
        let doc = Document::new(
            item_def(),
            &json!({ "name": "Sword" }),
            &ValidateOptions::strict(),
            None,
        )
        .unwrap();
        assert!(doc.can_user("anyone", Action::Delete));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut doc = hero();
        assert_eq!(doc.state(), LifecycleState::Transient);
        doc.mark_pending().unwrap();
        assert_eq!(doc.state(), LifecycleState::Pending);
        doc.mark_stored().unwrap();
        assert_eq!(doc.state(), LifecycleState::Stored);
        // children follow the parent into the stored state
        assert_eq!(
            doc.embedded("items").unwrap().get("item1").unwrap().state(),
            LifecycleState::Stored
        );
        doc.mark_pending().unwrap();
        doc.mark_deleted().unwrap();
        assert_eq!(
            doc.mark_pending(),
            Err(Error::InvalidTransition {
                from: LifecycleState::Deleted,
                to: LifecycleState::Pending,
            })
        );
    }

    #[test]
    fn revert_restores_prior_state() {
        let mut doc = hero();
        doc.mark_pending().unwrap();
        doc.mark_stored().unwrap();
        doc.mark_pending().unwrap();
        doc.revert();
        assert_eq!(doc.state(), LifecycleState::Stored);
        // reverting a settled document does nothing
        doc.revert();
        assert_eq!(doc.state(), LifecycleState::Stored);
    }

    #[test]
    fn commit_embedded_syncs_source_array() {
        let mut doc = hero();
        doc.set_id("actor1").unwrap();
        doc.embedded_mut("items").unwrap().take("item1").unwrap();
        doc.commit_embedded("items").unwrap();
        let source_items = doc.source().get("items").unwrap().as_array().unwrap();
        assert_eq!(source_items.len(), 1);
        assert_eq!(source_items[0]["_id"], json!("item2"));
    }

    #[test]
    fn import_source_preserves_listed_fields() {
        let def = Arc::new(
            DocumentTypeDef::new(
                "Actor",
                "actors",
                Schema::new()
                    .with_field("name", Field::string(FieldOptions::required()))
                    .with_field("ownership", Field::json(FieldOptions::default())),
            )
            .with_preserved(["ownership"]),
        );
        let mut doc = Document::new(
            def,
            &json!({ "name": "Hero", "ownership": { "default": 3 } }),
            &ValidateOptions::strict(),
            None,
        )
        .unwrap();
        doc.set_id("actor1").unwrap();
        doc.import_source(
            &json!({ "name": "Imported Hero", "ownership": { "default": 0 } }),
            &ValidateOptions::strict(),
        )
        .unwrap();
        assert_eq!(doc.get("name"), Some(&json!("Imported Hero")));
        assert_eq!(doc.get("ownership"), Some(&json!({ "default": 3 })));
        assert_eq!(doc.id(), Some("actor1"));
    }

    #[test]
    fn clone_with_yields_transient_copy() {
        let mut doc = hero();
        doc.set_id("actor1").unwrap();
        let copy = doc
            .clone_with(&json!({ "name": "Copy of Hero" }), &ValidateOptions::strict())
            .unwrap();
        assert_eq!(copy.get("name"), Some(&json!("Copy of Hero")));
        assert_eq!(copy.state(), LifecycleState::Transient);
        // the copy keeps the source id unless the caller strips it
        assert_eq!(copy.id(), Some("actor1"));
    }
}
