//! The document operation pipeline.
//!
//! Sequences every CRUD operation the same way: permission gate, batch
//! validation of every element before anything is dispatched, pre-hooks
//! (which may veto single elements), one backend round trip per batch, then
//! commits, lifecycle transitions, and post-hooks in stable array order.
//! A transport failure reverts every touched document; no partial mutation
//! survives.

use crate::{
    boundary::PersistenceBackend,
    config::PipelineConfig,
    error::{BackendError, Result},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tome_engine::{
    Action, DescendantEvent, Document, DocumentId, DocumentRegistry, FieldName, HookContext,
    JsonObject, OperationOptions, ParentRef, UpdateOptions, UserId, ValidateOptions,
};
use tracing::{error, info, warn};

/// The acting user and options for one pipeline call.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub user: UserId,
    pub options: OperationOptions,
}

impl OperationContext {
    pub fn new(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            options: OperationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OperationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Drives document CRUD against a persistence backend.
pub struct DocumentPipeline {
    registry: Arc<DocumentRegistry>,
    backend: Arc<dyn PersistenceBackend>,
    config: PipelineConfig,
}

impl DocumentPipeline {
    pub fn new(
        registry: Arc<DocumentRegistry>,
        backend: Arc<dyn PersistenceBackend>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<DocumentRegistry> {
        &self.registry
    }

    fn effective_options(&self, ctx: &OperationContext) -> OperationOptions {
        let mut options = ctx.options.clone();
        if options.pack.is_none() {
            options.pack = self.config.default_pack.clone();
        }
        options
    }

    fn hook_context(&self, ctx: &OperationContext, options: &OperationOptions) -> HookContext {
        HookContext {
            user: ctx.user.clone(),
            options: options.clone(),
        }
    }

    fn validate_options(&self) -> ValidateOptions {
        ValidateOptions {
            strict: self.config.strict_validation,
            fallback: !self.config.strict_validation,
            drop_invalid_embedded: self.config.drop_invalid_embedded,
            ..ValidateOptions::default()
        }
    }

    /// Persisted data is repaired rather than rejected.
    fn hydrate_options(&self) -> ValidateOptions {
        ValidateOptions {
            strict: false,
            fallback: true,
            drop_invalid_embedded: self.config.drop_invalid_embedded,
            ..ValidateOptions::default()
        }
    }

    fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            fallback: !self.config.strict_validation,
            ..UpdateOptions::default()
        }
    }

    /// Fetch and hydrate the documents of a type matching a query.
    pub async fn get_documents(
        &self,
        document_type: &str,
        query: &JsonObject,
        ctx: &OperationContext,
    ) -> Result<Vec<Document>> {
        let def = self.registry.get(document_type)?.clone();
        let options = self.effective_options(ctx);
        let raw = self
            .backend
            .get(document_type, None, query, &options)
            .await?;
        let mut documents = Vec::with_capacity(raw.len());
        for value in raw {
            let mut document = Document::new(def.clone(), &value, &self.hydrate_options(), None)?;
            document.mark_stored()?;
            documents.push(document);
        }
        info!(document_type, count = documents.len(), "fetched documents");
        Ok(documents)
    }

    /// Create a batch of documents.
    ///
    /// Every payload is validated before any element is dispatched. Vetoed
    /// elements drop out of the batch without failing the rest.
    pub async fn create_documents(
        &self,
        document_type: &str,
        payloads: Vec<Value>,
        ctx: &OperationContext,
    ) -> Result<Vec<Document>> {
        let def = self.registry.get(document_type)?.clone();
        let options = self.effective_options(ctx);
        let hook_ctx = self.hook_context(ctx, &options);

        let mut documents = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            documents.push(Document::new(
                def.clone(),
                payload,
                &self.validate_options(),
                None,
            )?);
        }

        if !options.no_hook {
            documents.retain_mut(|document| {
                let hooks = document.hooks().clone();
                let keep = hooks.pre_create(document, &hook_ctx);
                if !keep {
                    warn!(document_type, "creation vetoed by pre-hook");
                }
                keep
            });
        }
        if documents.is_empty() {
            return Ok(documents);
        }

        for document in &mut documents {
            document.mark_pending()?;
        }
        let sources: Vec<Value> = documents.iter().map(|d| d.to_object(true)).collect();
        let stored = match self
            .backend
            .create(document_type, None, sources, &options)
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                for document in &mut documents {
                    document.revert();
                }
                error!(document_type, error = %err, "create dispatch failed");
                return Err(err);
            }
        };

        if let Err(err) = confirm_created(&mut documents, &stored) {
            for document in &mut documents {
                document.revert();
            }
            return Err(err);
        }
        if !options.no_hook {
            for document in &documents {
                document.hooks().post_create(document, &hook_ctx);
            }
        }
        info!(document_type, count = documents.len(), "created documents");
        Ok(documents)
    }

    /// Update a batch of stored documents with one diff per document.
    ///
    /// Every diff is validated against its document before any element is
    /// dispatched. Returns the effectively-changed field names per document,
    /// aligned with the input; a vetoed element reports no changes.
    pub async fn update_documents(
        &self,
        documents: &mut [Document],
        diffs: Vec<Value>,
        ctx: &OperationContext,
    ) -> Result<Vec<Vec<FieldName>>> {
        if documents.len() != diffs.len() {
            return Err(BackendError::BadRequest(
                "one diff per document is required".to_string(),
            ));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let document_type = documents[0].document_type().to_string();
        single_type(documents, &document_type)?;

        let options = self.effective_options(ctx);
        let hook_ctx = self.hook_context(ctx, &options);
        let update_options = self.update_options();
        let dry_run = UpdateOptions {
            dry_run: true,
            ..update_options.clone()
        };

        // validate every diff (and permission) before anything is dispatched
        let mut pending: Vec<(usize, JsonObject)> = Vec::with_capacity(diffs.len());
        for (index, diff) in diffs.into_iter().enumerate() {
            let document = &mut documents[index];
            if document.id().is_none() {
                return Err(tome_engine::Error::MissingId.into());
            }
            document.check_permission(&ctx.user, Action::Update)?;
            let changes = diff.as_object().cloned().ok_or_else(|| {
                BackendError::BadRequest("diff must be a json object".to_string())
            })?;
            document.update_source(&Value::Object(changes.clone()), &dry_run)?;
            pending.push((index, changes));
        }

        if !options.no_hook {
            let mut kept = Vec::with_capacity(pending.len());
            for (index, mut changes) in pending {
                let document = &mut documents[index];
                let hooks = document.hooks().clone();
                if !hooks.pre_update(document, &mut changes, &hook_ctx) {
                    warn!(document_type = %document_type, "update vetoed by pre-hook");
                    continue;
                }
                // a rewritten diff must still validate
                document.update_source(&Value::Object(changes.clone()), &dry_run)?;
                kept.push((index, changes));
            }
            pending = kept;
        }

        let mut results: Vec<Vec<FieldName>> = vec![Vec::new(); documents.len()];
        if pending.is_empty() {
            return Ok(results);
        }

        let mut payloads = Vec::with_capacity(pending.len());
        for (index, changes) in &pending {
            let document = &mut documents[*index];
            let id = match document.id() {
                Some(id) => id.to_string(),
                None => return Err(tome_engine::Error::MissingId.into()),
            };
            let mut payload = changes.clone();
            payload.insert("_id".to_string(), json!(id));
            payloads.push(Value::Object(payload));
            document.mark_pending()?;
        }

        if let Err(err) = self
            .backend
            .update(&document_type, None, payloads, &options)
            .await
        {
            for (index, _) in &pending {
                documents[*index].revert();
            }
            error!(document_type = %document_type, error = %err, "update dispatch failed");
            return Err(err);
        }

        for (index, changes) in pending {
            let document = &mut documents[index];
            let changed = document.update_source(&Value::Object(changes), &update_options)?;
            document.mark_stored()?;
            if !options.no_hook {
                let diff = effective_diff(document, &changed);
                document.hooks().post_update(document, &diff, &hook_ctx);
            }
            results[index] = changed;
        }
        info!(document_type = %document_type, count = results.len(), "updated documents");
        Ok(results)
    }

    /// Delete a batch of stored documents.
    ///
    /// Cascades through embedded collections: every descendant runs its own
    /// delete lifecycle and hooks before the parent's deletion is confirmed.
    /// Returns the ids whose deletion the backend acknowledged.
    pub async fn delete_documents(
        &self,
        documents: &mut [Document],
        ctx: &OperationContext,
    ) -> Result<Vec<DocumentId>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let document_type = documents[0].document_type().to_string();
        single_type(documents, &document_type)?;

        let options = self.effective_options(ctx);
        let hook_ctx = self.hook_context(ctx, &options);

        let mut selected: Vec<usize> = Vec::with_capacity(documents.len());
        let mut ids: Vec<DocumentId> = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let id = match document.id() {
                Some(id) => id.to_string(),
                None => return Err(tome_engine::Error::MissingId.into()),
            };
            document.check_permission(&ctx.user, Action::Delete)?;
            if !options.no_hook && !document.hooks().pre_delete(document, &hook_ctx) {
                warn!(document_type = %document_type, id = %id, "deletion vetoed by pre-hook");
                continue;
            }
            selected.push(index);
            ids.push(id);
        }
        if selected.is_empty() {
            return Ok(ids);
        }

        for index in &selected {
            documents[*index].mark_pending()?;
        }
        if let Err(err) = self
            .backend
            .delete(&document_type, None, ids.clone(), &options)
            .await
        {
            for index in &selected {
                documents[*index].revert();
            }
            error!(document_type = %document_type, error = %err, "delete dispatch failed");
            return Err(err);
        }

        for index in selected {
            let document = &mut documents[index];
            let events = cascade_delete(document, &options, &hook_ctx)?;
            document.mark_deleted()?;
            if !options.no_hook {
                for event in &events {
                    document.hooks().descendant_event(document, event, &hook_ctx);
                }
                document.hooks().post_delete(document, &hook_ctx);
            }
        }
        info!(document_type = %document_type, count = ids.len(), "deleted documents");
        Ok(ids)
    }

    /// Create embedded children under a stored parent document.
    ///
    /// Permission is the parent's update gate. Confirmed children join the
    /// parent's live collection, the source array is re-synced, and a single
    /// created event is delivered to the parent per call.
    pub async fn create_embedded(
        &self,
        parent: &mut Document,
        field: &str,
        payloads: Vec<Value>,
        ctx: &OperationContext,
    ) -> Result<Vec<DocumentId>> {
        let parent_ref = parent_ref(parent, field)?;
        parent.check_permission(&ctx.user, Action::Update)?;
        let child_def = parent.definition().embedded_def(field)?.clone();
        let options = self.effective_options(ctx);
        let hook_ctx = self.hook_context(ctx, &options);

        let mut children = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            children.push(Document::new(
                child_def.clone(),
                payload,
                &self.validate_options(),
                Some(parent_ref.clone()),
            )?);
        }
        if !options.no_hook {
            children.retain_mut(|child| {
                let hooks = child.hooks().clone();
                let keep = hooks.pre_create(child, &hook_ctx);
                if !keep {
                    warn!(
                        document_type = child_def.name(),
                        "embedded creation vetoed by pre-hook"
                    );
                }
                keep
            });
        }
        if children.is_empty() {
            return Ok(Vec::new());
        }

        for child in &mut children {
            child.mark_pending()?;
        }
        let sources: Vec<Value> = children.iter().map(|c| c.to_object(true)).collect();
        let stored = match self
            .backend
            .create(child_def.name(), Some(&parent_ref), sources, &options)
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                for child in &mut children {
                    child.revert();
                }
                error!(
                    document_type = child_def.name(),
                    error = %err,
                    "embedded create dispatch failed"
                );
                return Err(err);
            }
        };
        if let Err(err) = confirm_created(&mut children, &stored) {
            for child in &mut children {
                child.revert();
            }
            return Err(err);
        }

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let id = match child.id() {
                Some(id) => id.to_string(),
                None => return Err(BackendError::Transport(
                    "backend confirmed a child without an id".to_string(),
                )),
            };
            parent.embedded_mut(field)?.insert(child)?;
            ids.push(id);
        }
        parent.commit_embedded(field)?;

        if !options.no_hook {
            let collection = parent.embedded(field)?;
            for id in &ids {
                if let Some(child) = collection.get(id) {
                    child.hooks().post_create(child, &hook_ctx);
                }
            }
            let event = DescendantEvent::Created {
                collection: field.to_string(),
                ids: ids.clone(),
            };
            parent.hooks().descendant_event(parent, &event, &hook_ctx);
        }
        info!(
            document_type = child_def.name(),
            count = ids.len(),
            "created embedded documents"
        );
        Ok(ids)
    }

    /// Update embedded children of a stored parent. Each diff carries the
    /// `_id` of its target child.
    pub async fn update_embedded(
        &self,
        parent: &mut Document,
        field: &str,
        diffs: Vec<Value>,
        ctx: &OperationContext,
    ) -> Result<Vec<DocumentId>> {
        let parent_ref = parent_ref(parent, field)?;
        parent.check_permission(&ctx.user, Action::Update)?;
        let child_def = parent.definition().embedded_def(field)?.clone();
        let options = self.effective_options(ctx);
        let hook_ctx = self.hook_context(ctx, &options);
        let update_options = self.update_options();
        let dry_run = UpdateOptions {
            dry_run: true,
            ..update_options.clone()
        };

        // validate every diff against its child before dispatch
        let mut pending: Vec<(DocumentId, JsonObject)> = Vec::with_capacity(diffs.len());
        for diff in diffs {
            let changes = diff.as_object().cloned().ok_or_else(|| {
                BackendError::BadRequest("diff must be a json object".to_string())
            })?;
            let id = changes
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    BackendError::BadRequest("embedded diff requires an _id".to_string())
                })?;
            let child = parent
                .embedded_mut(field)?
                .get_mut(&id)
                .ok_or_else(|| BackendError::NotFound(id.clone()))?;
            child.update_source(&Value::Object(changes.clone()), &dry_run)?;
            pending.push((id, changes));
        }

        if !options.no_hook {
            let mut kept = Vec::with_capacity(pending.len());
            for (id, mut changes) in pending {
                let child = match parent.embedded_mut(field)?.get_mut(&id) {
                    Some(child) => child,
                    None => continue,
                };
                let hooks = child.hooks().clone();
                if !hooks.pre_update(child, &mut changes, &hook_ctx) {
                    warn!(document_type = child_def.name(), id = %id, "embedded update vetoed");
                    continue;
                }
                child.update_source(&Value::Object(changes.clone()), &dry_run)?;
                kept.push((id, changes));
            }
            pending = kept;
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut payloads = Vec::with_capacity(pending.len());
        for (id, changes) in &pending {
            let mut payload = changes.clone();
            payload.insert("_id".to_string(), json!(id));
            payloads.push(Value::Object(payload));
            if let Some(child) = parent.embedded_mut(field)?.get_mut(id) {
                child.mark_pending()?;
            }
        }

        if let Err(err) = self
            .backend
            .update(child_def.name(), Some(&parent_ref), payloads, &options)
            .await
        {
            for (id, _) in &pending {
                if let Some(child) = parent.embedded_mut(field)?.get_mut(id) {
                    child.revert();
                }
            }
            error!(
                document_type = child_def.name(),
                error = %err,
                "embedded update dispatch failed"
            );
            return Err(err);
        }

        let mut ids = Vec::with_capacity(pending.len());
        for (id, changes) in pending {
            let child = parent
                .embedded_mut(field)?
                .get_mut(&id)
                .ok_or_else(|| BackendError::NotFound(id.clone()))?;
            let changed = child.update_source(&Value::Object(changes), &update_options)?;
            child.mark_stored()?;
            if !options.no_hook {
                let diff = effective_diff(child, &changed);
                child.hooks().post_update(child, &diff, &hook_ctx);
            }
            ids.push(id);
        }
        parent.commit_embedded(field)?;

        if !options.no_hook {
            let event = DescendantEvent::Updated {
                collection: field.to_string(),
                ids: ids.clone(),
            };
            parent.hooks().descendant_event(parent, &event, &hook_ctx);
        }
        info!(
            document_type = child_def.name(),
            count = ids.len(),
            "updated embedded documents"
        );
        Ok(ids)
    }

    /// Delete embedded children of a stored parent by id.
    pub async fn delete_embedded(
        &self,
        parent: &mut Document,
        field: &str,
        ids: Vec<DocumentId>,
        ctx: &OperationContext,
    ) -> Result<Vec<DocumentId>> {
        let parent_ref = parent_ref(parent, field)?;
        parent.check_permission(&ctx.user, Action::Update)?;
        let child_def = parent.definition().embedded_def(field)?.clone();
        let options = self.effective_options(ctx);
        let hook_ctx = self.hook_context(ctx, &options);

        let mut selected: Vec<DocumentId> = Vec::with_capacity(ids.len());
        for id in ids {
            let collection = parent.embedded(field)?;
            let child = collection
                .get(&id)
                .ok_or_else(|| BackendError::NotFound(id.clone()))?;
            if !options.no_hook && !child.hooks().pre_delete(child, &hook_ctx) {
                warn!(document_type = child_def.name(), id = %id, "embedded deletion vetoed");
                continue;
            }
            selected.push(id);
        }
        if selected.is_empty() {
            return Ok(selected);
        }

        for id in &selected {
            if let Some(child) = parent.embedded_mut(field)?.get_mut(id) {
                child.mark_pending()?;
            }
        }
        if let Err(err) = self
            .backend
            .delete(child_def.name(), Some(&parent_ref), selected.clone(), &options)
            .await
        {
            for id in &selected {
                if let Some(child) = parent.embedded_mut(field)?.get_mut(id) {
                    child.revert();
                }
            }
            error!(
                document_type = child_def.name(),
                error = %err,
                "embedded delete dispatch failed"
            );
            return Err(err);
        }

        for id in &selected {
            if let Some(mut child) = parent.embedded_mut(field)?.take(id) {
                child.mark_deleted()?;
                if !options.no_hook {
                    child.hooks().post_delete(&child, &hook_ctx);
                }
            }
        }
        parent.commit_embedded(field)?;

        if !options.no_hook {
            let event = DescendantEvent::Deleted {
                collection: field.to_string(),
                ids: selected.clone(),
            };
            parent.hooks().descendant_event(parent, &event, &hook_ctx);
        }
        info!(
            document_type = child_def.name(),
            count = selected.len(),
            "deleted embedded documents"
        );
        Ok(selected)
    }

    /// Duplicate a document: a create round trip on its source with the
    /// identity stripped and the overrides merged on top.
    pub async fn clone_document(
        &self,
        document: &Document,
        overrides: &Value,
        ctx: &OperationContext,
    ) -> Result<Document> {
        let mut data = match document.to_object(true) {
            Value::Object(obj) => obj,
            _ => JsonObject::new(),
        };
        data.remove("_id");
        if let Some(obj) = overrides.as_object() {
            for (key, value) in obj {
                data.insert(key.clone(), value.clone());
            }
        }
        let mut created = self
            .create_documents(document.document_type(), vec![Value::Object(data)], ctx)
            .await?;
        created
            .pop()
            .ok_or_else(|| BackendError::Transport("clone produced no document".to_string()))
    }
}

/// Assign backend-issued ids and settle the batch into the stored state.
fn confirm_created(documents: &mut [Document], stored: &[Value]) -> Result<()> {
    if stored.len() != documents.len() {
        return Err(BackendError::Transport(
            "backend confirmed a different number of documents".to_string(),
        ));
    }
    for (document, value) in documents.iter_mut().zip(stored) {
        if document.id().is_none() {
            let id = value
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    BackendError::Transport("backend returned a document without an id".to_string())
                })?;
            document.set_id(id)?;
        }
        document.mark_stored()?;
    }
    Ok(())
}

/// Run the delete lifecycle of every embedded descendant, returning the
/// deleted event per non-empty collection.
fn cascade_delete(
    document: &mut Document,
    options: &OperationOptions,
    hook_ctx: &HookContext,
) -> Result<Vec<DescendantEvent>> {
    let fields: Vec<FieldName> = document
        .embedded_collections()
        .map(|c| c.collection_field().to_string())
        .collect();
    let mut events = Vec::new();
    for field in fields {
        let collection = document.embedded_mut(&field)?;
        let child_ids: Vec<DocumentId> = collection.ids().cloned().collect();
        if child_ids.is_empty() {
            continue;
        }
        for id in &child_ids {
            if let Some(child) = collection.get_mut(id) {
                child.mark_pending()?;
                child.mark_deleted()?;
            }
        }
        if !options.no_hook {
            let collection = document.embedded(&field)?;
            for id in &child_ids {
                if let Some(child) = collection.get(id) {
                    child.hooks().post_delete(child, hook_ctx);
                }
            }
        }
        events.push(DescendantEvent::Deleted {
            collection: field,
            ids: child_ids,
        });
    }
    Ok(events)
}

/// The effective post-update diff: the changed fields with their new source
/// values.
fn effective_diff(document: &Document, changed: &[FieldName]) -> JsonObject {
    let mut diff = JsonObject::new();
    for name in changed {
        if let Some(value) = document.source().get(name) {
            diff.insert(name.clone(), value.clone());
        }
    }
    diff
}

fn parent_ref(parent: &Document, field: &str) -> Result<ParentRef> {
    let id = parent
        .id()
        .ok_or(tome_engine::Error::MissingId)?
        .to_string();
    Ok(ParentRef {
        document_type: parent.document_type().to_string(),
        id,
        collection: field.to_string(),
    })
}

fn single_type(documents: &[Document], document_type: &str) -> Result<()> {
    for document in documents {
        if document.document_type() != document_type {
            return Err(BackendError::BadRequest(
                "batch must contain a single document type".to_string(),
            ));
        }
    }
    Ok(())
}
