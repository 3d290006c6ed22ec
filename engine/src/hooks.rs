//! Lifecycle hooks and descendant events.
//!
//! Document types participate in the operation lifecycle through the
//! `DocumentHooks` capability trait rather than inheritance: pre-hooks may
//! veto or rewrite a pending operation, post-hooks observe confirmed data,
//! and changes inside embedded collections reach the owner as typed
//! `DescendantEvent` messages.

use crate::{document::Document, DocumentId, FieldName, JsonObject, UserId};
use serde::Serialize;

/// Per-operation interface options, threaded through every pipeline call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOptions {
    /// Skip pre and post hooks entirely
    pub no_hook: bool,
    /// Ask the backend to return only the changed keys from an update
    pub diff: bool,
    /// Rendering hint, passed through opaquely
    pub render: bool,
    /// Compendium pack namespace to address, when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            no_hook: false,
            diff: true,
            render: true,
            pack: None,
        }
    }
}

/// The acting user and options for one operation.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub user: UserId,
    pub options: OperationOptions,
}

impl HookContext {
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

/// A confirmed change inside one embedded collection of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DescendantEvent {
    Created {
        collection: FieldName,
        ids: Vec<DocumentId>,
    },
    Updated {
        collection: FieldName,
        ids: Vec<DocumentId>,
    },
    Deleted {
        collection: FieldName,
        ids: Vec<DocumentId>,
    },
}

impl DescendantEvent {
    pub fn collection(&self) -> &str {
        match self {
            DescendantEvent::Created { collection, .. }
            | DescendantEvent::Updated { collection, .. }
            | DescendantEvent::Deleted { collection, .. } => collection,
        }
    }

    pub fn ids(&self) -> &[DocumentId] {
        match self {
            DescendantEvent::Created { ids, .. }
            | DescendantEvent::Updated { ids, .. }
            | DescendantEvent::Deleted { ids, .. } => ids,
        }
    }
}

/// Lifecycle participation for a document type. Every method is a no-op by
/// default; implementors override the points they care about.
pub trait DocumentHooks: Send + Sync {
    /// Runs before a document is submitted for creation. Returning `false`
    /// drops this document from the batch without failing the others.
    fn pre_create(&self, _document: &mut Document, _ctx: &HookContext) -> bool {
        true
    }

    /// Observes a document whose creation the backend confirmed.
    fn post_create(&self, _document: &Document, _ctx: &HookContext) {}

    /// Runs before an update is dispatched. The pending diff may be
    /// rewritten in place. Returning `false` vetoes this document's update.
    fn pre_update(&self, _document: &Document, _changes: &mut JsonObject, _ctx: &HookContext) -> bool {
        true
    }

    /// Observes a confirmed update together with the effective diff.
    fn post_update(&self, _document: &Document, _changes: &JsonObject, _ctx: &HookContext) {}

    /// Runs before a deletion is dispatched. Returning `false` vetoes it.
    fn pre_delete(&self, _document: &Document, _ctx: &HookContext) -> bool {
        true
    }

    /// Observes a confirmed deletion.
    fn post_delete(&self, _document: &Document, _ctx: &HookContext) {}

    /// Receives confirmed changes inside one of the document's embedded
    /// collections, once per affected collection.
    fn descendant_event(&self, _document: &Document, _event: &DescendantEvent, _ctx: &HookContext) {
    }
}

/// The default hook handler: participates in nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl DocumentHooks for NoHooks {}
