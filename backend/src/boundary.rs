//! The persistence boundary.
//!
//! Everything durable happens behind `PersistenceBackend`: the pipeline
//! validates and sequences operations, the backend owns storage and identity
//! issuance. Every method carries the document type tag, an optional parent
//! reference for embedded operations, a payload array, and the per-operation
//! options bag.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use tome_engine::{DocumentId, JsonObject, OperationOptions, ParentRef};

/// Asynchronous storage contract for document operations.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Fetch the source objects matching a query. The query matches on
    /// top-level source keys; an empty query matches everything.
    async fn get(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        query: &JsonObject,
        options: &OperationOptions,
    ) -> Result<Vec<Value>>;

    /// Persist new documents. The backend assigns identities to payloads
    /// without one and returns the stored source objects in payload order.
    async fn create(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        payloads: Vec<Value>,
        options: &OperationOptions,
    ) -> Result<Vec<Value>>;

    /// Apply differential payloads, each carrying the `_id` of its target.
    /// Returns the post-update source objects in payload order.
    async fn update(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        diffs: Vec<Value>,
        options: &OperationOptions,
    ) -> Result<Vec<Value>>;

    /// Delete documents by id. Returns the acknowledged ids in input order.
    async fn delete(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        ids: Vec<DocumentId>,
        options: &OperationOptions,
    ) -> Result<Vec<DocumentId>>;
}
