//! In-memory reference backend.
//!
//! Stores document sources in a concurrent map keyed by document type and
//! pack namespace, preserving insertion order within each store. Issues
//! 16-character identities. Embedded operations splice child arrays inside
//! the owning parent's source.

use crate::{
    boundary::PersistenceBackend,
    error::{BackendError, Result},
};
use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tome_engine::{DocumentId, JsonObject, OperationOptions, ParentRef};
use tracing::debug;
use uuid::Uuid;

type StoreKey = (String, Option<String>);

/// A transparent in-memory store implementing the persistence boundary.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    stores: DashMap<StoreKey, IndexMap<DocumentId, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents of a type in a pack namespace.
    pub fn count(&self, document_type: &str, pack: Option<&str>) -> usize {
        self.stores
            .get(&store_key(document_type, pack))
            .map(|store| store.len())
            .unwrap_or(0)
    }

    /// A stored source object, if present.
    pub fn fetch(&self, document_type: &str, pack: Option<&str>, id: &str) -> Option<Value> {
        self.stores
            .get(&store_key(document_type, pack))
            .and_then(|store| store.get(id).cloned())
    }

    fn with_parent<T>(
        &self,
        parent: &ParentRef,
        pack: Option<&str>,
        f: impl FnOnce(&mut Vec<Value>) -> Result<T>,
    ) -> Result<T> {
        let key = store_key(&parent.document_type, pack);
        let mut store = self
            .stores
            .get_mut(&key)
            .ok_or_else(|| BackendError::NotFound(parent.id.clone()))?;
        let record = store
            .get_mut(&parent.id)
            .ok_or_else(|| BackendError::NotFound(parent.id.clone()))?;
        let obj = record
            .as_object_mut()
            .ok_or_else(|| BackendError::Transport("stored parent is not an object".to_string()))?;
        let children = obj
            .entry(parent.collection.clone())
            .or_insert_with(|| json!([]));
        let array = children.as_array_mut().ok_or_else(|| {
            BackendError::Transport("embedded collection field is not an array".to_string())
        })?;
        f(array)
    }
}

/// Generate a 16-character document id.
pub fn generate_id() -> DocumentId {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

fn store_key(document_type: &str, pack: Option<&str>) -> StoreKey {
    (document_type.to_string(), pack.map(str::to_string))
}

fn value_id(value: &Value) -> Option<&str> {
    value.get("_id").and_then(Value::as_str).filter(|id| !id.is_empty())
}

fn matches_query(value: &Value, query: &JsonObject) -> bool {
    query.iter().all(|(key, expected)| value.get(key) == Some(expected))
}

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

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn get(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        query: &JsonObject,
        options: &OperationOptions,
    ) -> Result<Vec<Value>> {
        let pack = options.pack.as_deref();
        if let Some(parent) = parent {
            return self.with_parent(parent, pack, |children| {
                Ok(children
                    .iter()
                    .filter(|child| matches_query(child, query))
                    .cloned()
                    .collect())
            });
        }
        let results = self
            .stores
            .get(&store_key(document_type, pack))
            .map(|store| {
                store
                    .values()
                    .filter(|value| matches_query(value, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }

    async fn create(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        payloads: Vec<Value>,
        options: &OperationOptions,
    ) -> Result<Vec<Value>> {
        let pack = options.pack.as_deref();
        debug!(document_type, count = payloads.len(), "memory create");
        if let Some(parent) = parent {
            return self.with_parent(parent, pack, |children| {
                let mut stored = Vec::with_capacity(payloads.len());
                for mut payload in payloads {
                    let id = match value_id(&payload) {
                        Some(id) => id.to_string(),
                        None => {
                            let id = generate_id();
                            if let Some(obj) = payload.as_object_mut() {
                                obj.insert("_id".to_string(), json!(id));
                            }
                            id
                        }
                    };
                    if children.iter().any(|c| value_id(c) == Some(id.as_str())) {
                        return Err(BackendError::AlreadyExists(id));
                    }
                    children.push(payload.clone());
                    stored.push(payload);
                }
                Ok(stored)
            });
        }

        let mut store = self
            .stores
            .entry(store_key(document_type, pack))
            .or_default();
        let mut stored = Vec::with_capacity(payloads.len());
        for mut payload in payloads {
            let id = match value_id(&payload) {
                Some(id) => id.to_string(),
                None => {
                    let id = generate_id();
                    if let Some(obj) = payload.as_object_mut() {
                        obj.insert("_id".to_string(), json!(id));
                    }
                    id
                }
            };
            if store.contains_key(&id) {
                return Err(BackendError::AlreadyExists(id));
            }
            store.insert(id, payload.clone());
            stored.push(payload);
        }
        Ok(stored)
    }

    async fn update(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        diffs: Vec<Value>,
        options: &OperationOptions,
    ) -> Result<Vec<Value>> {
        let pack = options.pack.as_deref();
        let diff_only = options.diff;
        debug!(document_type, count = diffs.len(), "memory update");
        if let Some(parent) = parent {
            return self.with_parent(parent, pack, |children| {
                let mut updated = Vec::with_capacity(diffs.len());
                for diff in diffs {
                    let id = value_id(&diff)
                        .map(str::to_string)
                        .ok_or_else(|| BackendError::BadRequest("diff without _id".to_string()))?;
                    let child = children
                        .iter_mut()
                        .find(|c| value_id(c) == Some(id.as_str()))
                        .ok_or(BackendError::NotFound(id))?;
                    apply_update(child, &diff);
                    updated.push(update_response(child, &diff, diff_only));
                }
                Ok(updated)
            });
        }

        let mut store = self
            .stores
            .get_mut(&store_key(document_type, pack))
            .ok_or_else(|| BackendError::NotFound(document_type.to_string()))?;
        let mut updated = Vec::with_capacity(diffs.len());
        for diff in diffs {
            let id = value_id(&diff)
                .map(str::to_string)
                .ok_or_else(|| BackendError::BadRequest("diff without _id".to_string()))?;
            let record = store
                .get_mut(&id)
                .ok_or(BackendError::NotFound(id))?;
            apply_update(record, &diff);
            updated.push(update_response(record, &diff, diff_only));
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        document_type: &str,
        parent: Option<&ParentRef>,
        ids: Vec<DocumentId>,
        options: &OperationOptions,
    ) -> Result<Vec<DocumentId>> {
        let pack = options.pack.as_deref();
        debug!(document_type, count = ids.len(), "memory delete");
        if let Some(parent) = parent {
            return self.with_parent(parent, pack, |children| {
                for id in &ids {
                    if !children.iter().any(|c| value_id(c) == Some(id.as_str())) {
                        return Err(BackendError::NotFound(id.clone()));
                    }
                }
                children.retain(|c| match value_id(c) {
                    Some(id) => !ids.iter().any(|d| d == id),
                    None => true,
                });
                Ok(ids)
            });
        }

        let mut store = self
            .stores
            .get_mut(&store_key(document_type, pack))
            .ok_or_else(|| BackendError::NotFound(document_type.to_string()))?;
        for id in &ids {
            if !store.contains_key(id) {
                return Err(BackendError::NotFound(id.clone()));
            }
        }
        for id in &ids {
            store.shift_remove(id);
        }
        Ok(ids)
    }
}

/// Merge a differential payload into a stored record, keeping its identity.
fn apply_update(record: &mut Value, diff: &Value) {
    let id = value_id(record).map(str::to_string);
    merge_recursive(record, diff);
    if let (Some(id), Some(obj)) = (id, record.as_object_mut()) {
        obj.insert("_id".to_string(), json!(id));
    }
}

/// The post-update response: only the applied keys plus `_id` when `diff`
/// is requested, the full record otherwise.
fn update_response(record: &Value, diff: &Value, diff_only: bool) -> Value {
    if !diff_only {
        return record.clone();
    }
    let mut response = JsonObject::new();
    if let (Some(record), Some(diff)) = (record.as_object(), diff.as_object()) {
        for key in diff.keys() {
            if let Some(value) = record.get(key) {
                response.insert(key.clone(), value.clone());
            }
        }
    }
    if let Some(id) = value_id(record) {
        response.insert("_id".to_string(), json!(id));
    }
    Value::Object(response)
}
