//! Embedded collections: ordered containers of child documents.
//!
//! A child document lives in exactly one collection. The invariant is
//! expressed through move semantics: `insert` takes the child by value and
//! points its parent reference here; `take` moves it back out and clears the
//! reference, so re-parenting a child is always an explicit move.

use crate::{
    document::{Document, ParentRef},
    error::{Error, Result},
    validation::ValidationFailures,
    DocumentId, DocumentType, FieldName,
};
use indexmap::IndexMap;
use serde_json::Value;

/// A child whose source failed validation and was quarantined instead of
/// rejecting the parent.
#[derive(Debug, Clone)]
pub struct InvalidDocument {
    pub collection: FieldName,
    pub id: Option<DocumentId>,
    pub source: Value,
    pub failures: ValidationFailures,
}

/// An ordered, uniquely-keyed collection of child documents, reachable
/// through one embedded field of the owning document.
#[derive(Debug, Clone)]
pub struct EmbeddedCollection {
    owner_type: DocumentType,
    owner_id: Option<DocumentId>,
    collection: FieldName,
    documents: IndexMap<DocumentId, Document>,
}

impl EmbeddedCollection {
    pub fn new(
        owner_type: impl Into<DocumentType>,
        owner_id: Option<DocumentId>,
        collection: impl Into<FieldName>,
    ) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
            collection: collection.into(),
            documents: IndexMap::new(),
        }
    }

    /// The collection field name on the owner.
    pub fn collection_field(&self) -> &str {
        &self.collection
    }

    /// The parent reference children carry while they live here. `None`
    /// until the owner has an id.
    pub fn owner_ref(&self) -> Option<ParentRef> {
        self.owner_id.as_ref().map(|id| ParentRef {
            document_type: self.owner_type.clone(),
            id: id.clone(),
            collection: self.collection.clone(),
        })
    }

    /// Take ownership of a child. The child must already carry an id; its
    /// parent reference is re-pointed here. Returns a previous child that
    /// held the same id, if any.
    pub fn insert(&mut self, mut document: Document) -> Result<Option<Document>> {
        let id = document.id().ok_or(Error::MissingId)?.to_string();
        document.set_parent(self.owner_ref());
        let previous = self.documents.insert(id, document);
        Ok(previous)
    }

    /// Move a child out for re-parenting. Its parent reference is cleared
    /// and declaration order of the remaining children is preserved.
    pub fn take(&mut self, id: &str) -> Option<Document> {
        let mut document = self.documents.shift_remove(id)?;
        document.set_parent(None);
        Some(document)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The children's source objects in collection order, as stored under
    /// the owner's embedded field.
    pub fn to_source(&self) -> Vec<Value> {
        self.documents
            .values()
            .map(|doc| doc.to_object(true))
            .collect()
    }

    /// Re-key the owner id, re-pointing every child's parent reference.
    pub(crate) fn set_owner_id(&mut self, id: DocumentId) {
        self.owner_id = Some(id);
        let owner_ref = self.owner_ref();
        for document in self.documents.values_mut() {
            document.set_parent(owner_ref.clone());
        }
    }
}
