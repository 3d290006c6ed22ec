//! # Tome Engine
//!
//! Schema-driven document data modeling and validation: typed fields
//! composed into ordered schemas, schema-bound data models, identified
//! documents with a persistence lifecycle, embedded child collections,
//! ownership-level permissions, and an explicit document-type registry.
//!
//! The crate is pure and synchronous: no IO, no async, fully deterministic.
//! The asynchronous operation pipeline and persistence boundary live in the
//! companion backend crate.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use tome_engine::{
//!     DocumentRegistry, DocumentTypeDef, Field, FieldOptions, Schema, ValidateOptions,
//! };
//!
//! # fn main() -> tome_engine::Result<()> {
//! let mut registry = DocumentRegistry::new();
//! registry.register(DocumentTypeDef::new(
//!     "Actor",
//!     "actors",
//!     Schema::new()
//!         .with_field("name", Field::string(FieldOptions::required()))
//!         .with_field("hp", Field::integer(FieldOptions::default().initial(json!(10)))),
//! ));
//!
//! let doc = registry.create(
//!     "Actor",
//!     &json!({ "name": "  Hero  " }),
//!     &ValidateOptions::strict(),
//! )?;
//! assert_eq!(doc.get("name"), Some(&json!("Hero")));
//! assert_eq!(doc.get("hp"), Some(&json!(10)));
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod document;
pub mod error;
pub mod field;
pub mod hooks;
pub mod model;
pub mod ownership;
pub mod registry;
pub mod schema;
pub mod validation;

pub use collection::{EmbeddedCollection, InvalidDocument};
pub use document::{Document, LifecycleState, ParentRef};
pub use error::{Error, Result};
pub use field::{Field, FieldOptions, InitialFn, ValidateFn};
pub use hooks::{DescendantEvent, DocumentHooks, HookContext, NoHooks, OperationOptions};
pub use model::{DataModel, UpdateOptions, ValidateOptions};
pub use ownership::{Action, Ownership, OwnershipLevel};
pub use registry::{DocumentRegistry, DocumentTypeDef, JointValidator, RequiredLevels};
pub use schema::Schema;
pub use validation::{FailureKind, ValidationFailure, ValidationFailures};

/// Unique identifier of a document.
pub type DocumentId = String;

/// Tag naming a registered document type.
pub type DocumentType = String;

/// Name of a field within a schema.
pub type FieldName = String;

/// Identifier of an acting user.
pub type UserId = String;

/// Canonical collection name of a document type.
pub type CollectionName = String;

/// A JSON object, the shape of document sources and changesets.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
