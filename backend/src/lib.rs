//! # Tome Backend
//!
//! The asynchronous half of the Tome document engine: the operation
//! pipeline that sequences CRUD batches, the `PersistenceBackend` trait
//! forming the storage boundary, an in-memory reference backend, and
//! pipeline configuration.

pub mod boundary;
pub mod config;
pub mod error;
pub mod memory;
pub mod pipeline;

pub use boundary::PersistenceBackend;
pub use config::{ConfigError, PipelineConfig};
pub use error::{BackendError, Result};
pub use memory::MemoryBackend;
pub use pipeline::{DocumentPipeline, OperationContext};
