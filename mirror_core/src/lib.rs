//! # Mirror Core
//!
//! Document shapes for mirroring Redis structures (string, list, set, sorted
//! set, JSON, stream) into MongoDB collections.
//!
//! This crate provides:
//! - Shared [`Timestamps`] and [`KeyedFields`] embedded in every shape
//! - One document type per structure plus stream messages
//! - Per-type field tables driving the reset-to-default helpers
//! - The [`DocumentBackend`] trait the storage layer implements
//!
//! Nothing here performs I/O. Transition and reset helpers only mutate the
//! in-memory document; persisting is always a separate, explicit call.

pub mod documents;
pub mod schema;
pub mod traits;
pub mod types;

pub use documents::{
    DEFAULT_LAST_READ_ID, JsonDocument, JsonObject, ListDocument, SetDocument, StreamDocument,
    StreamMessageDocument, StringDocument, ZSetDocument,
};
pub use schema::{FieldSpec, IndexSpec, reset_fields_to_default_no_save, validate_reset_fields};
pub use traits::{DocumentBackend, KeyedDocument, StoredDocument};
pub use types::{ActivityEntry, KeyedFields, PartitionSuffix, StructureKind, Timestamps, now};

pub use bson;
