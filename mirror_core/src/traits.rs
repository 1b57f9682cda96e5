//! Core traits for mirrored documents and the stores that hold them.

use crate::schema::{FieldSpec, IndexSpec};
use crate::types::{KeyedFields, PartitionSuffix, StructureKind, Timestamps};
use async_trait::async_trait;
use bson::Document;
use bson::oid::ObjectId;
use errors::{DocumentError, StorageError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record persisted in one time-partitioned collection.
pub trait StoredDocument: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name used in error messages.
    const NAME: &'static str;
    const KIND: StructureKind;

    fn id(&self) -> Option<ObjectId>;
    fn set_id(&mut self, id: ObjectId);
    fn timestamps(&self) -> &Timestamps;
    fn timestamps_mut(&mut self) -> &mut Timestamps;
    fn indexes() -> Vec<IndexSpec>;

    fn collection_name(suffix: &PartitionSuffix) -> String {
        suffix.collection(Self::KIND)
    }

    /// Plain BSON mapping of the stored fields.
    fn to_dict(&self) -> Result<Document, DocumentError> {
        bson::to_document(self).map_err(|e| DocumentError::Serialization {
            document: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }

    /// Relaxed extended JSON rendering of [`StoredDocument::to_dict`].
    fn to_json(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(bson::Bson::Document(self.to_dict()?).into_relaxed_extjson())
    }

    fn from_dict(document: Document) -> Result<Self, DocumentError> {
        bson::from_document(document).map_err(|e| DocumentError::Serialization {
            document: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A document identified by a unique key and carrying an activity flag.
pub trait KeyedDocument: StoredDocument {
    /// Fields restorable with [`KeyedDocument::reset_fields_to_default_no_save`].
    const RESET_FIELDS: &'static [&'static str];
    /// Every persisted field and its default producer.
    const FIELDS: &'static [FieldSpec<Self>];

    fn new_keyed(key: String, active_now: bool) -> Self;
    fn keyed(&self) -> &KeyedFields;
    fn keyed_mut(&mut self) -> &mut KeyedFields;

    fn key(&self) -> &str {
        &self.keyed().key
    }

    fn active_now(&self) -> bool {
        self.keyed().active_now()
    }

    /// Flip the activity flag in memory. Returns whether it changed.
    ///
    /// Nothing is persisted; callers save afterwards.
    fn update_active_now_no_save(&mut self, active_now: bool) -> bool {
        self.keyed_mut().set_active_now(active_now)
    }

    fn reset_fields_to_default_no_save(&mut self) -> Result<(), DocumentError> {
        crate::schema::reset_fields_to_default_no_save(self)
    }

    fn keyed_indexes() -> Vec<IndexSpec> {
        vec![IndexSpec::unique(&["key"]), IndexSpec::ascending(&["active_now"])]
    }
}

/// Raw document store the typed repository persists through.
///
/// Filters are equality matches on top-level fields. Sorts are ascending or
/// descending on top-level fields.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Insert a document that already carries its `_id`.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StorageError>;

    /// Replace the document with `id`, inserting it when absent.
    async fn replace_one(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> Result<(), StorageError>;

    /// `$set` the given fields on the document with `id`. Returns the number
    /// of matched documents.
    async fn set_fields(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
    ) -> Result<u64, StorageError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StorageError>;

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, StorageError>;

    /// Delete the document with `id`. Returns the number removed.
    async fn delete_one(&self, collection: &str, id: ObjectId) -> Result<u64, StorageError>;

    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> Result<(), StorageError>;
}
