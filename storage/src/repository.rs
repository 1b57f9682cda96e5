//! Typed persistence for mirrored documents.
//!
//! [`Repository`] maps each document type to its time-partitioned collection
//! and handles the timestamp bookkeeping on writes. It never retries and never
//! persists on its own: in-memory helpers such as
//! [`KeyedDocument::update_active_now_no_save`] take effect only once the
//! caller passes the document to [`Repository::save`].

use errors::{DocumentError, StorageError};
use mirror_core::bson::oid::ObjectId;
use mirror_core::bson::{self, Document, doc};
use mirror_core::{
    DocumentBackend, JsonDocument, KeyedDocument, ListDocument, PartitionSuffix, SetDocument,
    StoredDocument, StreamDocument, StreamMessageDocument, StringDocument, ZSetDocument,
};
use tracing::debug;

pub struct Repository<B> {
    backend: B,
    suffix: PartitionSuffix,
}

impl<B: DocumentBackend> Repository<B> {
    /// Repository writing to the default partition.
    pub fn new(backend: B) -> Self {
        Self::with_suffix(backend, PartitionSuffix::default())
    }

    pub fn with_suffix(backend: B, suffix: PartitionSuffix) -> Self {
        Self { backend, suffix }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn suffix(&self) -> &PartitionSuffix {
        &self.suffix
    }

    pub fn collection<D: StoredDocument>(&self) -> String {
        D::collection_name(&self.suffix)
    }

    pub async fn ensure_indexes<D: StoredDocument>(&self) -> Result<(), StorageError> {
        self.backend
            .create_indexes(&self.collection::<D>(), &D::indexes())
            .await
    }

    /// Declare the indexes of every mirrored collection.
    pub async fn ensure_all_indexes(&self) -> Result<(), StorageError> {
        self.ensure_indexes::<JsonDocument>().await?;
        self.ensure_indexes::<StringDocument>().await?;
        self.ensure_indexes::<ListDocument>().await?;
        self.ensure_indexes::<ZSetDocument>().await?;
        self.ensure_indexes::<SetDocument>().await?;
        self.ensure_indexes::<StreamDocument>().await?;
        self.ensure_indexes::<StreamMessageDocument>().await
    }

    /// Persist the whole document and return its `_id`.
    ///
    /// `updated_at` is refreshed first. A document without an `_id` is
    /// inserted and receives one only if the insert succeeds; otherwise the
    /// stored copy is replaced.
    pub async fn save<D: StoredDocument>(&self, doc: &mut D) -> Result<ObjectId, StorageError> {
        let collection = self.collection::<D>();
        doc.timestamps_mut().touch();
        let mut document = doc.to_dict()?;

        let id = match doc.id() {
            Some(id) => {
                self.backend.replace_one(&collection, id, document).await?;
                id
            }
            None => {
                let id = ObjectId::new();
                document.insert("_id", id);
                self.backend.insert_one(&collection, document).await?;
                doc.set_id(id);
                id
            }
        };

        debug!(collection = %collection, id = %id, "saved document");
        Ok(id)
    }

    /// Apply `changes` with `$set` to the stored copy of `doc`.
    ///
    /// `updated_at` is refreshed on `doc` and written with the changes. The
    /// in-memory fields named in `changes` are not modified. Returns the number
    /// of stored documents matched.
    pub async fn update<D: StoredDocument>(
        &self,
        doc: &mut D,
        changes: Document,
    ) -> Result<u64, StorageError> {
        let id = doc.id().ok_or_else(|| DocumentError::NotPersisted {
            document: D::NAME.to_string(),
        })?;
        let collection = self.collection::<D>();
        let updated_at = doc.timestamps_mut().touch();

        let mut fields = changes;
        fields.insert("updated_at", bson::DateTime::from_chrono(updated_at));

        let matched = self.backend.set_fields(&collection, id, fields).await?;
        debug!(collection = %collection, id = %id, matched, "updated document");
        Ok(matched)
    }

    pub async fn find_by_id<D: StoredDocument>(
        &self,
        id: ObjectId,
    ) -> Result<Option<D>, StorageError> {
        self.find_one(doc! { "_id": id }).await
    }

    pub async fn find_by_key<D: KeyedDocument>(&self, key: &str) -> Result<Option<D>, StorageError> {
        self.find_one(doc! { "key": key }).await
    }

    /// The stored document for `key`, or a new unsaved one when the key has
    /// never been written.
    pub async fn find_or_new_by_key<D: KeyedDocument>(
        &self,
        key: &str,
        active_now: bool,
    ) -> Result<D, StorageError> {
        Ok(self
            .find_by_key(key)
            .await?
            .unwrap_or_else(|| D::new_keyed(key.to_string(), active_now)))
    }

    pub async fn find_active<D: KeyedDocument>(
        &self,
        active_now: bool,
    ) -> Result<Vec<D>, StorageError> {
        self.find_many(doc! { "active_now": active_now }, Some(doc! { "key": 1 }))
            .await
    }

    /// Messages of `stream` ordered by their Redis id.
    pub async fn messages_for_stream(
        &self,
        stream: &StreamDocument,
    ) -> Result<Vec<StreamMessageDocument>, StorageError> {
        let id = stream.id().ok_or_else(|| DocumentError::NotPersisted {
            document: StreamDocument::NAME.to_string(),
        })?;
        self.find_many(doc! { "stream": id }, Some(doc! { "rid": 1 }))
            .await
    }

    /// Remove the stored copy of `doc`. Documents referencing it are left in
    /// place.
    pub async fn delete<D: StoredDocument>(&self, doc: &D) -> Result<u64, StorageError> {
        let id = doc.id().ok_or_else(|| DocumentError::NotPersisted {
            document: D::NAME.to_string(),
        })?;
        let collection = self.collection::<D>();
        let deleted = self.backend.delete_one(&collection, id).await?;
        debug!(collection = %collection, id = %id, deleted, "deleted document");
        Ok(deleted)
    }

    async fn find_one<D: StoredDocument>(&self, filter: Document) -> Result<Option<D>, StorageError> {
        self.backend
            .find_one(&self.collection::<D>(), filter)
            .await?
            .map(D::from_dict)
            .transpose()
            .map_err(StorageError::from)
    }

    async fn find_many<D: StoredDocument>(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<D>, StorageError> {
        self.backend
            .find_many(&self.collection::<D>(), filter, sort)
            .await?
            .into_iter()
            .map(|document| D::from_dict(document).map_err(StorageError::from))
            .collect()
    }
}
