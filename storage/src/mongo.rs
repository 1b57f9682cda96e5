use crate::connection::MongoHandler;
use async_trait::async_trait;
use errors::StorageError;
use mirror_core::{DocumentBackend, IndexSpec};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use tracing::debug;

const BACKEND: &str = "MongoDB";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// [`DocumentBackend`] over a live MongoDB database.
#[derive(Clone)]
pub struct MongoBackend {
    database: Database,
}

impl MongoBackend {
    pub fn new(handler: &MongoHandler) -> Self {
        Self::from_database(handler.database().clone())
    }

    pub fn from_database(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }
}

fn is_duplicate_key(error: &MongoError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn query_error(operation: &str, error: MongoError) -> StorageError {
    StorageError::QueryError {
        backend: BACKEND.to_string(),
        reason: format!("{} failed: {}", operation, error),
    }
}

fn write_error(collection: &str, operation: &str, error: MongoError) -> StorageError {
    if is_duplicate_key(&error) {
        StorageError::DuplicateKey {
            collection: collection.to_string(),
            reason: error.to_string(),
        }
    } else {
        query_error(operation, error)
    }
}

fn index_model(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for field in spec.fields {
        keys.insert(*field, 1);
    }

    let options = IndexOptions::builder()
        .name(spec.name())
        .unique(spec.unique)
        .build();

    IndexModel::builder().keys(keys).options(options).build()
}

#[async_trait]
impl DocumentBackend for MongoBackend {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StorageError> {
        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| write_error(collection, "Insert", e))?;
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> Result<(), StorageError> {
        self.collection(collection)
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await
            .map_err(|e| write_error(collection, "Replace", e))?;
        Ok(())
    }

    async fn set_fields(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
    ) -> Result<u64, StorageError> {
        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": fields })
            .await
            .map_err(|e| write_error(collection, "Update", e))?;
        Ok(result.matched_count)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StorageError> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| query_error("Find", e))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, StorageError> {
        let handle = self.collection(collection);
        let mut find = handle.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }

        let mut cursor = find.await.map_err(|e| query_error("Find", e))?;
        let mut documents = Vec::new();
        while cursor.advance().await.map_err(|e| query_error("Find", e))? {
            let document = cursor
                .deserialize_current()
                .map_err(|e| query_error("Find", e))?;
            documents.push(document);
        }
        Ok(documents)
    }

    async fn delete_one(&self, collection: &str, id: ObjectId) -> Result<u64, StorageError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| query_error("Delete", e))?;
        Ok(result.deleted_count)
    }

    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> Result<(), StorageError> {
        if indexes.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = indexes.iter().map(index_model).collect();
        self.collection(collection)
            .create_indexes(models)
            .await
            .map_err(|e| query_error("Create indexes", e))?;

        debug!(collection, count = indexes.len(), "indexes ensured");
        Ok(())
    }
}
