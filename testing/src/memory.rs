use async_trait::async_trait;
use errors::StorageError;
use mirror_core::bson::oid::ObjectId;
use mirror_core::bson::{Bson, Document};
use mirror_core::{DocumentBackend, IndexSpec};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Default)]
struct CollectionState {
    documents: Vec<Document>,
    unique: Vec<&'static [&'static str]>,
}

impl CollectionState {
    fn position(&self, id: ObjectId) -> Option<usize> {
        self.documents
            .iter()
            .position(|d| d.get_object_id("_id").ok() == Some(id))
    }

    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), StorageError> {
        for fields in &self.unique {
            let conflict = self
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, existing)| fields.iter().all(|f| existing.get(*f) == candidate.get(*f)));

            if conflict {
                return Err(StorageError::DuplicateKey {
                    collection: collection.to_string(),
                    reason: format!("E11000 duplicate key error on {}", fields.join(", ")),
                });
            }
        }
        Ok(())
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

fn compare(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(Bson::Boolean(x)), Some(Bson::Boolean(y))) => x.cmp(y),
        (Some(Bson::DateTime(x)), Some(Bson::DateTime(y))) => x.cmp(y),
        (Some(Bson::ObjectId(x)), Some(Bson::ObjectId(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (as_number(x), as_number(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (field, direction) in sort {
            let descending = matches!(direction, Bson::Int32(d) if *d < 0)
                || matches!(direction, Bson::Int64(d) if *d < 0);
            let ordering = compare(a.get(field), b.get(field));
            let ordering = if descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// In-process [`DocumentBackend`] for tests.
///
/// Honours unique indexes declared through `create_indexes` and equality
/// filters on top-level fields, which is all the repository issues.
#[derive(Default)]
pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, CollectionState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored documents of `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |state| state.documents.len())
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StorageError> {
        let id = document
            .get_object_id("_id")
            .map_err(|e| StorageError::QueryError {
                backend: "memory".to_string(),
                reason: format!("Insert failed: {}", e),
            })?;

        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        if state.position(id).is_some() {
            return Err(StorageError::DuplicateKey {
                collection: collection.to_string(),
                reason: format!("E11000 duplicate key error on _id {}", id),
            });
        }
        state.check_unique(collection, &document, None)?;
        state.documents.push(document);
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &str,
        id: ObjectId,
        mut document: Document,
    ) -> Result<(), StorageError> {
        document.insert("_id", id);

        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        let position = state.position(id);
        state.check_unique(collection, &document, position)?;
        match position {
            Some(i) => state.documents[i] = document,
            None => state.documents.push(document),
        }
        Ok(())
    }

    async fn set_fields(
        &self,
        collection: &str,
        id: ObjectId,
        fields: Document,
    ) -> Result<u64, StorageError> {
        let mut collections = self.collections.write();
        let Some(state) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let Some(position) = state.position(id) else {
            return Ok(0);
        };

        let mut updated = state.documents[position].clone();
        for (field, value) in fields {
            updated.insert(field, value);
        }
        state.check_unique(collection, &updated, Some(position))?;
        state.documents[position] = updated;
        Ok(1)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StorageError> {
        Ok(self.collections.read().get(collection).and_then(|state| {
            state
                .documents
                .iter()
                .find(|d| matches_filter(d, &filter))
                .cloned()
        }))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>, StorageError> {
        let mut found: Vec<Document> = self
            .collections
            .read()
            .get(collection)
            .map(|state| {
                state
                    .documents
                    .iter()
                    .filter(|d| matches_filter(d, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = sort {
            sort_documents(&mut found, &sort);
        }
        Ok(found)
    }

    async fn delete_one(&self, collection: &str, id: ObjectId) -> Result<u64, StorageError> {
        let mut collections = self.collections.write();
        let Some(state) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match state.position(id) {
            Some(i) => {
                state.documents.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> Result<(), StorageError> {
        let mut collections = self.collections.write();
        let state = collections.entry(collection.to_string()).or_default();
        for index in indexes.iter().filter(|i| i.unique) {
            if !state.unique.contains(&index.fields) {
                state.unique.push(index.fields);
            }
        }
        Ok(())
    }
}
