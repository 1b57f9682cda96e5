//! Repository behaviour against the in-memory backend.

use mirror_core::bson::doc;
use mirror_core::{
    JsonDocument, JsonObject, KeyedDocument, ListDocument, PartitionSuffix, SetDocument,
    StoredDocument, StreamDocument, StreamMessageDocument, StringDocument,
};
use serde_json::json;
use storage::Repository;
use testing::InMemoryBackend;

async fn repository() -> Repository<InMemoryBackend> {
    let repo = Repository::new(InMemoryBackend::new());
    repo.ensure_all_indexes().await.unwrap();
    repo
}

fn object(value: serde_json::Value) -> JsonObject {
    value.as_object().cloned().expect("object")
}

#[tokio::test]
async fn test_save_assigns_id_and_writes_partitioned_collection() {
    let repo = repository().await;
    let mut doc = StringDocument::new("greeting", true);
    doc.set_value(Some("hello".to_string()));

    let id = repo.save(&mut doc).await.unwrap();

    assert_eq!(doc.id(), Some(id));
    assert_eq!(repo.backend().count("string_acc"), 1);

    let stored: StringDocument = repo.find_by_key("greeting").await.unwrap().unwrap();
    assert_eq!(stored, doc);
}

#[tokio::test]
async fn test_save_advances_updated_at() {
    let repo = repository().await;
    let mut doc = ListDocument::new("queue", true);

    repo.save(&mut doc).await.unwrap();
    let first = doc.timestamps;
    assert!(first.updated_at >= first.created_at);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    doc.push("job-1");
    repo.save(&mut doc).await.unwrap();

    assert!(doc.timestamps.updated_at >= first.updated_at);
    assert!(doc.timestamps.updated_at >= doc.timestamps.created_at);
    assert_eq!(doc.timestamps.created_at, first.created_at);

    let stored: ListDocument = repo.find_by_key("queue").await.unwrap().unwrap();
    assert_eq!(stored.values, vec!["job-1".to_string()]);
    assert_eq!(stored.timestamps, doc.timestamps);
    assert_eq!(repo.backend().count("list_acc"), 1);
}

#[tokio::test]
async fn test_duplicate_key_is_rejected() {
    let repo = repository().await;
    repo.save(&mut JsonDocument::new("user:1", true))
        .await
        .unwrap();

    let mut duplicate = JsonDocument::new("user:1", false);
    let err = repo.save(&mut duplicate).await.unwrap_err();

    assert!(err.is_duplicate_key());
    assert_eq!(duplicate.id(), None);
    assert_eq!(repo.backend().count("json_acc"), 1);
}

#[tokio::test]
async fn test_transition_without_save_is_not_persisted() {
    let repo = repository().await;
    let mut stream = StreamDocument::new("events", false);
    repo.save(&mut stream).await.unwrap();

    assert!(stream.update_active_now_no_save(true));

    let stored: StreamDocument = repo.find_by_key("events").await.unwrap().unwrap();
    assert!(!stored.active_now());
    assert!(stored.activity_history().is_empty());
}

#[tokio::test]
async fn test_transition_then_save_persists_history() {
    let repo = repository().await;
    let mut stream = StreamDocument::new("events", false);
    repo.save(&mut stream).await.unwrap();

    assert!(stream.update_active_now_no_save(true));
    repo.save(&mut stream).await.unwrap();
    assert!(!stream.update_active_now_no_save(true));
    assert!(stream.update_active_now_no_save(false));
    repo.save(&mut stream).await.unwrap();

    let stored: StreamDocument = repo.find_by_key("events").await.unwrap().unwrap();
    assert!(!stored.active_now());
    let flags: Vec<bool> = stored
        .activity_history()
        .iter()
        .map(|e| e.active_now)
        .collect();
    assert_eq!(flags, vec![true, false]);
    assert_eq!(stored.activity_history(), stream.activity_history());
}

#[tokio::test]
async fn test_reset_without_save_then_with_save() {
    let repo = repository().await;
    let mut stream = StreamDocument::new("events", true);
    stream.set_last_read_id("1700000000000-7");
    repo.save(&mut stream).await.unwrap();

    stream.reset_fields_to_default_no_save().unwrap();
    assert_eq!(stream.last_redis_read_id, "0-0");
    let stored: StreamDocument = repo.find_by_key("events").await.unwrap().unwrap();
    assert_eq!(stored.last_redis_read_id, "1700000000000-7");

    repo.save(&mut stream).await.unwrap();
    let stored: StreamDocument = repo.find_by_key("events").await.unwrap().unwrap();
    assert_eq!(stored.last_redis_read_id, "0-0");
    assert!(stored.active_now());
}

#[tokio::test]
async fn test_update_sets_fields_and_timestamp() {
    let repo = repository().await;
    let mut doc = StringDocument::new("counter", true);
    repo.save(&mut doc).await.unwrap();
    let saved_at = doc.timestamps.updated_at;

    let matched = repo
        .update(&mut doc, doc! { "value": "42" })
        .await
        .unwrap();

    assert_eq!(matched, 1);
    assert!(doc.timestamps.updated_at >= saved_at);
    let stored: StringDocument = repo.find_by_key("counter").await.unwrap().unwrap();
    assert_eq!(stored.value.as_deref(), Some("42"));
    assert_eq!(stored.timestamps.updated_at, doc.timestamps.updated_at);
}

#[tokio::test]
async fn test_update_requires_saved_document() {
    let repo = repository().await;
    let mut doc = StringDocument::new("never-saved", true);
    let err = repo.update(&mut doc, doc! { "value": "x" }).await.unwrap_err();
    assert_eq!(err.to_string(), "StringDocument has not been persisted yet");
}

#[tokio::test]
async fn test_find_or_new_by_key() {
    let repo = repository().await;

    let mut set_doc: SetDocument = repo.find_or_new_by_key("tags", true).await.unwrap();
    assert_eq!(set_doc.id(), None);
    assert!(set_doc.active_now());
    set_doc.insert("rust");
    repo.save(&mut set_doc).await.unwrap();

    let again: SetDocument = repo.find_or_new_by_key("tags", false).await.unwrap();
    assert_eq!(again.id(), set_doc.id());
    assert!(again.active_now());
    assert!(again.contains("rust"));
}

#[tokio::test]
async fn test_find_active_filters_by_flag() {
    let repo = repository().await;
    for (key, active) in [("b", true), ("a", true), ("c", false)] {
        repo.save(&mut JsonDocument::new(key, active)).await.unwrap();
    }

    let active: Vec<JsonDocument> = repo.find_active(true).await.unwrap();
    let keys: Vec<&str> = active.iter().map(|d| d.key()).collect();
    assert_eq!(keys, vec!["a", "b"]);

    let inactive: Vec<JsonDocument> = repo.find_active(false).await.unwrap();
    assert_eq!(inactive.len(), 1);
}

#[tokio::test]
async fn test_deleting_stream_keeps_messages() {
    let repo = repository().await;
    let mut stream = StreamDocument::new("events", true);
    repo.save(&mut stream).await.unwrap();

    for rid in ["1700000000002-0", "1700000000001-0"] {
        let mut message =
            StreamMessageDocument::new(&stream, rid, object(json!({"rid": rid}))).unwrap();
        repo.save(&mut message).await.unwrap();
    }

    let messages = repo.messages_for_stream(&stream).await.unwrap();
    let rids: Vec<&str> = messages.iter().map(|m| m.rid.as_str()).collect();
    assert_eq!(rids, vec!["1700000000001-0", "1700000000002-0"]);

    assert_eq!(repo.delete(&stream).await.unwrap(), 1);
    assert!(
        repo.find_by_key::<StreamDocument>("events")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(repo.backend().count("stream_message_acc"), 2);
    assert_eq!(repo.messages_for_stream(&stream).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_partition_suffix_selects_collections() {
    let repo = Repository::with_suffix(InMemoryBackend::new(), PartitionSuffix::new("2024_month_03"));
    repo.save(&mut JsonDocument::new("k", true)).await.unwrap();

    assert_eq!(repo.collection::<JsonDocument>(), "json_2024_month_03");
    assert_eq!(repo.backend().count("json_2024_month_03"), 1);
    assert_eq!(repo.backend().count("json_acc"), 0);
}

#[tokio::test]
async fn test_ensure_all_indexes_touches_every_collection() {
    let repo = repository().await;
    assert_eq!(
        repo.backend().collection_names(),
        vec![
            "json_acc",
            "list_acc",
            "set_acc",
            "stream_acc",
            "stream_message_acc",
            "string_acc",
            "zset_acc",
        ]
    );
}
