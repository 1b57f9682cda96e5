//! Concrete document shapes, one per mirrored Redis structure.
//!
//! Every keyed shape embeds [`Timestamps`] and [`KeyedFields`] flattened, so
//! the stored layout is a flat document:
//! `{_id, created_at, updated_at, key, active_now, <payload>}`.

use crate::schema::{FieldSpec, IndexSpec};
use crate::traits::{KeyedDocument, StoredDocument};
use crate::types::{ActivityEntry, KeyedFields, StructureKind, Timestamps, now};
use bson::oid::ObjectId;
use errors::DocumentError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// JSON object payload.
pub type JsonObject = Map<String, Value>;

pub const DEFAULT_LAST_READ_ID: &str = "0-0";

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn default_last_read_id() -> String {
    DEFAULT_LAST_READ_ID.to_string()
}

fn reset_created_at<D: StoredDocument>(doc: &mut D) {
    doc.timestamps_mut().created_at = now();
}

fn reset_updated_at<D: StoredDocument>(doc: &mut D) {
    doc.timestamps_mut().updated_at = now();
}

macro_rules! stored_document {
    ($ty:ident, $kind:expr, $indexes:expr) => {
        impl StoredDocument for $ty {
            const NAME: &'static str = stringify!($ty);
            const KIND: StructureKind = $kind;

            fn id(&self) -> Option<ObjectId> {
                self.id
            }

            fn set_id(&mut self, id: ObjectId) {
                self.id = Some(id);
            }

            fn timestamps(&self) -> &Timestamps {
                &self.timestamps
            }

            fn timestamps_mut(&mut self) -> &mut Timestamps {
                &mut self.timestamps
            }

            fn indexes() -> Vec<IndexSpec> {
                $indexes
            }
        }
    };
}

macro_rules! keyed_accessors {
    () => {
        fn keyed(&self) -> &KeyedFields {
            &self.keyed
        }

        fn keyed_mut(&mut self) -> &mut KeyedFields {
            &mut self.keyed
        }
    };
}

/// Mirror of a RedisJSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(flatten)]
    pub keyed: KeyedFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonObject>,
}

impl JsonDocument {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self::new_keyed(key.into(), active_now)
    }

    pub fn set_value(&mut self, value: Option<JsonObject>) {
        self.value = value;
    }

    fn reset_value(&mut self) {
        self.value = None;
    }
}

stored_document!(JsonDocument, StructureKind::Json, Self::keyed_indexes());

impl KeyedDocument for JsonDocument {
    const RESET_FIELDS: &'static [&'static str] = &["value"];
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::with_default("created_at", reset_created_at::<Self>),
        FieldSpec::with_default("updated_at", reset_updated_at::<Self>),
        FieldSpec::required("key"),
        FieldSpec::required("active_now"),
        FieldSpec::with_default("value", Self::reset_value),
    ];

    fn new_keyed(key: String, active_now: bool) -> Self {
        Self {
            id: None,
            timestamps: Timestamps::new(),
            keyed: KeyedFields::new(key, active_now),
            value: None,
        }
    }

    keyed_accessors!();
}

/// Mirror of a plain Redis string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(flatten)]
    pub keyed: KeyedFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl StringDocument {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self::new_keyed(key.into(), active_now)
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    fn reset_value(&mut self) {
        self.value = None;
    }
}

stored_document!(StringDocument, StructureKind::String, Self::keyed_indexes());

impl KeyedDocument for StringDocument {
    const RESET_FIELDS: &'static [&'static str] = &["value"];
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::with_default("created_at", reset_created_at::<Self>),
        FieldSpec::with_default("updated_at", reset_updated_at::<Self>),
        FieldSpec::required("key"),
        FieldSpec::required("active_now"),
        FieldSpec::with_default("value", Self::reset_value),
    ];

    fn new_keyed(key: String, active_now: bool) -> Self {
        Self {
            id: None,
            timestamps: Timestamps::new(),
            keyed: KeyedFields::new(key, active_now),
            value: None,
        }
    }

    keyed_accessors!();
}

/// Mirror of a Redis list, in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(flatten)]
    pub keyed: KeyedFields,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: Vec<String>,
}

impl ListDocument {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self::new_keyed(key.into(), active_now)
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub fn set_values(&mut self, values: Vec<String>) {
        self.values = values;
    }

    fn reset_values(&mut self) {
        self.values = Vec::new();
    }
}

stored_document!(ListDocument, StructureKind::List, Self::keyed_indexes());

impl KeyedDocument for ListDocument {
    const RESET_FIELDS: &'static [&'static str] = &["values"];
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::with_default("created_at", reset_created_at::<Self>),
        FieldSpec::with_default("updated_at", reset_updated_at::<Self>),
        FieldSpec::required("key"),
        FieldSpec::required("active_now"),
        FieldSpec::with_default("values", Self::reset_values),
    ];

    fn new_keyed(key: String, active_now: bool) -> Self {
        Self {
            id: None,
            timestamps: Timestamps::new(),
            keyed: KeyedFields::new(key, active_now),
            values: Vec::new(),
        }
    }

    keyed_accessors!();
}

/// Mirror of a Redis sorted set; each entry is one member object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZSetDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(flatten)]
    pub keyed: KeyedFields,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: Vec<JsonObject>,
}

impl ZSetDocument {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self::new_keyed(key.into(), active_now)
    }

    pub fn set_values(&mut self, values: Vec<JsonObject>) {
        self.values = values;
    }

    fn reset_values(&mut self) {
        self.values = Vec::new();
    }
}

stored_document!(ZSetDocument, StructureKind::ZSet, Self::keyed_indexes());

impl KeyedDocument for ZSetDocument {
    const RESET_FIELDS: &'static [&'static str] = &["values"];
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::with_default("created_at", reset_created_at::<Self>),
        FieldSpec::with_default("updated_at", reset_updated_at::<Self>),
        FieldSpec::required("key"),
        FieldSpec::required("active_now"),
        FieldSpec::with_default("values", Self::reset_values),
    ];

    fn new_keyed(key: String, active_now: bool) -> Self {
        Self {
            id: None,
            timestamps: Timestamps::new(),
            keyed: KeyedFields::new(key, active_now),
            values: Vec::new(),
        }
    }

    keyed_accessors!();
}

/// Mirror of a Redis set. Members are kept unique by [`SetDocument::insert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(flatten)]
    pub keyed: KeyedFields,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: Vec<String>,
}

impl SetDocument {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self::new_keyed(key.into(), active_now)
    }

    /// Add a member. Returns `false` when it was already present.
    pub fn insert(&mut self, member: impl Into<String>) -> bool {
        let member = member.into();
        if self.values.contains(&member) {
            return false;
        }
        self.values.push(member);
        true
    }

    /// Remove a member. Returns `false` when it was absent.
    pub fn remove(&mut self, member: &str) -> bool {
        let before = self.values.len();
        self.values.retain(|m| m != member);
        self.values.len() != before
    }

    pub fn contains(&self, member: &str) -> bool {
        self.values.iter().any(|m| m == member)
    }

    fn reset_values(&mut self) {
        self.values = Vec::new();
    }
}

stored_document!(SetDocument, StructureKind::Set, Self::keyed_indexes());

impl KeyedDocument for SetDocument {
    const RESET_FIELDS: &'static [&'static str] = &["values"];
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::with_default("created_at", reset_created_at::<Self>),
        FieldSpec::with_default("updated_at", reset_updated_at::<Self>),
        FieldSpec::required("key"),
        FieldSpec::required("active_now"),
        FieldSpec::with_default("values", Self::reset_values),
    ];

    fn new_keyed(key: String, active_now: bool) -> Self {
        Self {
            id: None,
            timestamps: Timestamps::new(),
            keyed: KeyedFields::new(key, active_now),
            values: Vec::new(),
        }
    }

    keyed_accessors!();
}

/// Mirror of a Redis stream: the read cursor plus every activity transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    #[serde(flatten)]
    pub keyed: KeyedFields,
    #[serde(default = "default_last_read_id")]
    pub last_redis_read_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    activity_history: Vec<ActivityEntry>,
}

impl StreamDocument {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self::new_keyed(key.into(), active_now)
    }

    pub fn set_last_read_id(&mut self, id: impl Into<String>) {
        self.last_redis_read_id = id.into();
    }

    /// Recorded transitions, oldest first.
    pub fn activity_history(&self) -> &[ActivityEntry] {
        &self.activity_history
    }

    fn reset_last_read_id(&mut self) {
        self.last_redis_read_id = default_last_read_id();
    }
}

stored_document!(StreamDocument, StructureKind::Stream, Self::keyed_indexes());

impl KeyedDocument for StreamDocument {
    const RESET_FIELDS: &'static [&'static str] = &["last_redis_read_id"];
    // activity_history has no default producer: it is append-only.
    const FIELDS: &'static [FieldSpec<Self>] = &[
        FieldSpec::with_default("created_at", reset_created_at::<Self>),
        FieldSpec::with_default("updated_at", reset_updated_at::<Self>),
        FieldSpec::required("key"),
        FieldSpec::required("active_now"),
        FieldSpec::with_default("last_redis_read_id", Self::reset_last_read_id),
        FieldSpec::required("activity_history"),
    ];

    fn new_keyed(key: String, active_now: bool) -> Self {
        Self {
            id: None,
            timestamps: Timestamps::new(),
            keyed: KeyedFields::new(key, active_now),
            last_redis_read_id: default_last_read_id(),
            activity_history: Vec::new(),
        }
    }

    keyed_accessors!();

    /// Same transition as every keyed document, plus one history entry per
    /// actual flip. Entry timestamps never decrease.
    fn update_active_now_no_save(&mut self, active_now: bool) -> bool {
        if !self.keyed.set_active_now(active_now) {
            return false;
        }

        let mut timestamp = now();
        if let Some(last) = self.activity_history.last() {
            timestamp = timestamp.max(last.timestamp);
        }
        self.activity_history.push(ActivityEntry {
            timestamp,
            active_now,
        });
        true
    }
}

/// One message read from a stream. Deleting the parent stream leaves its
/// messages in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessageDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
    /// `_id` of the parent [`StreamDocument`].
    pub stream: ObjectId,
    /// Message id in Redis (`<ms>-<seq>`).
    pub rid: String,
    pub content: JsonObject,
}

impl StreamMessageDocument {
    /// The parent stream must have been saved so it has an `_id`.
    pub fn new(
        stream: &StreamDocument,
        rid: impl Into<String>,
        content: JsonObject,
    ) -> Result<Self, DocumentError> {
        let stream = stream.id.ok_or_else(|| DocumentError::NotPersisted {
            document: StreamDocument::NAME.to_string(),
        })?;

        Ok(Self {
            id: None,
            timestamps: Timestamps::new(),
            stream,
            rid: rid.into(),
            content,
        })
    }
}

stored_document!(
    StreamMessageDocument,
    StructureKind::StreamMessage,
    vec![
        IndexSpec::ascending(&["stream", "rid"]),
        IndexSpec::ascending(&["rid"]),
    ]
);
