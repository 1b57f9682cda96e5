//! Value types embedded in every mirrored document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Current UTC time truncated to the millisecond precision BSON stores.
pub fn now() -> DateTime<Utc> {
    bson::DateTime::now().to_chrono()
}

/// Creation and last-write times shared by every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    pub fn new() -> Self {
        let at = now();
        Self {
            created_at: at,
            updated_at: at,
        }
    }

    /// Refresh `updated_at`, never moving it backwards or before `created_at`.
    pub fn touch(&mut self) -> DateTime<Utc> {
        self.updated_at = now().max(self.updated_at).max(self.created_at);
        self.updated_at
    }
}

impl Default for Timestamps {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity and activity flag of a keyed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedFields {
    pub key: String,
    active_now: bool,
}

impl KeyedFields {
    pub fn new(key: impl Into<String>, active_now: bool) -> Self {
        Self {
            key: key.into(),
            active_now,
        }
    }

    pub fn active_now(&self) -> bool {
        self.active_now
    }

    /// Move between the active and inactive states.
    ///
    /// Returns `false` without touching anything when already in the
    /// requested state.
    pub fn set_active_now(&mut self, active_now: bool) -> bool {
        if self.active_now == active_now {
            return false;
        }
        self.active_now = active_now;
        true
    }
}

/// One transition recorded in a stream's activity history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub active_now: bool,
}

/// The Redis structure a collection mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum StructureKind {
    Json,
    String,
    List,
    #[strum(serialize = "zset")]
    ZSet,
    Set,
    Stream,
    StreamMessage,
}

/// Period suffix appended to every collection name.
///
/// Retention happens outside this layer by dropping whole collections, so the
/// suffix decides which partition a write lands in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionSuffix(String);

impl PartitionSuffix {
    pub const DEFAULT: &'static str = "acc";

    pub fn new(suffix: impl Into<String>) -> Self {
        Self(suffix.into())
    }

    /// Monthly partition, e.g. `2024_month_03`.
    pub fn monthly(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y_month_%m").to_string())
    }

    pub fn current_month() -> Self {
        Self::monthly(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn collection(&self, kind: StructureKind) -> String {
        format!("{}_{}", kind, self.0)
    }
}

impl Default for PartitionSuffix {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for PartitionSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_collection_names() {
        let suffix = PartitionSuffix::default();
        assert_eq!(suffix.collection(StructureKind::Json), "json_acc");
        assert_eq!(suffix.collection(StructureKind::String), "string_acc");
        assert_eq!(suffix.collection(StructureKind::List), "list_acc");
        assert_eq!(suffix.collection(StructureKind::ZSet), "zset_acc");
        assert_eq!(suffix.collection(StructureKind::Set), "set_acc");
        assert_eq!(suffix.collection(StructureKind::Stream), "stream_acc");
        assert_eq!(
            suffix.collection(StructureKind::StreamMessage),
            "stream_message_acc"
        );
    }

    #[test]
    fn test_kinds_have_distinct_prefixes() {
        let prefixes: HashSet<String> = StructureKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(prefixes.len(), 7);
        assert_eq!("zset".parse::<StructureKind>().unwrap(), StructureKind::ZSet);
    }

    #[test]
    fn test_monthly_suffix() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let suffix = PartitionSuffix::monthly(at);
        assert_eq!(suffix.as_str(), "2024_month_03");
        assert_eq!(suffix.collection(StructureKind::Set), "set_2024_month_03");
    }

    #[test]
    fn test_keyed_transition_is_idempotent() {
        let mut keyed = KeyedFields::new("k", false);
        assert!(!keyed.set_active_now(false));
        assert!(!keyed.active_now());
        assert!(keyed.set_active_now(true));
        assert!(keyed.active_now());
        assert!(!keyed.set_active_now(true));
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let mut ts = Timestamps::new();
        let future = ts.created_at + chrono::Duration::hours(1);
        ts.updated_at = future;
        assert_eq!(ts.touch(), future);

        let mut ts = Timestamps::new();
        let before = ts.updated_at;
        let after = ts.touch();
        assert!(after >= before);
        assert!(after >= ts.created_at);
    }

    #[test]
    fn test_now_has_millisecond_precision() {
        let at = now();
        assert_eq!(at.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
