//! Generic stored record and the change events produced when records move.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crm_core::error::{CrmError, CrmResult};

use crate::entity::WatchedEntity;

/// JSON object payload of a record.
pub type RecordData = Map<String, Value>;

/// A row of any entity kind, independent of the storage adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub data: RecordData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Create a record with a fresh v4 id.
    pub fn new(data: RecordData) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), data)
    }

    /// Create a record with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, data: RecordData) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: strip_id(data),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate an arbitrary JSON value as record data.
    pub fn data_from_value(value: Value) -> CrmResult<RecordData> {
        match value {
            Value::Object(map) => Ok(strip_id(map)),
            other => Err(CrmError::InvalidRecord(format!(
                "record data must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Convert a typed model into record data.
    pub fn data_from_typed<T: Serialize>(value: &T) -> CrmResult<RecordData> {
        Self::data_from_value(serde_json::to_value(value)?)
    }

    /// Deserialize into a typed model; the record id is merged into the payload.
    pub fn to_typed<T: DeserializeOwned>(&self) -> CrmResult<T> {
        let mut map = self.data.clone();
        map.insert("id".into(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Shallow-merge `patch` into this record's data and bump `updated_at`.
    pub fn apply_patch(&mut self, patch: RecordData) {
        for (key, value) in strip_id(patch) {
            self.data.insert(key, value);
        }
        self.updated_at = Utc::now();
    }

    /// Read a string field, if present.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

fn strip_id(mut data: RecordData) -> RecordData {
    data.remove("id");
    data
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Kind of row change reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A change notification for one watched entity.
///
/// The sync layer forwards these to listeners without looking inside
/// the record payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub entity: WatchedEntity,
    pub kind: ChangeKind,
    pub new_record: Option<Record>,
    pub old_record: Option<Record>,
    pub committed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn insert(entity: WatchedEntity, record: Record) -> Self {
        Self::build(entity, ChangeKind::Insert, Some(record), None)
    }

    pub fn update(entity: WatchedEntity, old: Option<Record>, new: Record) -> Self {
        Self::build(entity, ChangeKind::Update, Some(new), old)
    }

    pub fn delete(entity: WatchedEntity, old: Record) -> Self {
        Self::build(entity, ChangeKind::Delete, None, Some(old))
    }

    fn build(
        entity: WatchedEntity,
        kind: ChangeKind,
        new_record: Option<Record>,
        old_record: Option<Record>,
    ) -> Self {
        Self {
            entity,
            kind,
            new_record,
            old_record,
            committed_at: Utc::now(),
        }
    }

    /// Id of the affected row.
    pub fn record_id(&self) -> Option<&str> {
        self.new_record
            .as_ref()
            .or(self.old_record.as_ref())
            .map(|r| r.id.as_str())
    }
}
