//! Physical row shapes backing the per-table item, index, and stream
//! relations (§3 of the specification).

use crate::attribute::AttributeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row in a primary item relation, or (with `sort_key_value` always
/// populated and `attributes` restricted to the projection) a row in a
/// global secondary index relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub hash_key_value: String,
    pub sort_key_value: Option<String>,
    pub attributes: AttributeMap,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl ItemRow {
    pub fn new(hash_key_value: String, sort_key_value: Option<String>, attributes: AttributeMap) -> Self {
        let now = Utc::now();
        Self {
            hash_key_value,
            sort_key_value,
            attributes,
            create_date: now,
            update_date: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Modify,
    Remove,
}

/// A single change-stream record (§3, §4.7).
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub sequence_number: i64,
    pub event_id: String,
    pub event_type: EventType,
    pub event_timestamp: DateTime<Utc>,
    pub approximate_creation_time: i64,
    pub hash_key_value: String,
    pub sort_key_value: Option<String>,
    pub keys: AttributeMap,
    pub old_image: Option<AttributeMap>,
    pub new_image: Option<AttributeMap>,
    pub size_bytes: usize,
}
