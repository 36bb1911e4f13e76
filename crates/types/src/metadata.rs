//! Logical table metadata, as stored one row per table in `table_metadata`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionType {
    All,
    KeysOnly,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamViewType {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

impl StreamViewType {
    pub fn carries_old_image(&self) -> bool {
        matches!(self, StreamViewType::OldImage | StreamViewType::NewAndOldImages)
    }

    pub fn carries_new_image(&self) -> bool {
        matches!(self, StreamViewType::NewImage | StreamViewType::NewAndOldImages)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    pub hash_key_attr: String,
    pub sort_key_attr: Option<String>,
    pub projection_type: ProjectionType,
    pub non_key_attributes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub hash_key: String,
    pub sort_key: Option<String>,
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    pub ttl_enabled: bool,
    pub ttl_attribute_name: Option<String>,
    pub stream_enabled: bool,
    pub stream_view_type: Option<StreamViewType>,
    pub stream_arn: Option<String>,
    pub stream_label: Option<String>,
    pub create_date: DateTime<Utc>,
}

impl TableMeta {
    pub fn gsi(&self, index_name: &str) -> Option<&GlobalSecondaryIndex> {
        self.global_secondary_indexes
            .iter()
            .find(|gsi| gsi.index_name == index_name)
    }

    /// Formats `arn:aws:dynamodb:us-east-1:000000000000:table/<name>/stream/<epoch-ms>`.
    pub fn format_stream_arn(table_name: &str, epoch_millis: i64) -> String {
        format!("arn:aws:dynamodb:us-east-1:000000000000:table/{table_name}/stream/{epoch_millis}")
    }

    /// Extracts the table name from a stream ARN: the third-from-last
    /// `/`-delimited segment.
    pub fn table_name_from_stream_arn(arn: &str) -> Option<&str> {
        let segments: Vec<&str> = arn.split('/').collect();
        if segments.len() < 3 {
            return None;
        }
        Some(segments[segments.len() - 3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_arn_round_trips_table_name() {
        let arn = TableMeta::format_stream_arn("Orders", 1_700_000_000_000);
        assert_eq!(
            arn,
            "arn:aws:dynamodb:us-east-1:000000000000:table/Orders/stream/1700000000000"
        );
        assert_eq!(TableMeta::table_name_from_stream_arn(&arn), Some("Orders"));
    }

    #[test]
    fn projection_type_serializes_as_hosted_wire_tags() {
        assert_eq!(
            serde_json::to_string(&ProjectionType::KeysOnly).unwrap(),
            "\"KEYS_ONLY\""
        );
        assert_eq!(
            serde_json::to_string(&StreamViewType::NewAndOldImages).unwrap(),
            "\"NEW_AND_OLD_IMAGES\""
        );
    }
}
