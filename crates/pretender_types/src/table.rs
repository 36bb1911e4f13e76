//! Wire shapes for table lifecycle operations: `createTable`, `deleteTable`,
//! `describeTable`, `listTables`, `updateTimeToLive`, `updateTable`.

use chrono::{DateTime, Utc};
use engine::table_manager::CreateTableRequest;
use serde::{Deserialize, Serialize};
use types::{GlobalSecondaryIndex, ProjectionType, StreamViewType, TableMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSecondaryIndexInput {
    pub index_name: String,
    pub hash_key_attr: String,
    #[serde(default)]
    pub sort_key_attr: Option<String>,
    pub projection_type: ProjectionType,
    #[serde(default)]
    pub non_key_attributes: Option<Vec<String>>,
}

impl From<GlobalSecondaryIndexInput> for GlobalSecondaryIndex {
    fn from(input: GlobalSecondaryIndexInput) -> Self {
        Self {
            index_name: input.index_name,
            hash_key_attr: input.hash_key_attr,
            sort_key_attr: input.sort_key_attr,
            projection_type: input.projection_type,
            non_key_attributes: input.non_key_attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSecondaryIndexDescription {
    pub index_name: String,
    pub hash_key_attr: String,
    #[serde(default)]
    pub sort_key_attr: Option<String>,
    pub projection_type: ProjectionType,
    #[serde(default)]
    pub non_key_attributes: Option<Vec<String>>,
}

impl From<&GlobalSecondaryIndex> for GlobalSecondaryIndexDescription {
    fn from(gsi: &GlobalSecondaryIndex) -> Self {
        Self {
            index_name: gsi.index_name.clone(),
            hash_key_attr: gsi.hash_key_attr.clone(),
            sort_key_attr: gsi.sort_key_attr.clone(),
            projection_type: gsi.projection_type,
            non_key_attributes: gsi.non_key_attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescription {
    pub table_name: String,
    pub hash_key: String,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndexDescription>,
    pub ttl_enabled: bool,
    #[serde(default)]
    pub ttl_attribute_name: Option<String>,
    pub stream_enabled: bool,
    #[serde(default)]
    pub stream_view_type: Option<StreamViewType>,
    #[serde(default)]
    pub stream_arn: Option<String>,
    #[serde(default)]
    pub stream_label: Option<String>,
    pub creation_date_time: DateTime<Utc>,
}

impl From<&TableMeta> for TableDescription {
    fn from(meta: &TableMeta) -> Self {
        Self {
            table_name: meta.name.clone(),
            hash_key: meta.hash_key.clone(),
            sort_key: meta.sort_key.clone(),
            global_secondary_indexes: meta.global_secondary_indexes.iter().map(Into::into).collect(),
            ttl_enabled: meta.ttl_enabled,
            ttl_attribute_name: meta.ttl_attribute_name.clone(),
            stream_enabled: meta.stream_enabled,
            stream_view_type: meta.stream_view_type,
            stream_arn: meta.stream_arn.clone(),
            stream_label: meta.stream_label.clone(),
            creation_date_time: meta.create_date,
        }
    }
}

impl From<TableMeta> for TableDescription {
    fn from(meta: TableMeta) -> Self {
        Self::from(&meta)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableInput {
    pub table_name: String,
    pub hash_key: String,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndexInput>,
    #[serde(default)]
    pub stream_view_type: Option<StreamViewType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableOutput {
    pub table_description: TableDescription,
}

impl From<CreateTableInput> for CreateTableRequest {
    fn from(input: CreateTableInput) -> Self {
        Self {
            name: input.table_name,
            hash_key: input.hash_key,
            sort_key: input.sort_key,
            global_secondary_indexes: input.global_secondary_indexes.into_iter().map(Into::into).collect(),
            stream_view_type: input.stream_view_type,
        }
    }
}

impl From<TableMeta> for CreateTableOutput {
    fn from(meta: TableMeta) -> Self {
        Self { table_description: meta.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTableInput {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTableOutput {
    pub table_description: TableDescription,
}

impl From<TableMeta> for DeleteTableOutput {
    fn from(meta: TableMeta) -> Self {
        Self { table_description: meta.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTableInput {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTableOutput {
    pub table: TableDescription,
}

impl From<TableMeta> for DescribeTableOutput {
    fn from(meta: TableMeta) -> Self {
        Self { table: meta.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTablesInput {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTablesOutput {
    pub table_names: Vec<String>,
}

impl From<Vec<String>> for ListTablesOutput {
    fn from(table_names: Vec<String>) -> Self {
        Self { table_names }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeToLiveSpecification {
    pub enabled: bool,
    #[serde(default)]
    pub attribute_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimeToLiveInput {
    pub table_name: String,
    pub time_to_live_specification: TimeToLiveSpecification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimeToLiveOutput {
    pub time_to_live_specification: TimeToLiveSpecification,
}

impl From<TableMeta> for UpdateTimeToLiveOutput {
    fn from(meta: TableMeta) -> Self {
        Self {
            time_to_live_specification: TimeToLiveSpecification {
                enabled: meta.ttl_enabled,
                attribute_name: meta.ttl_attribute_name,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSpecification {
    pub stream_enabled: bool,
    #[serde(default)]
    pub stream_view_type: Option<StreamViewType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableInput {
    pub table_name: String,
    #[serde(default)]
    pub stream_specification: Option<StreamSpecification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTableOutput {
    pub table_description: TableDescription,
}

impl From<TableMeta> for UpdateTableOutput {
    fn from(meta: TableMeta) -> Self {
        Self { table_description: meta.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_input_accepts_camel_case_gsi() {
        let json = r#"{
            "tableName": "Orders",
            "hashKey": "pk",
            "globalSecondaryIndexes": [
                {"indexName": "byEmail", "hashKeyAttr": "email", "projectionType": "ALL"}
            ]
        }"#;
        let input: CreateTableInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.global_secondary_indexes.len(), 1);
        assert_eq!(input.global_secondary_indexes[0].index_name, "byEmail");
    }
}
