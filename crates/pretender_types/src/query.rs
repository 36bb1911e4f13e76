//! Wire shapes for `query`/`scan`.

use engine::query as engine_query;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::{AttributeMap, AttributeValue};

fn default_true() -> bool {
    true
}

fn default_limit() -> i64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInput {
    pub table_name: String,
    #[serde(default)]
    pub index_name: Option<String>,
    pub key_condition_expression: String,
    #[serde(default)]
    pub filter_expression: Option<String>,
    #[serde(default)]
    pub projection_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(default = "default_true")]
    pub scan_index_forward: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub exclusive_start_key: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub items: Vec<AttributeMap>,
    #[serde(default)]
    pub last_evaluated_key: Option<AttributeMap>,
}

impl From<QueryInput> for engine_query::QueryRequest {
    fn from(input: QueryInput) -> Self {
        Self {
            table_name: input.table_name,
            index_name: input.index_name,
            key_condition_expression: input.key_condition_expression,
            filter_expression: input.filter_expression,
            projection_expression: input.projection_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            scan_index_forward: input.scan_index_forward,
            limit: input.limit,
            exclusive_start_key: input.exclusive_start_key,
        }
    }
}

impl From<engine_query::QueryResponse> for QueryOutput {
    fn from(response: engine_query::QueryResponse) -> Self {
        Self { items: response.items, last_evaluated_key: response.last_evaluated_key }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInput {
    pub table_name: String,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub filter_expression: Option<String>,
    #[serde(default)]
    pub projection_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default)]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub exclusive_start_key: Option<AttributeMap>,
}

pub type ScanOutput = QueryOutput;

impl From<ScanInput> for engine_query::ScanRequest {
    fn from(input: ScanInput) -> Self {
        Self {
            table_name: input.table_name,
            index_name: input.index_name,
            filter_expression: input.filter_expression,
            projection_expression: input.projection_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            limit: input.limit,
            exclusive_start_key: input.exclusive_start_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_input_defaults_scan_forward_and_limit() {
        let json = r#"{"tableName":"Orders","keyConditionExpression":"uid = :u"}"#;
        let input: QueryInput = serde_json::from_str(json).unwrap();
        assert!(input.scan_index_forward);
        assert_eq!(input.limit, 1000);
    }
}
