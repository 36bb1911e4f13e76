//! Wire shapes for `batchGetItem`/`batchWriteItem`, keyed by table name the
//! way the hosted SDK's request/response maps are.

use engine::batch::{self, BatchGetRequestItem, BatchWriteOp, BatchWriteRequestItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::AttributeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysAndAttributes {
    pub keys: Vec<AttributeMap>,
    #[serde(default)]
    pub projection_expression: Option<String>,
    #[serde(default)]
    pub expression_attribute_names: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetItemInput {
    pub request_items: HashMap<String, KeysAndAttributes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetItemOutput {
    pub responses: HashMap<String, Vec<AttributeMap>>,
}

impl From<BatchGetItemInput> for Vec<BatchGetRequestItem> {
    fn from(input: BatchGetItemInput) -> Self {
        input
            .request_items
            .into_iter()
            .map(|(table_name, attrs)| BatchGetRequestItem {
                table_name,
                keys: attrs.keys,
                projection_expression: attrs.projection_expression,
                expression_attribute_names: attrs.expression_attribute_names,
            })
            .collect()
    }
}

impl From<batch::BatchGetResponse> for BatchGetItemOutput {
    fn from(response: batch::BatchGetResponse) -> Self {
        Self { responses: response.items }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteRequest {
    PutRequest { item: AttributeMap },
    DeleteRequest { key: AttributeMap },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWriteItemInput {
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWriteItemOutput {
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}

impl From<BatchWriteItemInput> for Vec<BatchWriteRequestItem> {
    fn from(input: BatchWriteItemInput) -> Self {
        input
            .request_items
            .into_iter()
            .flat_map(|(table_name, writes)| {
                writes.into_iter().map(move |write| BatchWriteRequestItem {
                    table_name: table_name.clone(),
                    op: match write {
                        WriteRequest::PutRequest { item } => BatchWriteOp::Put(item),
                        WriteRequest::DeleteRequest { key } => BatchWriteOp::Delete(key),
                    },
                })
            })
            .collect()
    }
}

impl From<batch::BatchWriteResponse> for BatchWriteItemOutput {
    fn from(response: batch::BatchWriteResponse) -> Self {
        let mut unprocessed_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for item in response.unprocessed {
            let write = match item.op {
                BatchWriteOp::Put(attrs) => WriteRequest::PutRequest { item: attrs },
                BatchWriteOp::Delete(key) => WriteRequest::DeleteRequest { key },
            };
            unprocessed_items.entry(item.table_name).or_default().push(write);
        }
        Self { unprocessed_items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_request_round_trips_camel_case() {
        let json = r#"{"putRequest":{"item":{"id":{"S":"o1"}}}}"#;
        let request: WriteRequest = serde_json::from_str(json).unwrap();
        assert!(matches!(request, WriteRequest::PutRequest { .. }));
    }
}
