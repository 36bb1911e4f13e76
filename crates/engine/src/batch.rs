//! `batchGetItem`/`batchWriteItem` (§4.5): fan out to the single-item
//! operations, capped at the batch size limits. Neither batch op is atomic
//! across its requests — each item succeeds or fails independently, unlike
//! `transactGet`/`transactWrite` — so it's implemented as a loop over
//! `item_manager`, not a shared transaction.

use crate::item_manager::{self, DeleteItemRequest, GetItemRequest, PutItemRequest};
use sql::SqlHandle;
use std::collections::HashMap;
use types::limits::{MAX_BATCH_GET_KEYS, MAX_BATCH_WRITE_REQUESTS};
use types::{AttributeMap, Error, Result};

#[derive(Debug, Clone)]
pub struct BatchGetRequestItem {
    pub table_name: String,
    pub keys: Vec<AttributeMap>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchGetResponse {
    pub items: HashMap<String, Vec<AttributeMap>>,
}

pub async fn batch_get_item(handle: &SqlHandle, requests: Vec<BatchGetRequestItem>) -> Result<BatchGetResponse> {
    let total_keys: usize = requests.iter().map(|r| r.keys.len()).sum();
    if total_keys > MAX_BATCH_GET_KEYS {
        return Err(Error::limit_exceeded(format!(
            "batchGetItem requests at most {MAX_BATCH_GET_KEYS} keys across all tables, got {total_keys}"
        )));
    }

    let mut items = HashMap::new();
    for request in requests {
        let mut found = Vec::with_capacity(request.keys.len());
        for key in request.keys {
            let response = item_manager::get_item(
                handle,
                GetItemRequest {
                    table_name: request.table_name.clone(),
                    key,
                    projection_expression: request.projection_expression.clone(),
                    expression_attribute_names: request.expression_attribute_names.clone(),
                },
            )
            .await?;
            if let Some(item) = response.item {
                found.push(item);
            }
        }
        items.entry(request.table_name).or_insert_with(Vec::new).extend(found);
    }
    Ok(BatchGetResponse { items })
}

#[derive(Debug, Clone)]
pub enum BatchWriteOp {
    Put(AttributeMap),
    Delete(AttributeMap),
}

#[derive(Debug, Clone)]
pub struct BatchWriteRequestItem {
    pub table_name: String,
    pub op: BatchWriteOp,
}

#[derive(Debug, Clone, Default)]
pub struct BatchWriteResponse {
    pub unprocessed: Vec<BatchWriteRequestItem>,
}

/// Applies every write unconditionally (batch writes carry no
/// `ConditionExpression`, per §4.5). A request that fails for a reason other
/// than infrastructure failure — e.g. an oversized item — is reported back
/// as unprocessed rather than aborting the whole batch, since batch writes
/// don't get all-or-nothing semantics.
pub async fn batch_write_item(handle: &SqlHandle, requests: Vec<BatchWriteRequestItem>) -> Result<BatchWriteResponse> {
    if requests.len() > MAX_BATCH_WRITE_REQUESTS {
        return Err(Error::limit_exceeded(format!(
            "batchWriteItem requests at most {MAX_BATCH_WRITE_REQUESTS} items, got {}",
            requests.len()
        )));
    }

    let mut unprocessed = Vec::new();
    for request in requests {
        let result = match &request.op {
            BatchWriteOp::Put(item) => {
                item_manager::put_item(
                    handle,
                    PutItemRequest {
                        table_name: request.table_name.clone(),
                        item: item.clone(),
                        ..Default::default()
                    },
                )
                .await
                .map(|_| ())
            }
            BatchWriteOp::Delete(key) => {
                item_manager::delete_item(
                    handle,
                    DeleteItemRequest {
                        table_name: request.table_name.clone(),
                        key: key.clone(),
                        ..Default::default()
                    },
                )
                .await
                .map(|_| ())
            }
        };
        if result.is_err() {
            unprocessed.push(request);
        }
    }
    Ok(BatchWriteResponse { unprocessed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_manager::{self, CreateTableRequest};
    use sql::Dialect;
    use sqlx::any::AnyPoolOptions;
    use types::AttributeValue;

    async fn test_handle() -> SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    async fn make_table(handle: &SqlHandle) {
        table_manager::create_table(
            handle,
            CreateTableRequest {
                name: "Orders".into(),
                hash_key: "id".into(),
                sort_key: None,
                global_secondary_indexes: vec![],
                stream_view_type: None,
            },
        )
        .await
        .unwrap();
    }

    fn item(id: &str) -> AttributeMap {
        let mut m = AttributeMap::new();
        m.insert("id".into(), AttributeValue::S(id.into()));
        m
    }

    #[tokio::test]
    async fn batch_write_then_batch_get_round_trips() {
        let handle = test_handle().await;
        make_table(&handle).await;

        batch_write_item(
            &handle,
            vec![
                BatchWriteRequestItem { table_name: "Orders".into(), op: BatchWriteOp::Put(item("o1")) },
                BatchWriteRequestItem { table_name: "Orders".into(), op: BatchWriteOp::Put(item("o2")) },
            ],
        )
        .await
        .unwrap();

        let response = batch_get_item(
            &handle,
            vec![BatchGetRequestItem {
                table_name: "Orders".into(),
                keys: vec![item("o1"), item("o2"), item("missing")],
                projection_expression: None,
                expression_attribute_names: HashMap::new(),
            }],
        )
        .await
        .unwrap();
        assert_eq!(response.items.get("Orders").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_get_rejects_too_many_keys() {
        let handle = test_handle().await;
        make_table(&handle).await;
        let keys: Vec<AttributeMap> = (0..(MAX_BATCH_GET_KEYS + 1)).map(|i| item(&i.to_string())).collect();
        let err = batch_get_item(
            &handle,
            vec![BatchGetRequestItem {
                table_name: "Orders".into(),
                keys,
                projection_expression: None,
                expression_attribute_names: HashMap::new(),
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { .. }));
    }
}
