//! `transactGetItem`/`transactWriteItem` (§5): multiple items read or
//! written atomically in one SQL transaction. A failure anywhere cancels the
//! whole transaction and reports a `CancellationReason` per item, matching
//! the hosted service's all-or-nothing semantics.
//!
//! Unlike `put_item`/`update_item`/`delete_item`, the writes inside a
//! transaction skip stream capture and index maintenance — per §5, those
//! side effects are out of scope for `transactWriteItem` in this engine.

use expr::{condition, update};
use sql::SqlHandle;
use std::collections::{HashMap, HashSet};
use store::{item_dao, metadata_store, relation_names};
use types::limits::MAX_TRANSACT_ITEMS;
use types::{attribute, AttributeMap, AttributeValue, CancellationReason, Error, ItemRow, Result, TableMeta};

use crate::validation;

#[derive(Debug, Clone)]
pub struct TransactGetRequestItem {
    pub table_name: String,
    pub key: AttributeMap,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactGetResponse {
    pub items: Vec<Option<AttributeMap>>,
}

pub async fn transact_get_item(handle: &SqlHandle, requests: Vec<TransactGetRequestItem>) -> Result<TransactGetResponse> {
    if requests.len() > MAX_TRANSACT_ITEMS {
        return Err(Error::limit_exceeded(format!(
            "transactGetItem requests at most {MAX_TRANSACT_ITEMS} items, got {}",
            requests.len()
        )));
    }

    let mut tables = HashMap::new();
    for request in &requests {
        if !tables.contains_key(&request.table_name) {
            let meta = metadata_store::require_table_metadata(handle, &request.table_name).await?;
            tables.insert(request.table_name.clone(), meta);
        }
    }

    let dialect = handle.dialect();
    let mut txn = handle.begin().await.map_err(Error::Other)?;
    let mut items = Vec::with_capacity(requests.len());
    for request in &requests {
        let table = &tables[&request.table_name];
        let relation = relation_names::item_relation(&table.name);
        let hash_value = attribute::extract_scalar_key(&request.key, &table.hash_key)?;
        let sort_value = table
            .sort_key
            .as_ref()
            .map(|attr| attribute::extract_scalar_key(&request.key, attr))
            .transpose()?;
        let row = item_dao::get_item_in_txn(&mut txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
        let item = row.map(|row| crate::support::apply_projection_expression(&row.attributes, request.projection_expression.as_deref(), &request.expression_attribute_names));
        items.push(item);
    }
    txn.commit().await.map_err(|e| Error::Other(e.into()))?;

    Ok(TransactGetResponse { items })
}

#[derive(Debug, Clone)]
pub enum TransactWriteOp {
    Put { item: AttributeMap, condition_expression: Option<String> },
    Update { key: AttributeMap, update_expression: String, condition_expression: Option<String> },
    Delete { key: AttributeMap, condition_expression: Option<String> },
    ConditionCheck { key: AttributeMap, condition_expression: String },
}

#[derive(Debug, Clone)]
pub struct TransactWriteRequestItem {
    pub table_name: String,
    pub op: TransactWriteOp,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

pub async fn transact_write_item(handle: &SqlHandle, requests: Vec<TransactWriteRequestItem>) -> Result<()> {
    if requests.len() > MAX_TRANSACT_ITEMS {
        return Err(Error::limit_exceeded(format!(
            "transactWriteItem requests at most {MAX_TRANSACT_ITEMS} items, got {}",
            requests.len()
        )));
    }

    let table_names: HashSet<&str> = requests.iter().map(|r| r.table_name.as_str()).collect();
    let mut tables: HashMap<String, TableMeta> = HashMap::new();
    for name in table_names {
        match metadata_store::require_table_metadata(handle, name).await {
            Ok(meta) => {
                tables.insert(name.to_string(), meta);
            }
            Err(err) => {
                let reason = err.as_cancellation_reason();
                return Err(Error::TransactionCancelled { reasons: vec![reason; requests.len()] });
            }
        }
    }

    let dialect = handle.dialect();
    let mut txn = handle.begin().await.map_err(Error::Other)?;

    let mut reasons = vec![CancellationReason::none(); requests.len()];
    for (index, request) in requests.iter().enumerate() {
        let table = &tables[&request.table_name];
        if let Err(err) = apply_transact_op_in_txn(&mut txn, dialect, table, request).await {
            reasons[index] = err.as_cancellation_reason();
            return Err(Error::TransactionCancelled { reasons });
        }
    }

    txn.commit().await.map_err(|e| Error::Other(e.into()))?;
    Ok(())
}

async fn apply_transact_op_in_txn(txn: &mut sql::SqlTxn<'_>, dialect: sql::Dialect, table: &TableMeta, request: &TransactWriteRequestItem) -> Result<()> {
    let relation = relation_names::item_relation(&table.name);

    match &request.op {
        TransactWriteOp::Put { item, condition_expression } => {
            validation::validate_item(table, item)?;
            let hash_value = attribute::extract_scalar_key(item, &table.hash_key)?;
            let sort_value = table.sort_key.as_ref().map(|attr| attribute::extract_scalar_key(item, attr)).transpose()?;
            let condition = condition::parse(condition_expression.as_deref(), &request.expression_attribute_names, &request.expression_attribute_values)?;
            let existing = item_dao::get_item_in_txn(txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
            if !condition.evaluate(existing.map(|r| r.attributes).as_ref().unwrap_or(&AttributeMap::new())) {
                return Err(Error::ConditionalCheckFailed);
            }
            let row = ItemRow::new(hash_value, sort_value, item.clone());
            item_dao::put_item_in_txn(txn, dialect, &relation, &row).await?;
            Ok(())
        }
        TransactWriteOp::Update { key, update_expression, condition_expression } => {
            let hash_value = attribute::extract_scalar_key(key, &table.hash_key)?;
            let sort_value = table.sort_key.as_ref().map(|attr| attribute::extract_scalar_key(key, attr)).transpose()?;
            let condition = condition::parse(condition_expression.as_deref(), &request.expression_attribute_names, &request.expression_attribute_values)?;
            let update_expr = update::parse(update_expression, &request.expression_attribute_names, &request.expression_attribute_values)?;
            let existing = item_dao::get_item_in_txn(txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
            let existing_attrs = existing.map(|r| r.attributes);
            if !condition.evaluate(existing_attrs.as_ref().unwrap_or(&AttributeMap::new())) {
                return Err(Error::ConditionalCheckFailed);
            }
            let mut new_attrs = existing_attrs.unwrap_or_else(|| key.clone());
            update_expr.apply(&mut new_attrs)?;
            validation::validate_item(table, &new_attrs)?;
            let row = ItemRow::new(hash_value, sort_value, new_attrs);
            item_dao::put_item_in_txn(txn, dialect, &relation, &row).await?;
            Ok(())
        }
        TransactWriteOp::Delete { key, condition_expression } => {
            let hash_value = attribute::extract_scalar_key(key, &table.hash_key)?;
            let sort_value = table.sort_key.as_ref().map(|attr| attribute::extract_scalar_key(key, attr)).transpose()?;
            let condition = condition::parse(condition_expression.as_deref(), &request.expression_attribute_names, &request.expression_attribute_values)?;
            let existing = item_dao::get_item_in_txn(txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
            if !condition.evaluate(existing.map(|r| r.attributes).as_ref().unwrap_or(&AttributeMap::new())) {
                return Err(Error::ConditionalCheckFailed);
            }
            item_dao::delete_item_in_txn(txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
            Ok(())
        }
        TransactWriteOp::ConditionCheck { key, condition_expression } => {
            let hash_value = attribute::extract_scalar_key(key, &table.hash_key)?;
            let sort_value = table.sort_key.as_ref().map(|attr| attribute::extract_scalar_key(key, attr)).transpose()?;
            let condition = condition::parse(Some(condition_expression.as_str()), &request.expression_attribute_names, &request.expression_attribute_values)?;
            let existing = item_dao::get_item_in_txn(txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
            if !condition.evaluate(existing.map(|r| r.attributes).as_ref().unwrap_or(&AttributeMap::new())) {
                return Err(Error::ConditionalCheckFailed);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_manager::{self, CreateTableRequest};
    use sql::Dialect;
    use sqlx::any::AnyPoolOptions;

    async fn test_handle() -> SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    async fn make_table(handle: &SqlHandle, name: &str) {
        table_manager::create_table(
            handle,
            CreateTableRequest {
                name: name.into(),
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
    async fn transact_write_commits_all_or_nothing() {
        let handle = test_handle().await;
        make_table(&handle, "Accounts").await;

        transact_write_item(
            &handle,
            vec![
                TransactWriteRequestItem {
                    table_name: "Accounts".into(),
                    op: TransactWriteOp::Put { item: item("a1"), condition_expression: None },
                    expression_attribute_names: HashMap::new(),
                    expression_attribute_values: HashMap::new(),
                },
                TransactWriteRequestItem {
                    table_name: "Accounts".into(),
                    op: TransactWriteOp::Put { item: item("a2"), condition_expression: None },
                    expression_attribute_names: HashMap::new(),
                    expression_attribute_values: HashMap::new(),
                },
            ],
        )
        .await
        .unwrap();

        let response = transact_get_item(
            &handle,
            vec![
                TransactGetRequestItem { table_name: "Accounts".into(), key: item("a1"), projection_expression: None, expression_attribute_names: HashMap::new() },
                TransactGetRequestItem { table_name: "Accounts".into(), key: item("a2"), projection_expression: None, expression_attribute_names: HashMap::new() },
            ],
        )
        .await
        .unwrap();
        assert!(response.items[0].is_some());
        assert!(response.items[1].is_some());
    }

    #[tokio::test]
    async fn transact_write_rolls_back_on_failed_condition_check() {
        let handle = test_handle().await;
        make_table(&handle, "Accounts").await;

        let err = transact_write_item(
            &handle,
            vec![
                TransactWriteRequestItem {
                    table_name: "Accounts".into(),
                    op: TransactWriteOp::Put { item: item("a1"), condition_expression: None },
                    expression_attribute_names: HashMap::new(),
                    expression_attribute_values: HashMap::new(),
                },
                TransactWriteRequestItem {
                    table_name: "Accounts".into(),
                    op: TransactWriteOp::ConditionCheck { key: item("missing"), condition_expression: "attribute_exists(id)".into() },
                    expression_attribute_names: HashMap::new(),
                    expression_attribute_values: HashMap::new(),
                },
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::TransactionCancelled { .. }));

        let response = transact_get_item(
            &handle,
            vec![TransactGetRequestItem { table_name: "Accounts".into(), key: item("a1"), projection_expression: None, expression_attribute_names: HashMap::new() }],
        )
        .await
        .unwrap();
        assert!(response.items[0].is_none());
    }
}
