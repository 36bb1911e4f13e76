//! The top-level single-item orchestrator: `put`/`get`/`update`/`delete`
//! (§4.6). Every write runs in one SQL transaction covering the existence
//! read, the conditional check, the primary write, stream capture, and
//! index reconciliation — if any step fails the whole transaction rolls
//! back and the caller observes no partial effect (§5).

use crate::{index_maintenance, stream_capture, support, validation};
use chrono::Utc;
use expr::condition;
use serde::{Deserialize, Serialize};
use sql::SqlHandle;
use std::collections::HashMap;
use store::{item_dao, metadata_store, relation_names};
use types::{attribute, AttributeMap, AttributeValue, Error, EventType, ItemRow, Result};

/// What a write operation echoes back: nothing, the item as it was before
/// the write, or the item as it ended up after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    AllNew,
}

#[derive(Debug, Clone, Default)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: AttributeMap,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone)]
pub struct PutItemResponse {
    pub attributes: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: AttributeMap,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct GetItemResponse {
    pub item: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateItemRequest {
    pub table_name: String,
    pub key: AttributeMap,
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone)]
pub struct UpdateItemResponse {
    pub attributes: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: AttributeMap,
    pub condition_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone)]
pub struct DeleteItemResponse {
    pub attributes: Option<AttributeMap>,
}

fn key_of(item: &AttributeMap, hash_key: &str, sort_key: Option<&str>) -> AttributeMap {
    let mut keys = AttributeMap::new();
    if let Some(v) = item.get(hash_key) {
        keys.insert(hash_key.to_string(), v.clone());
    }
    if let Some(sort_attr) = sort_key {
        if let Some(v) = item.get(sort_attr) {
            keys.insert(sort_attr.to_string(), v.clone());
        }
    }
    keys
}

pub async fn put_item(handle: &SqlHandle, request: PutItemRequest) -> Result<PutItemResponse> {
    let table = metadata_store::require_table_metadata(handle, &request.table_name).await?;
    validation::validate_item(&table, &request.item)?;
    let hash_value = attribute::extract_scalar_key(&request.item, &table.hash_key)?;
    let sort_value = table
        .sort_key
        .as_ref()
        .map(|attr| attribute::extract_scalar_key(&request.item, attr))
        .transpose()?;
    let relation = relation_names::item_relation(&table.name);
    let stream_relation = relation_names::stream_relation(&table.name);
    let condition = condition::parse(
        request.condition_expression.as_deref(),
        &request.expression_attribute_names,
        &request.expression_attribute_values,
    )?;

    let dialect = handle.dialect();
    let mut txn = handle.begin().await.map_err(Error::Other)?;

    let existing = item_dao::get_item_in_txn(&mut txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
    let existing_attrs = existing.map(|row| row.attributes);
    if !condition.evaluate(existing_attrs.as_ref().unwrap_or(&AttributeMap::new())) {
        return Err(Error::ConditionalCheckFailed);
    }
    let event_type = if existing_attrs.is_some() { EventType::Modify } else { EventType::Insert };

    let row = ItemRow::new(hash_value.clone(), sort_value.clone(), request.item.clone());
    item_dao::put_item_in_txn(&mut txn, dialect, &relation, &row).await?;

    let keys = key_of(&request.item, &table.hash_key, table.sort_key.as_deref());
    stream_capture::capture_in_txn(
        &mut txn,
        dialect,
        &stream_relation,
        &table,
        event_type,
        &hash_value,
        sort_value.as_deref(),
        keys,
        existing_attrs.as_ref(),
        Some(&request.item),
    )
    .await?;

    index_maintenance::reconcile_indexes_in_txn(
        &mut txn,
        dialect,
        &table,
        &hash_value,
        sort_value.as_deref(),
        existing_attrs.as_ref(),
        Some(&request.item),
    )
    .await?;

    txn.commit().await.map_err(|e| Error::Other(e.into()))?;

    let attributes = match request.return_values {
        ReturnValues::AllOld => existing_attrs,
        _ => None,
    };
    Ok(PutItemResponse { attributes })
}

pub async fn get_item(handle: &SqlHandle, request: GetItemRequest) -> Result<GetItemResponse> {
    let table = metadata_store::require_table_metadata(handle, &request.table_name).await?;
    let hash_value = attribute::extract_scalar_key(&request.key, &table.hash_key)?;
    let sort_value = table
        .sort_key
        .as_ref()
        .map(|attr| attribute::extract_scalar_key(&request.key, attr))
        .transpose()?;
    let relation = relation_names::item_relation(&table.name);

    let Some(row) = item_dao::get_item(handle, &relation, &hash_value, sort_value.as_deref()).await? else {
        return Ok(GetItemResponse { item: None });
    };

    if support::is_expired(&table, &row.attributes, Utc::now().timestamp()) {
        purge_expired_item(handle, &table, &hash_value, sort_value.as_deref(), &row.attributes).await?;
        return Ok(GetItemResponse { item: None });
    }

    let item = support::apply_projection_expression(&row.attributes, request.projection_expression.as_deref(), &request.expression_attribute_names);
    Ok(GetItemResponse { item: Some(item) })
}

/// Lazily purges an item discovered to be TTL-expired on read, same as the
/// background TTL sweeper would eventually do: removes the primary row, its
/// index rows, and captures a REMOVE stream event.
async fn purge_expired_item(handle: &SqlHandle, table: &types::TableMeta, hash_value: &str, sort_value: Option<&str>, attributes: &AttributeMap) -> Result<()> {
    let relation = relation_names::item_relation(&table.name);
    let stream_relation = relation_names::stream_relation(&table.name);
    let dialect = handle.dialect();
    let mut txn = handle.begin().await.map_err(Error::Other)?;
    item_dao::delete_item_in_txn(&mut txn, dialect, &relation, hash_value, sort_value).await?;
    let keys = key_of(attributes, &table.hash_key, table.sort_key.as_deref());
    stream_capture::capture_in_txn(
        &mut txn,
        dialect,
        &stream_relation,
        table,
        EventType::Remove,
        hash_value,
        sort_value,
        keys,
        Some(attributes),
        None,
    )
    .await?;
    index_maintenance::reconcile_indexes_in_txn(&mut txn, dialect, table, hash_value, sort_value, Some(attributes), None).await?;
    txn.commit().await.map_err(|e| Error::Other(e.into()))?;
    Ok(())
}

pub async fn update_item(handle: &SqlHandle, request: UpdateItemRequest) -> Result<UpdateItemResponse> {
    let table = metadata_store::require_table_metadata(handle, &request.table_name).await?;
    let hash_value = attribute::extract_scalar_key(&request.key, &table.hash_key)?;
    let sort_value = table
        .sort_key
        .as_ref()
        .map(|attr| attribute::extract_scalar_key(&request.key, attr))
        .transpose()?;
    let relation = relation_names::item_relation(&table.name);
    let stream_relation = relation_names::stream_relation(&table.name);

    let condition = condition::parse(
        request.condition_expression.as_deref(),
        &request.expression_attribute_names,
        &request.expression_attribute_values,
    )?;
    let update = expr::update::parse(&request.update_expression, &request.expression_attribute_names, &request.expression_attribute_values)?;

    let dialect = handle.dialect();
    let mut txn = handle.begin().await.map_err(Error::Other)?;

    let existing = item_dao::get_item_in_txn(&mut txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
    let existing_attrs = existing.map(|row| row.attributes);
    if !condition.evaluate(existing_attrs.as_ref().unwrap_or(&AttributeMap::new())) {
        return Err(Error::ConditionalCheckFailed);
    }
    let event_type = if existing_attrs.is_some() { EventType::Modify } else { EventType::Insert };

    let mut new_attrs = existing_attrs.clone().unwrap_or_else(|| request.key.clone());
    update.apply(&mut new_attrs)?;
    validation::validate_item(&table, &new_attrs)?;

    let row = ItemRow::new(hash_value.clone(), sort_value.clone(), new_attrs.clone());
    item_dao::put_item_in_txn(&mut txn, dialect, &relation, &row).await?;

    let keys = key_of(&new_attrs, &table.hash_key, table.sort_key.as_deref());
    stream_capture::capture_in_txn(
        &mut txn,
        dialect,
        &stream_relation,
        &table,
        event_type,
        &hash_value,
        sort_value.as_deref(),
        keys,
        existing_attrs.as_ref(),
        Some(&new_attrs),
    )
    .await?;

    index_maintenance::reconcile_indexes_in_txn(
        &mut txn,
        dialect,
        &table,
        &hash_value,
        sort_value.as_deref(),
        existing_attrs.as_ref(),
        Some(&new_attrs),
    )
    .await?;

    txn.commit().await.map_err(|e| Error::Other(e.into()))?;

    let attributes = match request.return_values {
        ReturnValues::AllOld => existing_attrs,
        ReturnValues::AllNew => Some(new_attrs),
        ReturnValues::None => None,
    };
    Ok(UpdateItemResponse { attributes })
}

pub async fn delete_item(handle: &SqlHandle, request: DeleteItemRequest) -> Result<DeleteItemResponse> {
    let table = metadata_store::require_table_metadata(handle, &request.table_name).await?;
    let hash_value = attribute::extract_scalar_key(&request.key, &table.hash_key)?;
    let sort_value = table
        .sort_key
        .as_ref()
        .map(|attr| attribute::extract_scalar_key(&request.key, attr))
        .transpose()?;
    let relation = relation_names::item_relation(&table.name);
    let stream_relation = relation_names::stream_relation(&table.name);

    let condition = condition::parse(
        request.condition_expression.as_deref(),
        &request.expression_attribute_names,
        &request.expression_attribute_values,
    )?;

    let dialect = handle.dialect();
    let mut txn = handle.begin().await.map_err(Error::Other)?;

    let existing = item_dao::get_item_in_txn(&mut txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
    let existing_attrs = existing.map(|row| row.attributes);
    if !condition.evaluate(existing_attrs.as_ref().unwrap_or(&AttributeMap::new())) {
        return Err(Error::ConditionalCheckFailed);
    }

    if let Some(attrs) = &existing_attrs {
        item_dao::delete_item_in_txn(&mut txn, dialect, &relation, &hash_value, sort_value.as_deref()).await?;
        let keys = key_of(attrs, &table.hash_key, table.sort_key.as_deref());
        stream_capture::capture_in_txn(
            &mut txn,
            dialect,
            &stream_relation,
            &table,
            EventType::Remove,
            &hash_value,
            sort_value.as_deref(),
            keys,
            Some(attrs),
            None,
        )
        .await?;
        index_maintenance::reconcile_indexes_in_txn(&mut txn, dialect, &table, &hash_value, sort_value.as_deref(), Some(attrs), None).await?;
    }

    txn.commit().await.map_err(|e| Error::Other(e.into()))?;

    let attributes = match request.return_values {
        ReturnValues::AllOld => existing_attrs,
        _ => None,
    };
    Ok(DeleteItemResponse { attributes })
}

/// Scans `table_name`'s primary relation for TTL-expired items and purges
/// each one (primary row, index rows, and a REMOVE stream event), the batch
/// counterpart of `get_item`'s lazy single-item delete. Returns the number
/// of items purged. Used by the TTL sweeper's periodic pass.
pub async fn sweep_expired_items(handle: &SqlHandle, table_name: &str) -> Result<u64> {
    let table = metadata_store::require_table_metadata(handle, table_name).await?;
    if !table.ttl_enabled {
        return Ok(0);
    }
    let relation = relation_names::item_relation(&table.name);
    let now = Utc::now().timestamp();

    let mut purged = 0u64;
    let mut cursor = None;
    loop {
        let page = item_dao::scan_page(handle, &relation, true, 500, cursor.clone()).await?;
        let exhausted = page.last_evaluated_key.is_none();
        cursor = page.last_evaluated_key.clone();

        for row in &page.rows {
            if support::is_expired(&table, &row.attributes, now) {
                purge_expired_item(handle, &table, &row.hash_key_value, row.sort_key_value.as_deref(), &row.attributes).await?;
                purged += 1;
            }
        }
        if exhausted {
            break;
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_manager::{self, CreateTableRequest};
    use sqlx::any::AnyPoolOptions;
    use sql::Dialect;
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
        m.insert("total".into(), AttributeValue::N("10".into()));
        m
    }

    fn key(id: &str) -> AttributeMap {
        let mut m = AttributeMap::new();
        m.insert("id".into(), AttributeValue::S(id.into()));
        m
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let handle = test_handle().await;
        make_table(&handle).await;
        put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("o1"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let fetched = get_item(
            &handle,
            GetItemRequest {
                table_name: "Orders".into(),
                key: key("o1"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(fetched.item, Some(item("o1")));
    }

    #[tokio::test]
    async fn put_condition_failure_leaves_prior_item_untouched() {
        let handle = test_handle().await;
        make_table(&handle).await;
        put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("o1"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("o1"),
                condition_expression: Some("attribute_not_exists(id)".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ConditionalCheckFailed));
    }

    #[tokio::test]
    async fn update_applies_expression_and_returns_new_image() {
        let handle = test_handle().await;
        make_table(&handle).await;
        put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("o1"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let mut values = HashMap::new();
        values.insert(":v".to_string(), AttributeValue::N("5".into()));
        let response = update_item(
            &handle,
            UpdateItemRequest {
                table_name: "Orders".into(),
                key: key("o1"),
                update_expression: "SET total = total + :v".into(),
                expression_attribute_values: values,
                return_values: ReturnValues::AllNew,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(
            response.attributes.unwrap().get("total"),
            Some(&AttributeValue::N("15".into()))
        );
    }

    #[tokio::test]
    async fn delete_returns_old_image_and_removes_item() {
        let handle = test_handle().await;
        make_table(&handle).await;
        put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("o1"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let response = delete_item(
            &handle,
            DeleteItemRequest {
                table_name: "Orders".into(),
                key: key("o1"),
                return_values: ReturnValues::AllOld,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(response.attributes, Some(item("o1")));

        let fetched = get_item(
            &handle,
            GetItemRequest {
                table_name: "Orders".into(),
                key: key("o1"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(fetched.item.is_none());
    }

    #[tokio::test]
    async fn sweep_expired_items_purges_only_past_ttl_rows() {
        let handle = test_handle().await;
        table_manager::create_table(
            &handle,
            CreateTableRequest {
                name: "Sessions".into(),
                hash_key: "id".into(),
                sort_key: None,
                global_secondary_indexes: vec![],
                stream_view_type: None,
            },
        )
        .await
        .unwrap();
        table_manager::update_time_to_live(&handle, "Sessions", true, Some("expiresAt".into())).await.unwrap();

        let mut expired = key("s1");
        expired.insert("expiresAt".into(), AttributeValue::N("100".into()));
        let mut live = key("s2");
        live.insert("expiresAt".into(), AttributeValue::N("99999999999".into()));

        put_item(&handle, PutItemRequest { table_name: "Sessions".into(), item: expired, ..Default::default() }).await.unwrap();
        put_item(&handle, PutItemRequest { table_name: "Sessions".into(), item: live, ..Default::default() }).await.unwrap();

        let purged = sweep_expired_items(&handle, "Sessions").await.unwrap();
        assert_eq!(purged, 1);

        let remaining = get_item(&handle, GetItemRequest { table_name: "Sessions".into(), key: key("s2"), ..Default::default() }).await.unwrap();
        assert!(remaining.item.is_some());
    }
}
