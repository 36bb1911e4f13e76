//! `query`/`scan` (§4.4): hash-key partition lookup or full-table walk,
//! optionally against a global secondary index, keyset-paginated, with
//! `FilterExpression` and TTL-expiry filtering applied over the fetched page
//! and `ProjectionExpression` applied last.
//!
//! The relation pushes hash equality and a sort-key range down to SQL;
//! everything else is evaluated here, the same split DynamoDB itself draws
//! between `KeyConditionExpression`/`ScanFilter` and `FilterExpression`.

use crate::support;
use chrono::Utc;
use expr::condition::{self, ConditionExpr};
use expr::key_condition::{self, CompareOp, SortCondition};
use sql::SqlHandle;
use std::collections::HashMap;
use store::item_dao::{self, Page, SortKeyCondition};
use store::{metadata_store, relation_names};
use types::{attribute, AttributeMap, AttributeValue, Error, GlobalSecondaryIndex, ItemRow, Result, TableMeta};

#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition_expression: String,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    pub scan_index_forward: bool,
    pub limit: i64,
    pub exclusive_start_key: Option<AttributeMap>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub filter_expression: Option<String>,
    pub projection_expression: Option<String>,
    pub expression_attribute_names: HashMap<String, String>,
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    pub limit: i64,
    pub exclusive_start_key: Option<AttributeMap>,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub items: Vec<AttributeMap>,
    pub last_evaluated_key: Option<AttributeMap>,
}

pub type ScanResponse = QueryResponse;

fn resolve_relation<'a>(table: &'a TableMeta, index_name: Option<&str>) -> Result<(String, Option<&'a GlobalSecondaryIndex>)> {
    match index_name {
        None => Ok((relation_names::item_relation(&table.name), None)),
        Some(name) => {
            let gsi = table
                .gsi(name)
                .ok_or_else(|| Error::validation(format!("table '{}' has no global secondary index named '{name}'", table.name)))?;
            Ok((relation_names::index_relation(&table.name, name), Some(gsi)))
        }
    }
}

/// Translates a primary-table sort condition directly: the relation's
/// `sort_key_value` column already holds the scalar in comparable form.
fn translate_primary_sort_condition(sort: &SortCondition) -> Result<SortKeyCondition> {
    Ok(match sort {
        SortCondition::Eq(v) => SortKeyCondition::Eq(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Lt, v) => SortKeyCondition::Lt(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Gt, v) => SortKeyCondition::Gt(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Le, v) => SortKeyCondition::Le(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Ge, v) => SortKeyCondition::Ge(support::render_scalar(v)?),
        SortCondition::Between(lo, hi) => SortKeyCondition::Between(support::render_scalar(lo)?, support::render_scalar(hi)?),
        SortCondition::BeginsWith(prefix) => SortKeyCondition::BeginsWith(support::render_scalar(prefix)?),
    })
}

/// Translates a sort condition against a GSI's composite
/// `[<index_sort>#]<primary_hash>[#<primary_sort>]` encoding. An equality
/// condition on the index's own sort attribute becomes a `begins_with` on
/// the encoded prefix so it matches every primary key sharing that value;
/// `begins_with` carries through unchanged. Range comparisons compare the
/// raw bound against the composite column directly, which is exact at
/// `Eq`/`BeginsWith`/`Lt`/`Ge` but can admit or exclude boundary rows whose
/// composite suffix differs from the bound's own encoding for `Gt`/`Le`/
/// `Between` — an accepted imprecision given GSIs don't expose the
/// composite encoding to begin with.
fn translate_gsi_sort_condition(sort: &SortCondition) -> Result<SortKeyCondition> {
    Ok(match sort {
        SortCondition::Eq(v) => SortKeyCondition::BeginsWith(format!("{}#", support::render_scalar(v)?)),
        SortCondition::BeginsWith(prefix) => SortKeyCondition::BeginsWith(support::render_scalar(prefix)?),
        SortCondition::Compare(CompareOp::Lt, v) => SortKeyCondition::Lt(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Gt, v) => SortKeyCondition::Gt(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Le, v) => SortKeyCondition::Le(support::render_scalar(v)?),
        SortCondition::Compare(CompareOp::Ge, v) => SortKeyCondition::Ge(support::render_scalar(v)?),
        SortCondition::Between(lo, hi) => SortKeyCondition::Between(support::render_scalar(lo)?, support::render_scalar(hi)?),
    })
}

/// Builds the `(hash, sort)` cursor string pair an `exclusiveStartKey`
/// resolves to against this relation, re-deriving a GSI's composite sort key
/// via the same encoding the index maintainer writes rows with.
fn resolve_exclusive_start(table: &TableMeta, gsi: Option<&GlobalSecondaryIndex>, key: &AttributeMap) -> Result<(String, Option<String>)> {
    match gsi {
        None => {
            let hash = attribute::extract_scalar_key(key, &table.hash_key)?;
            let sort = table
                .sort_key
                .as_ref()
                .map(|attr| attribute::extract_scalar_key(key, attr))
                .transpose()?;
            Ok((hash, sort))
        }
        Some(gsi) => {
            let primary_hash = attribute::extract_scalar_key(key, &table.hash_key)?;
            let primary_sort = table
                .sort_key
                .as_ref()
                .map(|attr| attribute::extract_scalar_key(key, attr))
                .transpose()?;
            let (hash, sort) = crate::index_maintenance::index_key_for(key, gsi, &primary_hash, primary_sort.as_deref())
                .ok_or_else(|| Error::validation("exclusiveStartKey is missing an attribute required by the index's key schema"))?;
            Ok((hash, Some(sort)))
        }
    }
}

/// Builds the `lastEvaluatedKey` an exhausted page hands back, taken
/// directly from the last row's own attributes (guaranteed to carry every
/// key attribute, since projection always retains key attributes).
fn build_last_evaluated_key(table: &TableMeta, gsi: Option<&GlobalSecondaryIndex>, row: &ItemRow) -> AttributeMap {
    let mut key = AttributeMap::new();
    if let Some(v) = row.attributes.get(&table.hash_key) {
        key.insert(table.hash_key.clone(), v.clone());
    }
    if let Some(sort_attr) = &table.sort_key {
        if let Some(v) = row.attributes.get(sort_attr) {
            key.insert(sort_attr.clone(), v.clone());
        }
    }
    if let Some(gsi) = gsi {
        if let Some(v) = row.attributes.get(&gsi.hash_key_attr) {
            key.insert(gsi.hash_key_attr.clone(), v.clone());
        }
        if let Some(sort_attr) = &gsi.sort_key_attr {
            if let Some(v) = row.attributes.get(sort_attr) {
                key.insert(sort_attr.clone(), v.clone());
            }
        }
    }
    key
}

/// Applies TTL-expiry filtering, the `FilterExpression`, and finally the
/// `ProjectionExpression` to a fetched page, in that order — an expired item
/// is excluded from both the result set and any further evaluation, mirroring
/// `get_item`'s treatment of expired rows (without the lazy delete, since a
/// query/scan page isn't a single-item transactional context).
fn finalize_page(
    table: &TableMeta,
    page: Page,
    filter: &ConditionExpr,
    projection_expression: Option<&str>,
    names: &HashMap<String, String>,
    gsi: Option<&GlobalSecondaryIndex>,
) -> QueryResponse {
    let now = Utc::now().timestamp();
    let last_evaluated_key = page
        .last_evaluated_key
        .as_ref()
        .and_then(|_| page.rows.last())
        .map(|row| build_last_evaluated_key(table, gsi, row));

    let items = page
        .rows
        .into_iter()
        .filter(|row| !support::is_expired(table, &row.attributes, now))
        .filter(|row| filter.evaluate(&row.attributes))
        .map(|row| support::apply_projection_expression(&row.attributes, projection_expression, names))
        .collect();

    QueryResponse { items, last_evaluated_key }
}

pub async fn query(handle: &SqlHandle, request: QueryRequest) -> Result<QueryResponse> {
    let table = metadata_store::require_table_metadata(handle, &request.table_name).await?;
    let (relation, gsi) = resolve_relation(&table, request.index_name.as_deref())?;

    let key_condition = key_condition::parse(
        &request.key_condition_expression,
        &request.expression_attribute_names,
        &request.expression_attribute_values,
    )?;
    let expected_hash_attr = gsi.map(|g| g.hash_key_attr.as_str()).unwrap_or(&table.hash_key);
    if key_condition.hash_attr != expected_hash_attr {
        return Err(Error::invalid_expression(format!(
            "key condition hash attribute '{}' does not match the queried key schema's hash attribute '{expected_hash_attr}'",
            key_condition.hash_attr
        )));
    }
    let hash_value = support::render_scalar(&key_condition.hash_value)?;

    let sort_condition = key_condition
        .sort
        .as_ref()
        .map(|sort| if gsi.is_some() { translate_gsi_sort_condition(sort) } else { translate_primary_sort_condition(sort) })
        .transpose()?;

    let exclusive_start = request
        .exclusive_start_key
        .as_ref()
        .map(|key| resolve_exclusive_start(&table, gsi, key))
        .transpose()?;

    let filter = condition::parse(
        request.filter_expression.as_deref(),
        &request.expression_attribute_names,
        &request.expression_attribute_values,
    )?;

    let page = item_dao::query_page(
        handle,
        &relation,
        &hash_value,
        sort_condition.as_ref(),
        request.scan_index_forward,
        request.limit,
        exclusive_start,
    )
    .await?;

    Ok(finalize_page(&table, page, &filter, request.projection_expression.as_deref(), &request.expression_attribute_names, gsi))
}

pub async fn scan(handle: &SqlHandle, request: ScanRequest) -> Result<ScanResponse> {
    let table = metadata_store::require_table_metadata(handle, &request.table_name).await?;
    let (relation, gsi) = resolve_relation(&table, request.index_name.as_deref())?;

    let exclusive_start = request
        .exclusive_start_key
        .as_ref()
        .map(|key| resolve_exclusive_start(&table, gsi, key))
        .transpose()?;

    let filter = condition::parse(
        request.filter_expression.as_deref(),
        &request.expression_attribute_names,
        &request.expression_attribute_values,
    )?;

    let page = item_dao::scan_page(handle, &relation, true, request.limit, exclusive_start).await?;

    Ok(finalize_page(&table, page, &filter, request.projection_expression.as_deref(), &request.expression_attribute_names, gsi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_manager::{self, PutItemRequest};
    use crate::table_manager::{self, CreateTableRequest};
    use sql::Dialect;
    use sqlx::any::AnyPoolOptions;

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
                hash_key: "uid".into(),
                sort_key: Some("ts".into()),
                global_secondary_indexes: vec![],
                stream_view_type: None,
            },
        )
        .await
        .unwrap();
    }

    fn item(uid: &str, ts: &str) -> AttributeMap {
        let mut m = AttributeMap::new();
        m.insert("uid".into(), AttributeValue::S(uid.into()));
        m.insert("ts".into(), AttributeValue::S(ts.into()));
        m
    }

    #[tokio::test]
    async fn query_paginates_within_partition_in_order() {
        let handle = test_handle().await;
        make_table(&handle).await;
        for i in 0..3 {
            item_manager::put_item(
                &handle,
                PutItemRequest {
                    table_name: "Orders".into(),
                    item: item("u1", &format!("2024-0{}", i + 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let mut values = HashMap::new();
        values.insert(":u".to_string(), AttributeValue::S("u1".into()));
        let response = query(
            &handle,
            QueryRequest {
                table_name: "Orders".into(),
                key_condition_expression: "uid = :u".into(),
                expression_attribute_values: values,
                scan_index_forward: true,
                limit: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(response.items.len(), 2);
        assert!(response.last_evaluated_key.is_some());
    }

    #[tokio::test]
    async fn scan_applies_filter_expression() {
        let handle = test_handle().await;
        make_table(&handle).await;
        item_manager::put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("u1", "2024-01"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        item_manager::put_item(
            &handle,
            PutItemRequest {
                table_name: "Orders".into(),
                item: item("u2", "2024-01"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let mut values = HashMap::new();
        values.insert(":u".to_string(), AttributeValue::S("u1".into()));
        let response = scan(
            &handle,
            ScanRequest {
                table_name: "Orders".into(),
                filter_expression: Some("uid = :u".into()),
                expression_attribute_values: values,
                limit: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(response.items.len(), 1);
    }
}
