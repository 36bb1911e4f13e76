//! Row-level access to a table's primary (or index) relation: point
//! get/put/delete, and keyset-paginated query/scan (§4.3, §4.4, §4.6).
//!
//! `query`/`scan` push what maps cleanly onto SQL — hash-key equality and a
//! sort-key range — down to the relation; everything a `FilterExpression`
//! needs beyond that is evaluated by the engine layer over the fetched page,
//! the same division DynamoDB itself draws between `KeyConditionExpression`
//! and `FilterExpression`.

use chrono::Utc;
use sql::{get_opt_string, get_string, Dialect, NamedParams, SqlHandle, SqlTxn};
use types::{attribute, AttributeMap, Error, ItemRow, Result};

/// A sort-key predicate resolved from a `KeyConditionExpression`, ready to
/// compile straight into a SQL comparison.
#[derive(Debug, Clone)]
pub enum SortKeyCondition {
    Eq(String),
    Lt(String),
    Le(String),
    Gt(String),
    Ge(String),
    Between(String, String),
    BeginsWith(String),
}

pub struct Page {
    pub rows: Vec<ItemRow>,
    pub last_evaluated_key: Option<(String, Option<String>)>,
}

fn decode_row(row: &sqlx::any::AnyRow) -> Result<ItemRow> {
    let hash_key_value = get_string(row, "hash_key_value").map_err(Error::Other)?;
    let sort_key_value = get_opt_string(row, "sort_key_value").map_err(Error::Other)?;
    let attributes_json = get_string(row, "attributes_json").map_err(Error::Other)?;
    let attributes = attribute::from_json(&attributes_json)?;
    let create_date = get_string(row, "create_date").map_err(Error::Other)?;
    let update_date = get_string(row, "update_date").map_err(Error::Other)?;
    Ok(ItemRow {
        hash_key_value,
        sort_key_value,
        attributes,
        create_date: parse_timestamp(&create_date)?,
        update_date: parse_timestamp(&update_date)?,
    })
}

fn parse_timestamp(text: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(e.into()))
}

pub async fn get_item(handle: &SqlHandle, relation: &str, hash_key_value: &str, sort_key_value: Option<&str>) -> Result<Option<ItemRow>> {
    let sql = key_predicate_select(relation, sort_key_value.is_some());
    let mut params = NamedParams::new().bind("hash", hash_key_value);
    if let Some(sort) = sort_key_value {
        params = params.bind("sort", sort);
    }
    let row = handle.fetch_optional(&sql, &params).await.map_err(Error::Other)?;
    row.as_ref().map(decode_row).transpose()
}

pub async fn get_item_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    relation: &str,
    hash_key_value: &str,
    sort_key_value: Option<&str>,
) -> Result<Option<ItemRow>> {
    let sql = key_predicate_select(relation, sort_key_value.is_some());
    let mut params = NamedParams::new().bind("hash", hash_key_value);
    if let Some(sort) = sort_key_value {
        params = params.bind("sort", sort);
    }
    let row = sql::fetch_optional_in_txn(txn, dialect, &sql, &params).await.map_err(Error::Other)?;
    row.as_ref().map(decode_row).transpose()
}

fn key_predicate_select(relation: &str, has_sort: bool) -> String {
    if has_sort {
        format!(
            "select hash_key_value, sort_key_value, attributes_json, create_date, update_date \
             from {relation} where hash_key_value = :hash and sort_key_value = :sort"
        )
    } else {
        format!(
            "select hash_key_value, sort_key_value, attributes_json, create_date, update_date \
             from {relation} where hash_key_value = :hash and sort_key_value is null"
        )
    }
}

/// Replaces whatever row occupies `row`'s key with `row`, inside the
/// caller's transaction. The engine is responsible for any conditional
/// check against the prior image before calling this.
pub async fn put_item_in_txn(txn: &mut SqlTxn<'_>, dialect: Dialect, relation: &str, row: &ItemRow) -> Result<()> {
    delete_item_in_txn(txn, dialect, relation, &row.hash_key_value, row.sort_key_value.as_deref()).await?;
    let attributes_json = attribute::to_json(&row.attributes)?;
    let json_bind = dialect.json_bind_expr("attributes_json");
    let sql = format!(
        "insert into {relation} (hash_key_value, sort_key_value, attributes_json, create_date, update_date) \
         values (:hash, :sort, {json_bind}, :create_date, :update_date)"
    );
    let params = NamedParams::new()
        .bind("hash", row.hash_key_value.as_str())
        .bind("sort", row.sort_key_value.clone())
        .bind("attributes_json", attributes_json)
        .bind("create_date", row.create_date.to_rfc3339())
        .bind("update_date", row.update_date.to_rfc3339());
    sql::execute_in_txn(txn, dialect, &sql, &params).await.map_err(Error::Other)?;
    Ok(())
}

/// Deletes the row at `(hash_key_value, sort_key_value)`, returning whether
/// a row existed.
pub async fn delete_item_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    relation: &str,
    hash_key_value: &str,
    sort_key_value: Option<&str>,
) -> Result<bool> {
    let sql = if sort_key_value.is_some() {
        format!("delete from {relation} where hash_key_value = :hash and sort_key_value = :sort")
    } else {
        format!("delete from {relation} where hash_key_value = :hash and sort_key_value is null")
    };
    let mut params = NamedParams::new().bind("hash", hash_key_value);
    if let Some(sort) = sort_key_value {
        params = params.bind("sort", sort);
    }
    let affected = sql::execute_in_txn(txn, dialect, &sql, &params).await.map_err(Error::Other)?;
    Ok(affected > 0)
}

fn sort_condition_sql(condition: &SortKeyCondition, params: NamedParams) -> (String, NamedParams) {
    match condition {
        SortKeyCondition::Eq(v) => ("sort_key_value = :sort_eq".to_string(), params.bind("sort_eq", v.as_str())),
        SortKeyCondition::Lt(v) => ("sort_key_value < :sort_lt".to_string(), params.bind("sort_lt", v.as_str())),
        SortKeyCondition::Le(v) => ("sort_key_value <= :sort_le".to_string(), params.bind("sort_le", v.as_str())),
        SortKeyCondition::Gt(v) => ("sort_key_value > :sort_gt".to_string(), params.bind("sort_gt", v.as_str())),
        SortKeyCondition::Ge(v) => ("sort_key_value >= :sort_ge".to_string(), params.bind("sort_ge", v.as_str())),
        SortKeyCondition::Between(lo, hi) => (
            "sort_key_value between :sort_lo and :sort_hi".to_string(),
            params.bind("sort_lo", lo.as_str()).bind("sort_hi", hi.as_str()),
        ),
        SortKeyCondition::BeginsWith(prefix) => {
            let upper_bound = prefix_upper_bound(prefix);
            (
                "sort_key_value >= :sort_prefix and sort_key_value < :sort_prefix_end".to_string(),
                params.bind("sort_prefix", prefix.as_str()).bind("sort_prefix_end", upper_bound),
            )
        }
    }
}

/// The smallest string that is lexicographically greater than every string
/// starting with `prefix`, used to turn `begins_with` into a half-open range
/// scan. Increments the last character's codepoint; if `prefix` is empty or
/// ends in the maximum codepoint, falls back to appending a sentinel so the
/// bound still strictly exceeds every prefixed value.
fn prefix_upper_bound(prefix: &str) -> String {
    let mut chars: Vec<char> = prefix.chars().collect();
    if let Some(last) = chars.pop() {
        match char::from_u32(last as u32 + 1) {
            Some(bumped) => {
                chars.push(bumped);
                return chars.into_iter().collect();
            }
            None => return format!("{prefix}\u{10ffff}"),
        }
    }
    "\u{10ffff}".to_string()
}

fn order_clause(ascending: bool) -> &'static str {
    if ascending {
        "hash_key_value asc, sort_key_value asc nulls first"
    } else {
        "hash_key_value desc, sort_key_value desc nulls last"
    }
}

/// Keyset pagination predicate: strictly-after the last evaluated (hash,
/// sort) pair in scan order. A relation's rows are homogeneous in whether
/// `sort_key_value` is populated (it mirrors whether the table has a sort
/// key), so the cursor only needs a sort-key branch when one is present.
fn cursor_predicate(ascending: bool, has_sort: bool) -> &'static str {
    match (ascending, has_sort) {
        (true, true) => "(hash_key_value > :cursor_hash or (hash_key_value = :cursor_hash and sort_key_value > :cursor_sort))",
        (true, false) => "hash_key_value > :cursor_hash",
        (false, true) => "(hash_key_value < :cursor_hash or (hash_key_value = :cursor_hash and sort_key_value < :cursor_sort))",
        (false, false) => "hash_key_value < :cursor_hash",
    }
}

/// Queries a single hash-key partition, optionally range-restricted by a
/// sort-key condition, in keyset-paginated pages.
#[allow(clippy::too_many_arguments)]
pub async fn query_page(
    handle: &SqlHandle,
    relation: &str,
    hash_key_value: &str,
    sort_condition: Option<&SortKeyCondition>,
    ascending: bool,
    limit: i64,
    exclusive_start: Option<(String, Option<String>)>,
) -> Result<Page> {
    let mut clauses = vec!["hash_key_value = :hash".to_string()];
    let mut params = NamedParams::new().bind("hash", hash_key_value);

    if let Some(condition) = sort_condition {
        let (clause, next_params) = sort_condition_sql(condition, params);
        params = next_params;
        clauses.push(clause);
    }
    if let Some((cursor_hash, cursor_sort)) = &exclusive_start {
        clauses.push(cursor_predicate(ascending, cursor_sort.is_some()).to_string());
        params = params.bind("cursor_hash", cursor_hash.as_str());
        if let Some(sort) = cursor_sort {
            params = params.bind("cursor_sort", sort.as_str());
        }
    }

    let sql = format!(
        "select hash_key_value, sort_key_value, attributes_json, create_date, update_date from {relation} \
         where {} order by {} limit :page_limit",
        clauses.join(" and "),
        order_clause(ascending)
    );
    params = params.bind("page_limit", limit + 1);

    fetch_page(handle, &sql, &params, limit).await
}

/// Scans the whole relation, not restricted to one hash key.
pub async fn scan_page(
    handle: &SqlHandle,
    relation: &str,
    ascending: bool,
    limit: i64,
    exclusive_start: Option<(String, Option<String>)>,
) -> Result<Page> {
    let mut clauses = vec![];
    let mut params = NamedParams::new();
    if let Some((cursor_hash, cursor_sort)) = &exclusive_start {
        clauses.push(cursor_predicate(ascending, cursor_sort.is_some()).to_string());
        params = params.bind("cursor_hash", cursor_hash.as_str());
        if let Some(sort) = cursor_sort {
            params = params.bind("cursor_sort", sort.as_str());
        }
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("where {}", clauses.join(" and "))
    };
    let sql = format!(
        "select hash_key_value, sort_key_value, attributes_json, create_date, update_date from {relation} \
         {where_clause} order by {} limit :page_limit",
        order_clause(ascending)
    );
    params = params.bind("page_limit", limit + 1);

    fetch_page(handle, &sql, &params, limit).await
}

/// Fetches `limit + 1` rows (the caller already bound `:page_limit` that
/// way) so the presence of the extra row tells us whether the partition
/// truly continues, rather than assuming more rows exist whenever a page
/// happens to come back full.
async fn fetch_page(handle: &SqlHandle, sql: &str, params: &NamedParams, limit: i64) -> Result<Page> {
    let rows = handle.fetch_all(sql, params).await.map_err(Error::Other)?;
    let mut items: Vec<ItemRow> = rows.iter().map(decode_row).collect::<Result<_>>()?;
    let has_more = items.len() as i64 > limit;
    if has_more {
        items.truncate(limit as usize);
    }
    let last_evaluated_key = if has_more {
        items.last().map(|row| (row.hash_key_value.clone(), row.sort_key_value.clone()))
    } else {
        None
    };
    Ok(Page {
        rows: items,
        last_evaluated_key,
    })
}

/// Fetches up to `keys.len()` rows in one round trip for `batchGetItem`,
/// returning whatever subset exists (DynamoDB silently omits missing keys
/// rather than erroring).
pub async fn batch_get(handle: &SqlHandle, relation: &str, keys: &[(String, Option<String>)]) -> Result<Vec<ItemRow>> {
    let mut found = Vec::with_capacity(keys.len());
    for (hash, sort) in keys {
        if let Some(row) = get_item(handle, relation, hash, sort.as_deref()).await? {
            found.push(row);
        }
    }
    Ok(found)
}

pub fn item_size_bytes(attributes: &AttributeMap) -> Result<usize> {
    Ok(attribute::to_json(attributes)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_table::create_item_relation;
    use sqlx::any::AnyPoolOptions;
    use types::AttributeValue;

    async fn test_handle() -> SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    fn row(hash: &str, sort: Option<&str>) -> ItemRow {
        let mut attrs = AttributeMap::new();
        attrs.insert("pk".into(), AttributeValue::S(hash.into()));
        ItemRow::new(hash.to_string(), sort.map(str::to_string), attrs)
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let handle = test_handle().await;
        create_item_relation(&handle, "Orders", true).await.unwrap();
        let relation = "pdb_item_orders";

        let mut txn = handle.begin().await.unwrap();
        put_item_in_txn(&mut txn, handle.dialect(), relation, &row("u1", Some("o1"))).await.unwrap();
        txn.commit().await.unwrap();

        let fetched = get_item(&handle, relation, "u1", Some("o1")).await.unwrap();
        assert!(fetched.is_some());

        let mut txn = handle.begin().await.unwrap();
        let existed = delete_item_in_txn(&mut txn, handle.dialect(), relation, "u1", Some("o1")).await.unwrap();
        txn.commit().await.unwrap();
        assert!(existed);

        assert!(get_item(&handle, relation, "u1", Some("o1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_page_paginates_within_a_partition() {
        let handle = test_handle().await;
        create_item_relation(&handle, "Orders", true).await.unwrap();
        let relation = "pdb_item_orders";

        let mut txn = handle.begin().await.unwrap();
        for i in 0..5 {
            put_item_in_txn(&mut txn, handle.dialect(), relation, &row("u1", Some(&format!("o{i}")))).await.unwrap();
        }
        txn.commit().await.unwrap();

        let first_page = query_page(&handle, relation, "u1", None, true, 2, None).await.unwrap();
        assert_eq!(first_page.rows.len(), 2);
        assert!(first_page.last_evaluated_key.is_some());

        let second_page = query_page(&handle, relation, "u1", None, true, 2, first_page.last_evaluated_key).await.unwrap();
        assert_eq!(second_page.rows.len(), 2);
        assert_ne!(first_page.rows[0].sort_key_value, second_page.rows[0].sort_key_value);
    }

    #[tokio::test]
    async fn query_page_does_not_paginate_past_a_partition_that_exactly_fills_the_page() {
        let handle = test_handle().await;
        create_item_relation(&handle, "Orders", true).await.unwrap();
        let relation = "pdb_item_orders";

        let mut txn = handle.begin().await.unwrap();
        for i in 0..2 {
            put_item_in_txn(&mut txn, handle.dialect(), relation, &row("u1", Some(&format!("o{i}")))).await.unwrap();
        }
        txn.commit().await.unwrap();

        let page = query_page(&handle, relation, "u1", None, true, 2, None).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert!(page.last_evaluated_key.is_none());
    }
}
