//! Reconciles a table's global-secondary-index rows against a single item's
//! pre/post images (§3's "index row" shape, §4.6's reconciliation rule): an
//! item with all of an index's key attributes gets an upserted index row
//! keyed by the index hash value and a composite sort key that guarantees
//! uniqueness; an item missing any of them has its prior index row removed.

use crate::projection;
use sql::{Dialect, SqlTxn};
use store::{item_dao, relation_names};
use types::{attribute, AttributeMap, GlobalSecondaryIndex, ItemRow, Result, TableMeta};

/// Computes a GSI's composite `(hash, sort)` row key for one item image.
/// Shared with the query path, which needs the same encoding to translate an
/// `exclusiveStartKey` back into the index relation's physical cursor.
pub(crate) fn index_key_for(image: &AttributeMap, gsi: &GlobalSecondaryIndex, primary_hash: &str, primary_sort: Option<&str>) -> Option<(String, String)> {
    let hash_value = attribute::extract_scalar_key(image, &gsi.hash_key_attr).ok()?;
    let sort_component = match &gsi.sort_key_attr {
        Some(attr) => Some(attribute::extract_scalar_key(image, attr).ok()?),
        None => None,
    };
    let mut composite = String::new();
    if let Some(s) = &sort_component {
        composite.push_str(s);
        composite.push('#');
    }
    composite.push_str(primary_hash);
    if let Some(primary_sort) = primary_sort {
        composite.push('#');
        composite.push_str(primary_sort);
    }
    Some((hash_value, composite))
}

/// Reconciles every global secondary index of `table` inside the caller's
/// transaction. `old_image`/`new_image` are `None` when the item didn't
/// exist before, or doesn't exist after (a delete), respectively.
pub async fn reconcile_indexes_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    table: &TableMeta,
    primary_hash: &str,
    primary_sort: Option<&str>,
    old_image: Option<&AttributeMap>,
    new_image: Option<&AttributeMap>,
) -> Result<()> {
    for gsi in &table.global_secondary_indexes {
        let relation = relation_names::index_relation(&table.name, &gsi.index_name);
        let old_key = old_image.and_then(|image| index_key_for(image, gsi, primary_hash, primary_sort));
        let new_key = new_image.and_then(|image| index_key_for(image, gsi, primary_hash, primary_sort));

        if old_key != new_key {
            if let Some((hash, sort)) = &old_key {
                item_dao::delete_item_in_txn(txn, dialect, &relation, hash, Some(sort)).await?;
            }
        }
        if let (Some((hash, sort)), Some(image)) = (&new_key, new_image) {
            let projected = projection::project(image, table, gsi);
            let row = ItemRow::new(hash.clone(), Some(sort.clone()), projected);
            item_dao::put_item_in_txn(txn, dialect, &relation, &row).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::any::AnyPoolOptions;
    use store::item_table;
    use types::{AttributeValue, ProjectionType};

    async fn test_handle() -> sql::SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        sql::SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    fn table_with_gsi() -> TableMeta {
        TableMeta {
            name: "Users".into(),
            hash_key: "id".into(),
            sort_key: None,
            global_secondary_indexes: vec![GlobalSecondaryIndex {
                index_name: "byEmail".into(),
                hash_key_attr: "email".into(),
                sort_key_attr: None,
                projection_type: ProjectionType::All,
                non_key_attributes: None,
            }],
            ttl_enabled: false,
            ttl_attribute_name: None,
            stream_enabled: false,
            stream_view_type: None,
            stream_arn: None,
            stream_label: None,
            create_date: chrono::Utc::now(),
        }
    }

    fn image(email: &str) -> AttributeMap {
        let mut m = AttributeMap::new();
        m.insert("id".into(), AttributeValue::S("1".into()));
        m.insert("email".into(), AttributeValue::S(email.into()));
        m
    }

    #[tokio::test]
    async fn index_row_moves_when_key_attribute_changes() {
        let handle = test_handle().await;
        let table = table_with_gsi();
        item_table::create_item_relation(&handle, &table.name, false).await.unwrap();
        item_table::create_index_relation(&handle, &table.name, "byEmail").await.unwrap();
        let relation = relation_names::index_relation(&table.name, "byEmail");

        let mut txn = handle.begin().await.unwrap();
        reconcile_indexes_in_txn(&mut txn, handle.dialect(), &table, "1", None, None, Some(&image("a@x"))).await.unwrap();
        txn.commit().await.unwrap();
        assert!(item_dao::get_item(&handle, &relation, "a@x", Some("1")).await.unwrap().is_some());

        let mut txn = handle.begin().await.unwrap();
        reconcile_indexes_in_txn(&mut txn, handle.dialect(), &table, "1", None, Some(&image("a@x")), Some(&image("b@x"))).await.unwrap();
        txn.commit().await.unwrap();
        assert!(item_dao::get_item(&handle, &relation, "a@x", Some("1")).await.unwrap().is_none());
        assert!(item_dao::get_item(&handle, &relation, "b@x", Some("1")).await.unwrap().is_some());
    }
}
