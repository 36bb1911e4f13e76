//! CRUD on the `table_metadata` relation, the single source of truth for a
//! table's key schema, global secondary indexes, TTL, and stream settings
//! (§3, §4.1). The whole `TableMeta` is carried as one JSON document; the
//! relation also keeps `name` and `stream_enabled` as real columns so
//! lookups and the stream sweeper's table scan don't need to parse JSON.

use sql::{get_string, Dialect, NamedParams, SqlHandle};
use types::{Error, Result, TableMeta};

const RELATION: &str = "pdb_table_metadata";

fn creation_order_column(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "creation_order BIGSERIAL",
        Dialect::Sqlite => "creation_order INTEGER PRIMARY KEY AUTOINCREMENT",
    }
}

pub async fn ensure_metadata_relation(handle: &SqlHandle) -> Result<()> {
    let json_type = handle.dialect().json_column_type();
    let order_col = creation_order_column(handle.dialect());
    let name_primary_key = match handle.dialect() {
        Dialect::Postgres => "name varchar(255) primary key",
        Dialect::Sqlite => "name varchar(255) not null unique",
    };
    let ddl = format!(
        "create table if not exists {RELATION} (
            {order_col},
            {name_primary_key},
            stream_enabled boolean not null,
            metadata_json {json_type} not null
        )"
    );
    handle.execute(&ddl, &NamedParams::new()).await.map_err(Error::Other)?;
    Ok(())
}

fn decode(row: &sqlx::any::AnyRow) -> Result<TableMeta> {
    let json = get_string(row, "metadata_json").map_err(Error::Other)?;
    serde_json::from_str(&json).map_err(|e| Error::Other(e.into()))
}

pub async fn insert_table_metadata(handle: &SqlHandle, meta: &TableMeta) -> Result<()> {
    if get_table_metadata(handle, &meta.name).await?.is_some() {
        return Err(Error::validation(format!("table already exists: {}", meta.name)));
    }
    let json = serde_json::to_string(meta).map_err(|e| Error::Other(e.into()))?;
    let params = NamedParams::new()
        .bind("name", meta.name.as_str())
        .bind("stream_enabled", meta.stream_enabled)
        .bind("metadata_json", json);
    let json_bind = handle.dialect().json_bind_expr("metadata_json");
    handle
        .execute(
            &format!("insert into {RELATION} (name, stream_enabled, metadata_json) values (:name, :stream_enabled, {json_bind})"),
            &params,
        )
        .await
        .map_err(Error::Other)?;
    Ok(())
}

pub async fn get_table_metadata(handle: &SqlHandle, name: &str) -> Result<Option<TableMeta>> {
    let params = NamedParams::new().bind("name", name);
    let row = handle
        .fetch_optional(&format!("select metadata_json from {RELATION} where name = :name"), &params)
        .await
        .map_err(Error::Other)?;
    row.as_ref().map(decode).transpose()
}

pub async fn require_table_metadata(handle: &SqlHandle, name: &str) -> Result<TableMeta> {
    get_table_metadata(handle, name)
        .await?
        .ok_or_else(|| Error::TableNotFound { name: name.to_string() })
}

/// Lists tables in creation order, matching the hosted service's
/// `listTables` behavior (§4.1) rather than alphabetical order.
pub async fn list_table_names(handle: &SqlHandle) -> Result<Vec<String>> {
    let rows = handle
        .fetch_all(&format!("select name from {RELATION} order by creation_order"), &NamedParams::new())
        .await
        .map_err(Error::Other)?;
    rows.iter().map(|row| get_string(row, "name").map_err(Error::Other)).collect()
}

pub async fn list_stream_enabled_tables(handle: &SqlHandle) -> Result<Vec<TableMeta>> {
    let params = NamedParams::new().bind("stream_enabled", true);
    let rows = handle
        .fetch_all(
            &format!("select metadata_json from {RELATION} where stream_enabled = :stream_enabled"),
            &params,
        )
        .await
        .map_err(Error::Other)?;
    rows.iter().map(decode).collect()
}

/// Replaces the stored metadata for `meta.name` wholesale; callers mutate a
/// `TableMeta` in memory (to flip TTL or stream settings, or add a GSI) and
/// write the whole document back inside one transaction alongside any DDL
/// that change requires.
pub async fn update_table_metadata(handle: &SqlHandle, meta: &TableMeta) -> Result<()> {
    let json = serde_json::to_string(meta).map_err(|e| Error::Other(e.into()))?;
    let params = NamedParams::new()
        .bind("name", meta.name.as_str())
        .bind("stream_enabled", meta.stream_enabled)
        .bind("metadata_json", json);
    let json_bind = handle.dialect().json_bind_expr("metadata_json");
    let affected = handle
        .execute(
            &format!("update {RELATION} set stream_enabled = :stream_enabled, metadata_json = {json_bind} where name = :name"),
            &params,
        )
        .await
        .map_err(Error::Other)?;
    if affected == 0 {
        return Err(Error::TableNotFound { name: meta.name.clone() });
    }
    Ok(())
}

pub async fn delete_table_metadata(handle: &SqlHandle, name: &str) -> Result<()> {
    let params = NamedParams::new().bind("name", name);
    let affected = handle
        .execute(&format!("delete from {RELATION} where name = :name"), &params)
        .await
        .map_err(Error::Other)?;
    if affected == 0 {
        return Err(Error::TableNotFound { name: name.to_string() });
    }
    Ok(())
}

/// Used by callers that need to pick the placeholder style for a one-off
/// ad-hoc query outside the DAO's usual helpers (e.g. the CLI's `describeTable`).
pub fn dialect(handle: &SqlHandle) -> Dialect {
    handle.dialect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql::Dialect;
    use sqlx::any::AnyPoolOptions;

    async fn test_handle() -> SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    fn sample_meta(name: &str) -> TableMeta {
        TableMeta {
            name: name.to_string(),
            hash_key: "pk".to_string(),
            sort_key: None,
            global_secondary_indexes: vec![],
            ttl_enabled: false,
            ttl_attribute_name: None,
            stream_enabled: false,
            stream_view_type: None,
            stream_arn: None,
            stream_label: None,
            create_date: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn inserts_and_fetches_round_trip() {
        let handle = test_handle().await;
        ensure_metadata_relation(&handle).await.unwrap();
        insert_table_metadata(&handle, &sample_meta("Orders")).await.unwrap();

        let fetched = get_table_metadata(&handle, "Orders").await.unwrap().unwrap();
        assert_eq!(fetched.hash_key, "pk");
        assert_eq!(list_table_names(&handle).await.unwrap(), vec!["Orders".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let handle = test_handle().await;
        ensure_metadata_relation(&handle).await.unwrap();
        insert_table_metadata(&handle, &sample_meta("Orders")).await.unwrap();
        let err = insert_table_metadata(&handle, &sample_meta("Orders")).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn list_table_names_preserves_creation_order() {
        let handle = test_handle().await;
        ensure_metadata_relation(&handle).await.unwrap();
        insert_table_metadata(&handle, &sample_meta("Zebras")).await.unwrap();
        insert_table_metadata(&handle, &sample_meta("Antelopes")).await.unwrap();
        assert_eq!(list_table_names(&handle).await.unwrap(), vec!["Zebras".to_string(), "Antelopes".to_string()]);
    }

    #[tokio::test]
    async fn missing_table_errors_on_update_and_delete() {
        let handle = test_handle().await;
        ensure_metadata_relation(&handle).await.unwrap();
        let err = update_table_metadata(&handle, &sample_meta("Ghost")).await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }));
        let err = delete_table_metadata(&handle, "Ghost").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }));
    }
}
