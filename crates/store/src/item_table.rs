//! Idempotent DDL for the per-table primary, index, and stream relations
//! (§4.2). `CREATE TABLE IF NOT EXISTS` keeps creation idempotent; an index
//! on `hash_key_value` is created best-effort since the primary key already
//! covers most lookups.

use crate::relation_names::{index_relation, index_relation_prefix, item_relation, stream_relation};
use sql::{get_string, Dialect, NamedParams, SqlHandle};

fn autoincrement_column(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "sequence_number BIGSERIAL PRIMARY KEY",
        Dialect::Sqlite => "sequence_number INTEGER PRIMARY KEY AUTOINCREMENT",
    }
}

/// Creates the primary item relation for `table_name`. `has_sort_key`
/// decides whether `sort_key_value` participates in the primary key.
pub async fn create_item_relation(handle: &SqlHandle, table_name: &str, has_sort_key: bool) -> anyhow::Result<()> {
    let relation = item_relation(table_name);
    let json_type = handle.dialect().json_column_type();
    let primary_key = if has_sort_key {
        "primary key (hash_key_value, sort_key_value)"
    } else {
        "primary key (hash_key_value)"
    };
    let ddl = format!(
        "create table if not exists {relation} (
            hash_key_value varchar(2048) not null,
            sort_key_value varchar(2048),
            attributes_json {json_type} not null,
            create_date timestamp not null,
            update_date timestamp not null,
            {primary_key}
        )"
    );
    handle.execute(&ddl, &NamedParams::new()).await?;

    let index_ddl = format!("create index if not exists {relation}_hash_idx on {relation} (hash_key_value)");
    // Best-effort: a concurrent creator may already have this index.
    let _ = handle.execute(&index_ddl, &NamedParams::new()).await;
    Ok(())
}

/// Creates the relation backing a global secondary index. The sort key is
/// always present here, holding the composite uniqueness key described in
/// §3.
pub async fn create_index_relation(handle: &SqlHandle, table_name: &str, index_name: &str) -> anyhow::Result<()> {
    let relation = index_relation(table_name, index_name);
    let json_type = handle.dialect().json_column_type();
    let ddl = format!(
        "create table if not exists {relation} (
            hash_key_value varchar(2048) not null,
            sort_key_value varchar(2048) not null,
            attributes_json {json_type} not null,
            create_date timestamp not null,
            update_date timestamp not null,
            primary key (hash_key_value, sort_key_value)
        )"
    );
    handle.execute(&ddl, &NamedParams::new()).await?;
    let index_ddl = format!("create index if not exists {relation}_hash_idx on {relation} (hash_key_value)");
    let _ = handle.execute(&index_ddl, &NamedParams::new()).await;
    Ok(())
}

/// Creates the relation backing a table's change stream.
pub async fn create_stream_relation(handle: &SqlHandle, table_name: &str) -> anyhow::Result<()> {
    let relation = stream_relation(table_name);
    let json_type = handle.dialect().json_column_type();
    let seq_col = autoincrement_column(handle.dialect());
    let ddl = format!(
        "create table if not exists {relation} (
            {seq_col},
            event_id varchar(64) not null,
            event_type varchar(16) not null,
            event_timestamp timestamp not null,
            approximate_creation_time bigint not null,
            create_date timestamp not null,
            hash_key_value varchar(2048) not null,
            sort_key_value varchar(2048),
            keys_json {json_type} not null,
            old_image_json {json_type},
            new_image_json {json_type},
            size_bytes bigint not null
        )"
    );
    handle.execute(&ddl, &NamedParams::new()).await?;
    Ok(())
}

pub async fn table_exists(handle: &SqlHandle, relation: &str) -> anyhow::Result<bool> {
    let (sql, params) = match handle.dialect() {
        Dialect::Postgres => (
            "select 1 as present from information_schema.tables where table_name = :relation",
            NamedParams::new().bind("relation", relation),
        ),
        Dialect::Sqlite => (
            "select 1 as present from sqlite_master where type = 'table' and name = :relation",
            NamedParams::new().bind("relation", relation),
        ),
    };
    Ok(handle.fetch_optional(sql, &params).await?.is_some())
}

/// Escapes `_` and `%`, SQL's single-character and multi-character `LIKE`
/// wildcards, so a relation prefix containing either (as `relation_names::sanitize`
/// routinely produces from a table name with punctuation) only matches itself.
fn escape_like_pattern(value: &str) -> String {
    value.replace('\\', "\\\\").replace('_', "\\_").replace('%', "\\%")
}

/// Lists the physical index relations belonging to `table_name`, by
/// scanning the catalog for the known naming prefix rather than trusting
/// only the in-memory metadata (so a drop can sweep orphans too).
pub async fn list_index_relations(handle: &SqlHandle, table_name: &str) -> anyhow::Result<Vec<String>> {
    let prefix = index_relation_prefix(table_name);
    let like_pattern = format!("{}%", escape_like_pattern(&prefix));
    let (sql, params) = match handle.dialect() {
        Dialect::Postgres => (
            "select table_name as name from information_schema.tables where table_name like :pattern escape '\\'",
            NamedParams::new().bind("pattern", like_pattern),
        ),
        Dialect::Sqlite => (
            "select name from sqlite_master where type = 'table' and name like :pattern escape '\\'",
            NamedParams::new().bind("pattern", like_pattern),
        ),
    };
    let rows = handle.fetch_all(sql, &params).await?;
    rows.into_iter().map(|row| get_string(&row, "name")).collect()
}

/// Drops a table's primary, index, and stream relations. Index relations are
/// discovered by catalog prefix scan rather than relying solely on the
/// caller's `gsi_names`, matching §4.2's "sweeps all index relations by
/// listing the information schema".
pub async fn drop_table_relations(handle: &SqlHandle, table_name: &str, stream_enabled: bool) -> anyhow::Result<()> {
    for index_relation in list_index_relations(handle, table_name).await? {
        drop_relation(handle, &index_relation).await?;
    }
    drop_relation(handle, &item_relation(table_name)).await?;
    if stream_enabled {
        drop_relation(handle, &stream_relation(table_name)).await?;
    }
    Ok(())
}

async fn drop_relation(handle: &SqlHandle, relation: &str) -> anyhow::Result<()> {
    let ddl = match handle.dialect() {
        Dialect::Postgres => format!("drop table if exists {relation} cascade"),
        Dialect::Sqlite => format!("drop table if exists {relation}"),
    };
    handle.execute(&ddl, &NamedParams::new()).await?;
    Ok(())
}
