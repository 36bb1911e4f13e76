//! Table lifecycle: `createTable`, `deleteTable`, `updateTimeToLive`, and
//! stream enable/disable (`updateTable`), orchestrating the metadata store
//! and the item-table manager's DDL (§4.6, §2's "Table manager" row).

use chrono::Utc;
use sql::SqlHandle;
use store::{item_table, metadata_store};
use types::{Error, GlobalSecondaryIndex, ProjectionType, Result, StreamViewType, TableMeta};

#[derive(Debug, Clone)]
pub struct CreateTableRequest {
    pub name: String,
    pub hash_key: String,
    pub sort_key: Option<String>,
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    pub stream_view_type: Option<StreamViewType>,
}

fn validate_create_request(request: &CreateTableRequest) -> Result<()> {
    if request.name.trim().is_empty() {
        return Err(Error::validation("table name must not be empty"));
    }
    if request.hash_key.trim().is_empty() {
        return Err(Error::validation("hash_key must not be empty"));
    }
    for gsi in &request.global_secondary_indexes {
        if gsi.index_name.trim().is_empty() || gsi.hash_key_attr.trim().is_empty() {
            return Err(Error::validation(format!(
                "global secondary index '{}' must name a non-empty index name and hash key attribute",
                gsi.index_name
            )));
        }
        if gsi.projection_type == ProjectionType::Include && gsi.non_key_attributes.as_ref().is_none_or_empty() {
            return Err(Error::validation(format!(
                "global secondary index '{}' uses INCLUDE projection but lists no attributes",
                gsi.index_name
            )));
        }
    }
    Ok(())
}

trait OptVecExt {
    fn is_none_or_empty(&self) -> bool;
}
impl OptVecExt for Option<Vec<String>> {
    fn is_none_or_empty(&self) -> bool {
        match self {
            None => true,
            Some(v) => v.is_empty(),
        }
    }
}

pub async fn create_table(handle: &SqlHandle, request: CreateTableRequest) -> Result<TableMeta> {
    validate_create_request(&request)?;

    let stream_enabled = request.stream_view_type.is_some();
    let now = Utc::now();
    let meta = TableMeta {
        name: request.name.clone(),
        hash_key: request.hash_key,
        sort_key: request.sort_key,
        global_secondary_indexes: request.global_secondary_indexes,
        ttl_enabled: false,
        ttl_attribute_name: None,
        stream_enabled,
        stream_view_type: request.stream_view_type,
        stream_arn: stream_enabled.then(|| TableMeta::format_stream_arn(&request.name, now.timestamp_millis())),
        stream_label: stream_enabled.then(|| now.timestamp_millis().to_string()),
        create_date: now,
    };

    metadata_store::insert_table_metadata(handle, &meta).await?;
    item_table::create_item_relation(handle, &meta.name, meta.sort_key.is_some()).await.map_err(Error::Other)?;
    for gsi in &meta.global_secondary_indexes {
        item_table::create_index_relation(handle, &meta.name, &gsi.index_name)
            .await
            .map_err(Error::Other)?;
    }
    if stream_enabled {
        item_table::create_stream_relation(handle, &meta.name).await.map_err(Error::Other)?;
    }
    Ok(meta)
}

pub async fn delete_table(handle: &SqlHandle, name: &str) -> Result<TableMeta> {
    let meta = metadata_store::require_table_metadata(handle, name).await?;
    item_table::drop_table_relations(handle, name, meta.stream_enabled)
        .await
        .map_err(Error::Other)?;
    metadata_store::delete_table_metadata(handle, name).await?;
    Ok(meta)
}

pub async fn describe_table(handle: &SqlHandle, name: &str) -> Result<TableMeta> {
    metadata_store::require_table_metadata(handle, name).await
}

pub async fn list_tables(handle: &SqlHandle) -> Result<Vec<String>> {
    metadata_store::list_table_names(handle).await
}

pub async fn update_time_to_live(handle: &SqlHandle, name: &str, enabled: bool, attribute_name: Option<String>) -> Result<TableMeta> {
    let mut meta = metadata_store::require_table_metadata(handle, name).await?;
    if enabled && attribute_name.as_deref().map(str::is_empty).unwrap_or(true) {
        return Err(Error::validation("enabling TTL requires a non-empty attribute name"));
    }
    meta.ttl_enabled = enabled;
    meta.ttl_attribute_name = if enabled { attribute_name } else { None };
    metadata_store::update_table_metadata(handle, &meta).await?;
    Ok(meta)
}

pub async fn update_table_streams(handle: &SqlHandle, name: &str, enabled: bool, view_type: Option<StreamViewType>) -> Result<TableMeta> {
    let mut meta = metadata_store::require_table_metadata(handle, name).await?;
    if enabled {
        let view_type = view_type.unwrap_or(StreamViewType::NewAndOldImages);
        item_table::create_stream_relation(handle, name).await.map_err(Error::Other)?;
        let now = Utc::now();
        meta.stream_enabled = true;
        meta.stream_view_type = Some(view_type);
        meta.stream_arn = Some(TableMeta::format_stream_arn(name, now.timestamp_millis()));
        meta.stream_label = Some(now.timestamp_millis().to_string());
    } else {
        meta.stream_enabled = false;
    }
    metadata_store::update_table_metadata(handle, &meta).await?;
    Ok(meta)
}
