//! Builds and appends one change record per write, honoring the table's
//! stream view type (§4.7). Capture happens inside the same SQL transaction
//! as the write it describes.

use chrono::Utc;
use sql::{Dialect, SqlTxn};
use store::stream_dao;
use types::{AttributeMap, ChangeRecord, EventType, Result, StreamViewType, TableMeta};

/// Appends a change record for a write against `table`, if streams are
/// enabled. `old_image`/`new_image` are the full pre/post attribute maps;
/// this function trims them to what the view type allows.
pub async fn capture_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    relation: &str,
    table: &TableMeta,
    event_type: EventType,
    hash_key_value: &str,
    sort_key_value: Option<&str>,
    keys: AttributeMap,
    old_image: Option<&AttributeMap>,
    new_image: Option<&AttributeMap>,
) -> Result<()> {
    if !table.stream_enabled {
        return Ok(());
    }
    let view_type = table.stream_view_type.unwrap_or(StreamViewType::KeysOnly);
    let size_bytes = new_image
        .or(old_image)
        .map(|image| store::item_dao::item_size_bytes(image))
        .transpose()?
        .unwrap_or(0);

    let record = ChangeRecord {
        sequence_number: 0,
        event_id: uuid::Uuid::new_v4().to_string(),
        event_type,
        event_timestamp: Utc::now(),
        approximate_creation_time: Utc::now().timestamp_millis(),
        hash_key_value: hash_key_value.to_string(),
        sort_key_value: sort_key_value.map(str::to_string),
        keys,
        old_image: if view_type.carries_old_image() { old_image.cloned() } else { None },
        new_image: if view_type.carries_new_image() { new_image.cloned() } else { None },
        size_bytes,
    };

    stream_dao::append_record_in_txn(txn, dialect, relation, &record).await?;
    Ok(())
}
