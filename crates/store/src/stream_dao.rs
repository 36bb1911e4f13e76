//! Persistence for a table's change stream (§4.7): appending records inside
//! the same transaction as the write that produced them, and the
//! shard-iterator-friendly reads `getRecords`/`describeStream` need.

use chrono::Utc;
use sql::{get_i64, get_opt_string, get_string, Dialect, NamedParams, SqlTxn};
use sqlx::Row;
use types::{attribute, AttributeMap, ChangeRecord, Error, EventType, Result};

fn event_type_str(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Insert => "INSERT",
        EventType::Modify => "MODIFY",
        EventType::Remove => "REMOVE",
    }
}

fn parse_event_type(text: &str) -> Result<EventType> {
    match text {
        "INSERT" => Ok(EventType::Insert),
        "MODIFY" => Ok(EventType::Modify),
        "REMOVE" => Ok(EventType::Remove),
        other => Err(Error::Other(anyhow::anyhow!("unknown stream event type '{other}'"))),
    }
}

/// Appends one change record inside the caller's transaction, returning the
/// sequence number the SQL engine assigned.
pub async fn append_record_in_txn(txn: &mut SqlTxn<'_>, dialect: Dialect, relation: &str, record: &ChangeRecord) -> Result<i64> {
    let keys_json = attribute::to_json(&record.keys)?;
    let old_image_json = record.old_image.as_ref().map(attribute::to_json).transpose()?;
    let new_image_json = record.new_image.as_ref().map(attribute::to_json).transpose()?;

    let keys_bind = dialect.json_bind_expr("keys_json");
    let old_bind = dialect.json_bind_expr("old_image_json");
    let new_bind = dialect.json_bind_expr("new_image_json");
    let sql = format!(
        "insert into {relation} \
         (event_id, event_type, event_timestamp, approximate_creation_time, create_date, \
          hash_key_value, sort_key_value, keys_json, old_image_json, new_image_json, size_bytes) \
         values (:event_id, :event_type, :event_timestamp, :approximate_creation_time, :create_date, \
          :hash_key_value, :sort_key_value, {keys_bind}, {old_bind}, {new_bind}, :size_bytes) \
         returning sequence_number"
    );
    let params = NamedParams::new()
        .bind("event_id", record.event_id.as_str())
        .bind("event_type", event_type_str(record.event_type))
        .bind("event_timestamp", record.event_timestamp.to_rfc3339())
        .bind("approximate_creation_time", record.approximate_creation_time)
        .bind("create_date", Utc::now().to_rfc3339())
        .bind("hash_key_value", record.hash_key_value.as_str())
        .bind("sort_key_value", record.sort_key_value.clone())
        .bind("keys_json", keys_json)
        .bind("old_image_json", old_image_json)
        .bind("new_image_json", new_image_json)
        .bind("size_bytes", record.size_bytes as i64);

    let row = sql::fetch_optional_in_txn(txn, dialect, &sql, &params)
        .await
        .map_err(Error::Other)?
        .ok_or_else(|| Error::Other(anyhow::anyhow!("insert into {relation} did not return a sequence number")))?;
    get_i64(&row, "sequence_number").map_err(Error::Other)
}

fn decode_record(row: &sqlx::any::AnyRow) -> Result<ChangeRecord> {
    let sequence_number = get_i64(row, "sequence_number").map_err(Error::Other)?;
    let event_id = get_string(row, "event_id").map_err(Error::Other)?;
    let event_type = parse_event_type(&get_string(row, "event_type").map_err(Error::Other)?)?;
    let event_timestamp = parse_timestamp(&get_string(row, "event_timestamp").map_err(Error::Other)?)?;
    let approximate_creation_time = get_i64(row, "approximate_creation_time").map_err(Error::Other)?;
    let hash_key_value = get_string(row, "hash_key_value").map_err(Error::Other)?;
    let sort_key_value = get_opt_string(row, "sort_key_value").map_err(Error::Other)?;
    let keys = attribute::from_json(&get_string(row, "keys_json").map_err(Error::Other)?)?;
    let old_image = decode_optional_image(row, "old_image_json")?;
    let new_image = decode_optional_image(row, "new_image_json")?;
    let size_bytes = get_i64(row, "size_bytes").map_err(Error::Other)? as usize;

    Ok(ChangeRecord {
        sequence_number,
        event_id,
        event_type,
        event_timestamp,
        approximate_creation_time,
        hash_key_value,
        sort_key_value,
        keys,
        old_image,
        new_image,
        size_bytes,
    })
}

fn decode_optional_image(row: &sqlx::any::AnyRow, column: &str) -> Result<Option<AttributeMap>> {
    get_opt_string(row, column)
        .map_err(Error::Other)?
        .map(|text| attribute::from_json(&text))
        .transpose()
}

fn parse_timestamp(text: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(e.into()))
}

const RECORD_COLUMNS: &str = "sequence_number, event_id, event_type, event_timestamp, approximate_creation_time, \
     hash_key_value, sort_key_value, keys_json, old_image_json, new_image_json, size_bytes";

/// Reads up to `limit` records strictly after `after_sequence`, ascending —
/// the access pattern behind a shard iterator's `getRecords`.
pub async fn fetch_records_after(handle: &sql::SqlHandle, relation: &str, after_sequence: i64, limit: i64) -> Result<Vec<ChangeRecord>> {
    let sql = format!(
        "select {RECORD_COLUMNS} from {relation} where sequence_number > :after order by sequence_number asc limit :limit"
    );
    let params = NamedParams::new().bind("after", after_sequence).bind("limit", limit);
    let rows = handle.fetch_all(&sql, &params).await.map_err(Error::Other)?;
    rows.iter().map(decode_record).collect()
}

/// The inclusive `(oldest, newest)` sequence number range currently stored,
/// used to translate `TRIM_HORIZON`/`LATEST` into a concrete sequence and to
/// answer `describeStream`.
pub async fn sequence_range(handle: &sql::SqlHandle, relation: &str) -> Result<Option<(i64, i64)>> {
    let sql = format!("select min(sequence_number) as oldest, max(sequence_number) as newest from {relation}");
    let row = handle
        .fetch_optional(&sql, &NamedParams::new())
        .await
        .map_err(Error::Other)?;
    let Some(row) = row else { return Ok(None) };
    let oldest: Option<i64> = row.try_get("oldest").map_err(|e| Error::Other(e.into()))?;
    let newest: Option<i64> = row.try_get("newest").map_err(|e| Error::Other(e.into()))?;
    Ok(oldest.zip(newest))
}

/// Deletes records older than `cutoff_epoch_millis`, for the stream
/// sweeper's retention pass.
pub async fn delete_older_than(handle: &sql::SqlHandle, relation: &str, cutoff_epoch_millis: i64) -> Result<u64> {
    let sql = format!("delete from {relation} where approximate_creation_time < :cutoff");
    let params = NamedParams::new().bind("cutoff", cutoff_epoch_millis);
    handle.execute(&sql, &params).await.map_err(Error::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_table::create_stream_relation;
    use sql::SqlHandle;
    use sqlx::any::AnyPoolOptions;
    use sqlx::Row;
    use types::AttributeValue;

    async fn test_handle() -> SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    fn sample_record(hash: &str) -> ChangeRecord {
        let mut keys = AttributeMap::new();
        keys.insert("pk".into(), AttributeValue::S(hash.into()));
        ChangeRecord {
            sequence_number: 0,
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: EventType::Insert,
            event_timestamp: Utc::now(),
            approximate_creation_time: Utc::now().timestamp_millis(),
            hash_key_value: hash.to_string(),
            sort_key_value: None,
            keys,
            old_image: None,
            new_image: None,
            size_bytes: 42,
        }
    }

    #[tokio::test]
    async fn appends_and_reads_records_in_order() {
        let handle = test_handle().await;
        create_stream_relation(&handle, "Orders").await.unwrap();
        let relation = "pdb_stream_orders";

        let mut txn = handle.begin().await.unwrap();
        let first = append_record_in_txn(&mut txn, handle.dialect(), relation, &sample_record("u1")).await.unwrap();
        let second = append_record_in_txn(&mut txn, handle.dialect(), relation, &sample_record("u2")).await.unwrap();
        txn.commit().await.unwrap();
        assert!(second > first);

        let records = fetch_records_after(&handle, relation, first - 1, 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hash_key_value, "u1");

        let range = sequence_range(&handle, relation).await.unwrap().unwrap();
        assert_eq!(range, (first, second));
    }
}
