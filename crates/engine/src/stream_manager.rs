//! `describeStream`/`listStreams`/`getShardIterator`/`getRecords` over a
//! table's single logical shard (§4.7). Shard iterators are opaque
//! base64-encoded JSON payloads; nothing outside this module inspects them.

use serde::{Deserialize, Serialize};
use sql::SqlHandle;
use store::{metadata_store, relation_names, stream_dao};
use types::{ChangeRecord, Error, Result, TableMeta};

const SHARD_ID: &str = "shard-00000";
const DEFAULT_RECORDS_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardIteratorType {
    TrimHorizon,
    Latest,
    AtSequenceNumber,
    AfterSequenceNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShardIteratorPayload {
    table: String,
    shard: String,
    sequence: i64,
    iterator_type: String,
}

fn encode_iterator(table: &str, sequence: i64, iterator_type: &str) -> String {
    let payload = ShardIteratorPayload {
        table: table.to_string(),
        shard: SHARD_ID.to_string(),
        sequence,
        iterator_type: iterator_type.to_string(),
    };
    base64::encode(serde_json::to_vec(&payload).expect("shard iterator payload always serializes"))
}

fn decode_iterator(token: &str) -> Result<ShardIteratorPayload> {
    let bytes = base64::decode(token).map_err(|e| Error::validation(format!("malformed shard iterator: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::validation(format!("malformed shard iterator: {e}")))
}

#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub table_name: String,
    pub stream_arn: String,
    pub stream_label: String,
    pub shard_id: String,
    pub starting_sequence_number: Option<i64>,
    pub ending_sequence_number: Option<i64>,
}

async fn require_stream_enabled(handle: &SqlHandle, table_name: &str) -> Result<TableMeta> {
    let meta = metadata_store::require_table_metadata(handle, table_name).await?;
    if !meta.stream_enabled {
        return Err(Error::validation(format!("table '{table_name}' does not have streams enabled")));
    }
    Ok(meta)
}

pub async fn describe_stream(handle: &SqlHandle, table_name: &str) -> Result<StreamDescriptor> {
    let meta = require_stream_enabled(handle, table_name).await?;
    let relation = relation_names::stream_relation(table_name);
    let range = stream_dao::sequence_range(handle, &relation).await?;
    Ok(StreamDescriptor {
        table_name: table_name.to_string(),
        stream_arn: meta.stream_arn.unwrap_or_default(),
        stream_label: meta.stream_label.unwrap_or_default(),
        shard_id: SHARD_ID.to_string(),
        starting_sequence_number: range.map(|(lo, _)| lo),
        ending_sequence_number: range.map(|(_, hi)| hi),
    })
}

pub async fn list_streams(handle: &SqlHandle, table_name: Option<&str>) -> Result<Vec<StreamDescriptor>> {
    let tables = metadata_store::list_stream_enabled_tables(handle).await?;
    let mut descriptors = Vec::new();
    for meta in tables {
        if let Some(filter) = table_name {
            if meta.name != filter {
                continue;
            }
        }
        descriptors.push(describe_stream(handle, &meta.name).await?);
    }
    Ok(descriptors)
}

/// Resolves a shard-iterator request into an opaque token, per §4.7's
/// literal rules: `TRIM_HORIZON` starts at sequence 0, `LATEST` at
/// `max + 1`, `AT_SEQUENCE_NUMBER` at `seq - 1`, `AFTER_SEQUENCE_NUMBER` at
/// `seq`. All subsequent reads use strict `>`.
pub async fn get_shard_iterator(
    handle: &SqlHandle,
    table_name: &str,
    iterator_type: ShardIteratorType,
    sequence_number: Option<i64>,
) -> Result<String> {
    require_stream_enabled(handle, table_name).await?;
    let relation = relation_names::stream_relation(table_name);

    let sequence = match iterator_type {
        ShardIteratorType::TrimHorizon => 0,
        ShardIteratorType::Latest => {
            let range = stream_dao::sequence_range(handle, &relation).await?;
            range.map(|(_, hi)| hi).unwrap_or(0) + 1
        }
        ShardIteratorType::AtSequenceNumber => {
            let seq = sequence_number.ok_or_else(|| Error::validation("AT_SEQUENCE_NUMBER requires a sequence number"))?;
            seq - 1
        }
        ShardIteratorType::AfterSequenceNumber => {
            sequence_number.ok_or_else(|| Error::validation("AFTER_SEQUENCE_NUMBER requires a sequence number"))?
        }
    };

    Ok(encode_iterator(table_name, sequence, "AFTER_SEQUENCE_NUMBER"))
}

/// Reads up to `limit` (default 1000) records after the iterator's
/// sequence. The returned `next_shard_iterator` is `None` exactly when this
/// call returned zero records, signalling end-of-shard to the caller; a
/// non-empty page always yields a fresh iterator positioned after its last
/// record, to support long-polling.
pub async fn get_records(handle: &SqlHandle, iterator: &str, limit: Option<i64>) -> Result<(Vec<ChangeRecord>, Option<String>)> {
    let payload = decode_iterator(iterator)?;
    let relation = relation_names::stream_relation(&payload.table);
    let limit = limit.unwrap_or(DEFAULT_RECORDS_LIMIT);
    let records = stream_dao::fetch_records_after(handle, &relation, payload.sequence, limit).await?;

    let next_iterator = records
        .last()
        .map(|last| encode_iterator(&payload.table, last.sequence_number, "AFTER_SEQUENCE_NUMBER"));

    Ok((records, next_iterator))
}
