//! Wire shapes for `describeStream`/`listStreams`/`getShardIterator`/`getRecords`.

use engine::stream_manager::{ShardIteratorType, StreamDescriptor};
use serde::{Deserialize, Serialize};
use types::{AttributeMap, ChangeRecord, EventType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescription {
    pub table_name: String,
    pub stream_arn: String,
    pub stream_label: String,
    pub shard_id: String,
    #[serde(default)]
    pub starting_sequence_number: Option<String>,
    #[serde(default)]
    pub ending_sequence_number: Option<String>,
}

impl From<StreamDescriptor> for StreamDescription {
    fn from(descriptor: StreamDescriptor) -> Self {
        Self {
            table_name: descriptor.table_name,
            stream_arn: descriptor.stream_arn,
            stream_label: descriptor.stream_label,
            shard_id: descriptor.shard_id,
            starting_sequence_number: descriptor.starting_sequence_number.map(|n| n.to_string()),
            ending_sequence_number: descriptor.ending_sequence_number.map(|n| n.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeStreamInput {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeStreamOutput {
    pub stream_description: StreamDescription,
}

impl From<StreamDescriptor> for DescribeStreamOutput {
    fn from(descriptor: StreamDescriptor) -> Self {
        Self { stream_description: descriptor.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStreamsInput {
    #[serde(default)]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStreamsOutput {
    pub streams: Vec<StreamDescription>,
}

impl From<Vec<StreamDescriptor>> for ListStreamsOutput {
    fn from(descriptors: Vec<StreamDescriptor>) -> Self {
        Self { streams: descriptors.into_iter().map(Into::into).collect() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetShardIteratorInput {
    pub table_name: String,
    pub shard_id: String,
    pub shard_iterator_type: ShardIteratorType,
    #[serde(default)]
    pub sequence_number: Option<String>,
}

impl GetShardIteratorInput {
    /// Hosted sequence numbers are opaque numeric strings; this engine
    /// stores them as `i64`, so parse at the wire boundary.
    pub fn sequence_number_as_i64(&self) -> Result<Option<i64>, std::num::ParseIntError> {
        self.sequence_number.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetShardIteratorOutput {
    pub shard_iterator: String,
}

impl From<String> for GetShardIteratorOutput {
    fn from(shard_iterator: String) -> Self {
        Self { shard_iterator }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRecordsInput {
    pub shard_iterator: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecordPayload {
    pub approximate_creation_date_time: i64,
    pub keys: AttributeMap,
    #[serde(default)]
    pub old_image: Option<AttributeMap>,
    #[serde(default)]
    pub new_image: Option<AttributeMap>,
    pub sequence_number: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordWire {
    pub event_id: String,
    pub event_name: EventType,
    pub dynamodb: StreamRecordPayload,
}

impl From<ChangeRecord> for RecordWire {
    fn from(record: ChangeRecord) -> Self {
        Self {
            event_id: record.event_id,
            event_name: record.event_type,
            dynamodb: StreamRecordPayload {
                approximate_creation_date_time: record.approximate_creation_time,
                keys: record.keys,
                old_image: record.old_image,
                new_image: record.new_image,
                sequence_number: record.sequence_number.to_string(),
                size_bytes: record.size_bytes,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRecordsOutput {
    pub records: Vec<RecordWire>,
    #[serde(default)]
    pub next_shard_iterator: Option<String>,
}

impl From<(Vec<ChangeRecord>, Option<String>)> for GetRecordsOutput {
    fn from((records, next_shard_iterator): (Vec<ChangeRecord>, Option<String>)) -> Self {
        Self { records: records.into_iter().map(Into::into).collect(), next_shard_iterator }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_shard_iterator_input_parses_sequence_number() {
        let json = r#"{"tableName":"Orders","shardId":"shard-00000","shardIteratorType":"AFTER_SEQUENCE_NUMBER","sequenceNumber":"42"}"#;
        let input: GetShardIteratorInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.sequence_number_as_i64().unwrap(), Some(42));
    }
}
