//! Wire-level value objects for every item-engine operation, serialized
//! with the hosted SDK's field names (`camelCase`) so a caller already
//! speaking the hosted wire protocol gets drop-in request/response shapes.
//! Plain data plus `TryFrom`/`From` conversions into and out of the
//! `engine` crate's native request/response types — no transport of its
//! own, matching `estuary-flow`'s `crates/models` practice of keeping
//! control-plane value objects as serde-only structs separate from the
//! logic that acts on them.

pub mod batch;
pub mod item;
pub mod query;
pub mod stream;
pub mod table;
pub mod transact;

pub use batch::{BatchGetItemInput, BatchGetItemOutput, BatchWriteItemInput, BatchWriteItemOutput, KeysAndAttributes, WriteRequest};
pub use item::{DeleteItemInput, DeleteItemOutput, GetItemInput, GetItemOutput, PutItemInput, PutItemOutput, UpdateItemInput, UpdateItemOutput};
pub use query::{QueryInput, QueryOutput, ScanInput, ScanOutput};
pub use stream::{DescribeStreamInput, DescribeStreamOutput, GetRecordsInput, GetRecordsOutput, GetShardIteratorInput, GetShardIteratorOutput, ListStreamsInput, ListStreamsOutput, StreamDescription};
pub use table::{
    CreateTableInput, CreateTableOutput, DeleteTableInput, DeleteTableOutput, DescribeTableInput, DescribeTableOutput, GlobalSecondaryIndexDescription,
    ListTablesInput, ListTablesOutput, TableDescription, TimeToLiveSpecification, UpdateTableInput, UpdateTableOutput, UpdateTimeToLiveInput, UpdateTimeToLiveOutput,
};
pub use transact::{TransactGetItemsInput, TransactGetItemsOutput, TransactWriteItem, TransactWriteItemsInput, TransactWriteItemsOutput};
