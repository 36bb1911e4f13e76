//! The item engine: translates hosted-service-style item requests into SQL
//! against the relation shapes `store` maintains, implementing every
//! operation grouped in §4 and §5 of the specification this crate follows.

pub mod batch;
pub mod index_maintenance;
pub mod item_manager;
pub mod projection;
pub mod query;
pub mod stream_capture;
pub mod stream_manager;
pub mod support;
pub mod table_manager;
pub mod transact;
pub mod validation;

pub use batch::{BatchGetRequestItem, BatchGetResponse, BatchWriteOp, BatchWriteRequestItem, BatchWriteResponse, batch_get_item, batch_write_item};
pub use item_manager::{
    DeleteItemRequest, DeleteItemResponse, GetItemRequest, GetItemResponse, PutItemRequest, PutItemResponse, ReturnValues, UpdateItemRequest, UpdateItemResponse,
    delete_item, get_item, put_item, sweep_expired_items, update_item,
};
pub use query::{QueryRequest, QueryResponse, ScanRequest, ScanResponse, query, scan};
pub use stream_manager::{ShardIteratorType, StreamDescriptor, describe_stream, get_records, get_shard_iterator, list_streams};
pub use table_manager::{CreateTableRequest, create_table, delete_table, describe_table, list_tables, update_table_streams, update_time_to_live};
pub use transact::{
    TransactGetRequestItem, TransactGetResponse, TransactWriteOp, TransactWriteRequestItem, transact_get_item, transact_write_item,
};
