pub mod item_dao;
pub mod item_table;
pub mod metadata_store;
pub mod relation_names;
pub mod stream_dao;

pub use item_dao::{Page, SortKeyCondition};
