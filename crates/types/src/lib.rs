pub mod attribute;
pub mod error;
pub mod item;
pub mod limits;
pub mod metadata;

pub use attribute::{AttributeMap, AttributeValue};
pub use error::{CancellationReason, Error, Result};
pub use item::{ChangeRecord, EventType, ItemRow};
pub use metadata::{GlobalSecondaryIndex, ProjectionType, StreamViewType, TableMeta};
