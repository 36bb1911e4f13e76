//! Hard limits enforced by validation (§4.6).

/// Maximum serialized size of a single item.
pub const MAX_ITEM_BYTES: usize = 400_000;

/// Maximum length of a hash or sort key value.
pub const MAX_KEY_VALUE_CHARS: usize = 2048;

pub const MAX_BATCH_WRITE_REQUESTS: usize = 25;
pub const MAX_BATCH_GET_KEYS: usize = 100;
pub const MAX_TRANSACT_ITEMS: usize = 25;

/// Age after which a change record is eligible for sweeping.
pub const STREAM_RECORD_MAX_AGE_SECS: i64 = 24 * 60 * 60;
