pub mod dialect;
pub mod handle;
pub mod params;

pub use dialect::Dialect;
pub use handle::{
    execute_in_txn, fetch_all_in_txn, fetch_optional_in_txn, get_bool, get_i64, get_opt_string, get_string, SqlHandle,
    SqlTxn,
};
pub use params::{NamedParams, Param};
