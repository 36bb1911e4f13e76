//! Derives physical relation names from a logical table name, per §4.2:
//! sanitize to `[a-zA-Z0-9_-]`, lowercase, and prefix.

/// Sanitizes a logical table name to the characters SQL identifiers allow.
pub fn sanitize(table_name: &str) -> String {
    table_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

pub fn item_relation(table_name: &str) -> String {
    format!("pdb_item_{}", sanitize(table_name))
}

pub fn index_relation(table_name: &str, index_name: &str) -> String {
    format!("pdb_item_{}_gsi_{}", sanitize(table_name), sanitize(index_name))
}

pub fn stream_relation(table_name: &str) -> String {
    format!("pdb_stream_{}", sanitize(table_name))
}

/// The prefix used to discover all index relations of a table via the
/// information schema, for drop-cascade and sweeper bookkeeping.
pub fn index_relation_prefix(table_name: &str) -> String {
    format!("pdb_item_{}_gsi_", sanitize(table_name))
}
