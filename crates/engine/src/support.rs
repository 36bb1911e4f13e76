//! Small pieces of logic shared by `item_manager`, `query`, `batch`, and
//! `transact`: TTL expiry, `ProjectionExpression` application, and rendering
//! an `AttributeValue` to the scalar string a key comparison needs.

use std::collections::HashMap;
use types::{AttributeMap, AttributeValue, Error, Result, TableMeta};

/// Per §4.6's `get` contract: an item is expired once its TTL attribute
/// parses as a number less than the current epoch second.
pub fn is_expired(table: &TableMeta, item: &AttributeMap, now_epoch_secs: i64) -> bool {
    if !table.ttl_enabled {
        return false;
    }
    let Some(attr) = &table.ttl_attribute_name else {
        return false;
    };
    match item.get(attr) {
        Some(AttributeValue::N(n)) => n.parse::<i64>().map(|v| v < now_epoch_secs).unwrap_or(false),
        _ => false,
    }
}

/// Applies a `ProjectionExpression` (a comma-separated list of top-level
/// attribute names, each possibly a `#placeholder`) to an item. `None` keeps
/// every attribute.
pub fn apply_projection_expression(item: &AttributeMap, expression: Option<&str>, names: &HashMap<String, String>) -> AttributeMap {
    let Some(expression) = expression else {
        return item.clone();
    };
    let wanted: Vec<String> = expression
        .split(',')
        .map(str::trim)
        .map(|token| names.get(token).cloned().unwrap_or_else(|| token.to_string()))
        .collect();
    item.iter()
        .filter(|(name, _)| wanted.iter().any(|w| w == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Renders a key-condition bind value to the string a relation's
/// `hash_key_value`/`sort_key_value` column holds, matching
/// `attribute::extract_scalar_key`'s rendering for the same variants.
pub fn render_scalar(value: &AttributeValue) -> Result<String> {
    match value {
        AttributeValue::S(s) => Ok(s.clone()),
        AttributeValue::N(n) => Ok(n.clone()),
        AttributeValue::B(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        _ => Err(Error::invalid_expression("key condition value must be a scalar S, N, or B value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_ttl() -> TableMeta {
        TableMeta {
            name: "Sessions".into(),
            hash_key: "id".into(),
            sort_key: None,
            global_secondary_indexes: vec![],
            ttl_enabled: true,
            ttl_attribute_name: Some("expiresAt".into()),
            stream_enabled: false,
            stream_view_type: None,
            stream_arn: None,
            stream_label: None,
            create_date: chrono::Utc::now(),
        }
    }

    #[test]
    fn item_with_past_ttl_is_expired() {
        let mut item = AttributeMap::new();
        item.insert("expiresAt".into(), AttributeValue::N("100".into()));
        assert!(is_expired(&table_with_ttl(), &item, 200));
    }

    #[test]
    fn item_with_future_ttl_is_not_expired() {
        let mut item = AttributeMap::new();
        item.insert("expiresAt".into(), AttributeValue::N("300".into()));
        assert!(!is_expired(&table_with_ttl(), &item, 200));
    }

    #[test]
    fn projection_expression_narrows_to_named_attributes() {
        let mut item = AttributeMap::new();
        item.insert("id".into(), AttributeValue::S("1".into()));
        item.insert("secret".into(), AttributeValue::S("shh".into()));
        let mut names = HashMap::new();
        names.insert("#i".to_string(), "id".to_string());
        let projected = apply_projection_expression(&item, Some("#i"), &names);
        assert!(projected.contains_key("id"));
        assert!(!projected.contains_key("secret"));
    }
}
