//! Shared item validation rules from §4.6: key attributes must be present
//! scalars, no empty binary values or string-set elements anywhere in the
//! item, and the serialized item must stay under the size cap.

use types::limits::MAX_ITEM_BYTES;
use types::{attribute, AttributeMap, AttributeValue, Error, Result, TableMeta};

pub fn validate_item(table: &TableMeta, item: &AttributeMap) -> Result<()> {
    attribute::extract_scalar_key(item, &table.hash_key)?;
    if let Some(sort_key) = &table.sort_key {
        attribute::extract_scalar_key(item, sort_key)?;
    }
    for value in item.values() {
        check_value(value)?;
    }
    let size = store::item_dao::item_size_bytes(item)?;
    if size > MAX_ITEM_BYTES {
        return Err(Error::ItemTooLarge { size, max: MAX_ITEM_BYTES });
    }
    Ok(())
}

fn check_value(value: &AttributeValue) -> Result<()> {
    match value {
        AttributeValue::B(bytes) if bytes.is_empty() => Err(Error::invalid_item("binary attribute must not be zero-length")),
        AttributeValue::Ss(set) if set.iter().any(String::is_empty) => {
            Err(Error::invalid_item("string-set element must not be empty"))
        }
        AttributeValue::Bs(set) if set.iter().any(Vec::is_empty) => {
            Err(Error::invalid_item("binary-set element must not be zero-length"))
        }
        AttributeValue::L(items) => items.iter().try_for_each(check_value),
        AttributeValue::M(map) => map.values().try_for_each(check_value),
        _ => Ok(()),
    }
}
