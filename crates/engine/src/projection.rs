//! Applies a global secondary index's projection policy to a full attribute
//! map (§4.5). `ALL` keeps everything; `KEYS_ONLY` keeps the primary and
//! index key attributes; `INCLUDE` adds the index's listed non-key
//! attributes on top of the keys.

use types::{AttributeMap, GlobalSecondaryIndex, ProjectionType, TableMeta};

/// Projects `attributes` per `index`'s policy. `table` supplies the primary
/// table's hash/sort attribute names, which `KEYS_ONLY`/`INCLUDE` always
/// keep alongside the index's own key attributes.
pub fn project(attributes: &AttributeMap, table: &TableMeta, index: &GlobalSecondaryIndex) -> AttributeMap {
    match index.projection_type {
        ProjectionType::All => attributes.clone(),
        ProjectionType::KeysOnly => {
            let mut keys: Vec<&str> = vec![table.hash_key.as_str()];
            if let Some(sort) = &table.sort_key {
                keys.push(sort.as_str());
            }
            keys.push(index.hash_key_attr.as_str());
            if let Some(sort) = &index.sort_key_attr {
                keys.push(sort.as_str());
            }
            keep_only(attributes, &keys)
        }
        ProjectionType::Include => {
            let mut keys: Vec<&str> = vec![table.hash_key.as_str()];
            if let Some(sort) = &table.sort_key {
                keys.push(sort.as_str());
            }
            keys.push(index.hash_key_attr.as_str());
            if let Some(sort) = &index.sort_key_attr {
                keys.push(sort.as_str());
            }
            if let Some(extra) = &index.non_key_attributes {
                keys.extend(extra.iter().map(String::as_str));
            }
            keep_only(attributes, &keys)
        }
    }
}

fn keep_only(attributes: &AttributeMap, keys: &[&str]) -> AttributeMap {
    attributes
        .iter()
        .filter(|(name, _)| keys.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::AttributeValue;

    fn table() -> TableMeta {
        TableMeta {
            name: "Orders".into(),
            hash_key: "id".into(),
            sort_key: None,
            global_secondary_indexes: vec![],
            ttl_enabled: false,
            ttl_attribute_name: None,
            stream_enabled: false,
            stream_view_type: None,
            stream_arn: None,
            stream_label: None,
            create_date: chrono::Utc::now(),
        }
    }

    fn item() -> AttributeMap {
        let mut m = AttributeMap::new();
        m.insert("id".into(), AttributeValue::S("1".into()));
        m.insert("email".into(), AttributeValue::S("a@x".into()));
        m.insert("secret".into(), AttributeValue::S("shh".into()));
        m
    }

    #[test]
    fn all_keeps_everything() {
        let idx = GlobalSecondaryIndex {
            index_name: "byEmail".into(),
            hash_key_attr: "email".into(),
            sort_key_attr: None,
            projection_type: ProjectionType::All,
            non_key_attributes: None,
        };
        assert_eq!(project(&item(), &table(), &idx), item());
    }

    #[test]
    fn keys_only_drops_non_key_attributes() {
        let idx = GlobalSecondaryIndex {
            index_name: "byEmail".into(),
            hash_key_attr: "email".into(),
            sort_key_attr: None,
            projection_type: ProjectionType::KeysOnly,
            non_key_attributes: None,
        };
        let projected = project(&item(), &table(), &idx);
        assert!(!projected.contains_key("secret"));
        assert!(projected.contains_key("id"));
        assert!(projected.contains_key("email"));
    }

    #[test]
    fn include_adds_listed_attributes() {
        let idx = GlobalSecondaryIndex {
            index_name: "byEmail".into(),
            hash_key_attr: "email".into(),
            sort_key_attr: None,
            projection_type: ProjectionType::Include,
            non_key_attributes: Some(vec!["secret".into()]),
        };
        let projected = project(&item(), &table(), &idx);
        assert!(projected.contains_key("secret"));
    }

    #[test]
    fn missing_attributes_are_simply_absent() {
        let idx = GlobalSecondaryIndex {
            index_name: "byPhone".into(),
            hash_key_attr: "phone".into(),
            sort_key_attr: None,
            projection_type: ProjectionType::KeysOnly,
            non_key_attributes: None,
        };
        let projected = project(&item(), &table(), &idx);
        assert!(!projected.contains_key("phone"));
    }
}
