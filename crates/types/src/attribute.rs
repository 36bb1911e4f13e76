//! The attribute-value union and its wire codec.
//!
//! Mirrors the hosted service's tagged-union wire format (`{"S": "..."}`,
//! `{"N": "123"}`, ...) with a hand-written `Serialize`/`Deserialize` pair
//! rather than a derive, so the wire tags are exact and numbers stay strings.

use crate::error::Error;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An ordered attribute map, keyed by attribute name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    /// Numbers are carried as decimal strings to preserve precision.
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(AttributeMap),
    Ss(BTreeSet<String>),
    Ns(BTreeSet<String>),
    /// Byte-lexicographic ordering of `Vec<u8>` matches the spec's binary
    /// comparison semantics, so a `BTreeSet<Vec<u8>>` sorts the way DynamoDB
    /// would compare its elements.
    Bs(BTreeSet<Vec<u8>>),
}

impl AttributeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null => "NULL",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::Bs(_) => "BS",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, AttributeValue::S(_) | AttributeValue::N(_) | AttributeValue::B(_))
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            AttributeValue::S(s) => map.serialize_entry("S", s)?,
            AttributeValue::N(n) => map.serialize_entry("N", n)?,
            AttributeValue::B(b) => map.serialize_entry("B", &base64::encode(b))?,
            AttributeValue::Bool(b) => map.serialize_entry("BOOL", b)?,
            AttributeValue::Null => map.serialize_entry("NULL", &true)?,
            AttributeValue::L(l) => map.serialize_entry("L", l)?,
            AttributeValue::M(m) => map.serialize_entry("M", m)?,
            AttributeValue::Ss(s) => map.serialize_entry("SS", s)?,
            AttributeValue::Ns(n) => map.serialize_entry("NS", n)?,
            AttributeValue::Bs(b) => {
                let encoded: Vec<String> = b.iter().map(|v| base64::encode(v)).collect();
                map.serialize_entry("BS", &encoded)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttrVisitor;

        impl<'de> Visitor<'de> for AttrVisitor {
            type Value = AttributeValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a single-key attribute value object, e.g. {\"S\": \"...\"}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let key: String = map
                    .next_key()?
                    .ok_or_else(|| de::Error::custom("attribute value object has no tag"))?;
                let value = match key.as_str() {
                    "S" => AttributeValue::S(map.next_value()?),
                    "N" => AttributeValue::N(map.next_value()?),
                    "B" => {
                        let encoded: String = map.next_value()?;
                        AttributeValue::B(base64::decode(&encoded).map_err(de::Error::custom)?)
                    }
                    "BOOL" => AttributeValue::Bool(map.next_value()?),
                    "NULL" => {
                        let _: bool = map.next_value()?;
                        AttributeValue::Null
                    }
                    "L" => AttributeValue::L(map.next_value()?),
                    "M" => AttributeValue::M(map.next_value()?),
                    "SS" => AttributeValue::Ss(map.next_value()?),
                    "NS" => AttributeValue::Ns(map.next_value()?),
                    "BS" => {
                        let encoded: Vec<String> = map.next_value()?;
                        let mut set = BTreeSet::new();
                        for e in encoded {
                            set.insert(base64::decode(&e).map_err(de::Error::custom)?);
                        }
                        AttributeValue::Bs(set)
                    }
                    other => {
                        return Err(de::Error::unknown_variant(
                            other,
                            &["S", "N", "B", "BOOL", "NULL", "L", "M", "SS", "NS", "BS"],
                        ))
                    }
                };
                Ok(value)
            }
        }

        deserializer.deserialize_map(AttrVisitor)
    }
}

/// Serializes an attribute map to its wire JSON text.
pub fn to_json(map: &AttributeMap) -> Result<String, Error> {
    serde_json::to_string(map).map_err(|e| Error::invalid_item(format!("encoding attributes: {e}")))
}

/// Parses an attribute map from wire JSON text.
pub fn from_json(text: &str) -> Result<AttributeMap, Error> {
    serde_json::from_str(text).map_err(|e| Error::invalid_item(format!("decoding attributes: {e}")))
}

/// Extracts the scalar string rendering of a key attribute: `S`/`N` pass
/// through verbatim, `B` is rendered as UTF-8 (lossy) text. Fails if the
/// attribute is missing, non-scalar, or empty.
pub fn extract_scalar_key(map: &AttributeMap, attr: &str) -> Result<String, Error> {
    let value = map
        .get(attr)
        .ok_or_else(|| Error::invalid_item(format!("missing key attribute '{attr}'")))?;
    let rendered = match value {
        AttributeValue::S(s) => s.clone(),
        AttributeValue::N(n) => n.clone(),
        AttributeValue::B(b) => String::from_utf8_lossy(b).into_owned(),
        _ => {
            return Err(Error::invalid_item(format!(
                "key attribute '{attr}' must be a scalar S, N, or B value"
            )))
        }
    };
    if rendered.is_empty() {
        return Err(Error::invalid_item(format!(
            "key attribute '{attr}' must not be empty"
        )));
    }
    Ok(rendered)
}

/// Compares two `N` values as decimals rather than as strings, so `"1.0"`
/// and `"1"` canonicalize equal. Used by tests asserting round-trip
/// equivalence modulo number formatting.
pub fn canonical_number(n: &str) -> Result<bigdecimal::BigDecimal, Error> {
    n.parse()
        .map_err(|_| Error::invalid_item(format!("'{n}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let mut m = AttributeMap::new();
        m.insert("s".into(), AttributeValue::S("hello".into()));
        m.insert("n".into(), AttributeValue::N("123.45".into()));
        m.insert("b".into(), AttributeValue::B(b"bytes".to_vec()));
        m.insert("bool".into(), AttributeValue::Bool(true));
        m.insert("null".into(), AttributeValue::Null);
        m.insert(
            "l".into(),
            AttributeValue::L(vec![AttributeValue::S("x".into()), AttributeValue::N("1".into())]),
        );
        let mut nested = AttributeMap::new();
        nested.insert("inner".into(), AttributeValue::S("v".into()));
        m.insert("m".into(), AttributeValue::M(nested));
        m.insert(
            "ss".into(),
            AttributeValue::Ss(BTreeSet::from(["a".to_string(), "b".to_string()])),
        );
        m.insert(
            "ns".into(),
            AttributeValue::Ns(BTreeSet::from(["1".to_string(), "2".to_string()])),
        );
        m.insert(
            "bs".into(),
            AttributeValue::Bs(BTreeSet::from([b"x".to_vec(), b"y".to_vec()])),
        );

        let json = to_json(&m).unwrap();
        let decoded = from_json(&json).unwrap();
        assert_eq!(m, decoded);
    }

    #[test]
    fn wire_tags_match_hosted_service() {
        let mut m = AttributeMap::new();
        m.insert("name".into(), AttributeValue::S("Alice".into()));
        m.insert("age".into(), AttributeValue::N("30".into()));
        let json = to_json(&m).unwrap();
        assert_eq!(json, r#"{"age":{"N":"30"},"name":{"S":"Alice"}}"#);
    }

    #[test]
    fn extract_scalar_key_rejects_non_scalar() {
        let mut m = AttributeMap::new();
        m.insert("id".into(), AttributeValue::Bool(true));
        assert!(extract_scalar_key(&m, "id").is_err());
    }

    #[test]
    fn extract_scalar_key_rejects_missing() {
        let m = AttributeMap::new();
        assert!(extract_scalar_key(&m, "id").is_err());
    }
}
