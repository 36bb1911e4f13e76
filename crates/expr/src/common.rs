use crate::tokenizer::Token;
use std::collections::HashMap;
use types::{AttributeValue, Error};

/// Resolves a bare identifier or `#name` placeholder into a concrete
/// attribute name.
pub fn resolve_attr(token: &Token, names: &HashMap<String, String>) -> Result<String, Error> {
    match token {
        Token::Ident(s) => Ok(s.clone()),
        Token::Name(n) => names
            .get(&format!("#{n}"))
            .cloned()
            .ok_or_else(|| Error::invalid_expression(format!("unresolved placeholder '#{n}'"))),
        other => Err(Error::invalid_expression(format!(
            "expected an attribute name, found {other:?}"
        ))),
    }
}

/// Resolves a `:value` placeholder into its bound attribute value.
pub fn resolve_value(token: &Token, values: &HashMap<String, AttributeValue>) -> Result<AttributeValue, Error> {
    match token {
        Token::Value(v) => values
            .get(&format!(":{v}"))
            .cloned()
            .ok_or_else(|| Error::invalid_expression(format!("unresolved placeholder ':{v}'"))),
        other => Err(Error::invalid_expression(format!(
            "expected a ':value' placeholder, found {other:?}"
        ))),
    }
}
