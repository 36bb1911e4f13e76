//! The key-condition parser: `hashAttr = :bind [AND sortExpr]`.

use crate::common::{resolve_attr, resolve_value};
use crate::tokenizer::{tokenize, Cursor, Token};
use std::collections::HashMap;
use types::{AttributeValue, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn sql_operator(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub enum SortCondition {
    Eq(AttributeValue),
    Compare(CompareOp, AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

#[derive(Debug, Clone)]
pub struct KeyCondition {
    pub hash_attr: String,
    pub hash_value: AttributeValue,
    pub sort_attr: Option<String>,
    pub sort: Option<SortCondition>,
}

impl KeyCondition {
    /// A SQL fragment testing `sort_key_value` against this condition, using
    /// the named placeholders in the accompanying `sort_binds`. `None` if
    /// there is no sort condition.
    pub fn sort_sql_fragment(&self) -> Option<(String, Vec<(&'static str, AttributeValue)>)> {
        let sort = self.sort.as_ref()?;
        Some(match sort {
            SortCondition::Eq(v) => ("sort_key_value = :kc_sort".to_string(), vec![("kc_sort", v.clone())]),
            SortCondition::Compare(op, v) => (
                format!("sort_key_value {} :kc_sort", op.sql_operator()),
                vec![("kc_sort", v.clone())],
            ),
            SortCondition::Between(lo, hi) => (
                "sort_key_value BETWEEN :kc_lo AND :kc_hi".to_string(),
                vec![("kc_lo", lo.clone()), ("kc_hi", hi.clone())],
            ),
            SortCondition::BeginsWith(prefix) => (
                "substr(sort_key_value, 1, length(:kc_prefix)) = :kc_prefix".to_string(),
                vec![("kc_prefix", prefix.clone())],
            ),
        })
    }
}

pub fn parse(
    expression: &str,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<KeyCondition, Error> {
    let tokens = tokenize(expression)?;
    let mut cur = Cursor::new(&tokens);

    let hash_attr = resolve_attr(&cur.advance(), names)?;
    cur.expect(&Token::Eq)?;
    let hash_value_token = cur.advance();
    let hash_value = resolve_value(&hash_value_token, values)?;
    require_scalar(&hash_value, &hash_attr)?;

    let (sort_attr, sort) = if cur.eat_keyword("AND") {
        let attr = resolve_attr(&cur.advance(), names)?;
        let sort = parse_sort_expr(&mut cur, &attr, values)?;
        (Some(attr), Some(sort))
    } else {
        (None, None)
    };

    if !cur.at_eof() {
        return Err(Error::invalid_expression(
            "unexpected trailing tokens in key condition expression",
        ));
    }

    Ok(KeyCondition {
        hash_attr,
        hash_value,
        sort_attr,
        sort,
    })
}

fn parse_sort_expr(
    cur: &mut Cursor<'_>,
    attr: &str,
    values: &HashMap<String, AttributeValue>,
) -> Result<SortCondition, Error> {
    if cur.peek_keyword("BEGINS_WITH") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        // The attribute was already consumed by the caller to name this sort
        // condition; begins_with repeats it as its first argument.
        let _attr_again = cur.advance();
        cur.expect(&Token::Comma)?;
        let prefix = resolve_value(&cur.advance(), values)?;
        cur.expect(&Token::RParen)?;
        return Ok(SortCondition::BeginsWith(prefix));
    }

    match cur.advance() {
        Token::Eq => Ok(SortCondition::Eq(resolve_value(&cur.advance(), values)?)),
        Token::Lt => Ok(SortCondition::Compare(CompareOp::Lt, resolve_value(&cur.advance(), values)?)),
        Token::Gt => Ok(SortCondition::Compare(CompareOp::Gt, resolve_value(&cur.advance(), values)?)),
        Token::Le => Ok(SortCondition::Compare(CompareOp::Le, resolve_value(&cur.advance(), values)?)),
        Token::Ge => Ok(SortCondition::Compare(CompareOp::Ge, resolve_value(&cur.advance(), values)?)),
        Token::Ident(word) if word.eq_ignore_ascii_case("BETWEEN") => {
            let lo = resolve_value(&cur.advance(), values)?;
            if !cur.eat_keyword("AND") {
                return Err(Error::invalid_expression("expected AND in BETWEEN clause"));
            }
            let hi = resolve_value(&cur.advance(), values)?;
            Ok(SortCondition::Between(lo, hi))
        }
        other => Err(Error::invalid_expression(format!(
            "unsupported sort key condition for '{attr}', found {other:?}"
        ))),
    }
}

fn require_scalar(value: &AttributeValue, attr: &str) -> Result<(), Error> {
    if value.is_scalar() {
        Ok(())
    } else {
        Err(Error::invalid_expression(format!(
            "key condition value for '{attr}' must be a scalar S, N, or B value"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn parses_hash_only() {
        let vals = values(&[(":u", AttributeValue::S("u1".into()))]);
        let kc = parse("uid = :u", &HashMap::new(), &vals).unwrap();
        assert_eq!(kc.hash_attr, "uid");
        assert!(kc.sort.is_none());
    }

    #[test]
    fn parses_between_sort_condition() {
        let vals = values(&[
            (":u", AttributeValue::S("u1".into())),
            (":a", AttributeValue::S("2024-01-02".into())),
            (":b", AttributeValue::S("2024-01-04".into())),
        ]);
        let kc = parse("uid = :u AND ts BETWEEN :a AND :b", &HashMap::new(), &vals).unwrap();
        assert!(matches!(kc.sort, Some(SortCondition::Between(_, _))));
        let (sql, binds) = kc.sort_sql_fragment().unwrap();
        assert_eq!(sql, "sort_key_value BETWEEN :kc_lo AND :kc_hi");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn resolves_placeholders() {
        let mut names = HashMap::new();
        names.insert("#u".to_string(), "uid".to_string());
        let vals = values(&[(":u", AttributeValue::S("u1".into()))]);
        let kc = parse("#u = :u", &names, &vals).unwrap();
        assert_eq!(kc.hash_attr, "uid");
    }

    #[test]
    fn fails_on_missing_hash_condition() {
        assert!(parse("", &HashMap::new(), &HashMap::new()).is_err());
    }

    #[test]
    fn fails_on_unresolved_placeholder() {
        let vals = values(&[]);
        assert!(parse("uid = :u", &HashMap::new(), &vals).is_err());
    }
}
