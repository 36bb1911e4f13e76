//! The condition/filter parser: boolean expressions with precedence
//! `OR < AND < NOT < primary`, used for both `ConditionExpression` on writes
//! and `FilterExpression` on query/scan.

use crate::common::{resolve_attr, resolve_value};
use crate::tokenizer::{tokenize, Cursor, Token};
use bigdecimal::BigDecimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use types::{AttributeMap, AttributeValue, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Operand {
    Attr(String),
    Literal(AttributeValue),
}

#[derive(Debug, Clone)]
pub enum ConditionExpr {
    True,
    And(Box<ConditionExpr>, Box<ConditionExpr>),
    Or(Box<ConditionExpr>, Box<ConditionExpr>),
    Not(Box<ConditionExpr>),
    Compare(Operand, Cmp, Operand),
    Between(Operand, Operand, Operand),
    AttributeExists(String),
    AttributeNotExists(String),
    BeginsWith(Operand, Operand),
    Contains(Operand, Operand),
}

/// Parses a condition or filter expression. A `None` expression is the null
/// condition, which always evaluates true.
pub fn parse(
    expression: Option<&str>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<ConditionExpr, Error> {
    let Some(expression) = expression else {
        return Ok(ConditionExpr::True);
    };
    let tokens = tokenize(expression)?;
    let mut cur = Cursor::new(&tokens);
    let expr = parse_or(&mut cur, names, values)?;
    if !cur.at_eof() {
        return Err(Error::invalid_expression("unexpected trailing tokens in condition expression"));
    }
    Ok(expr)
}

fn parse_or(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<ConditionExpr, Error> {
    let mut lhs = parse_and(cur, names, values)?;
    while cur.eat_keyword("OR") {
        let rhs = parse_and(cur, names, values)?;
        lhs = ConditionExpr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<ConditionExpr, Error> {
    let mut lhs = parse_not(cur, names, values)?;
    while cur.eat_keyword("AND") {
        let rhs = parse_not(cur, names, values)?;
        lhs = ConditionExpr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_not(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<ConditionExpr, Error> {
    if cur.eat_keyword("NOT") {
        return Ok(ConditionExpr::Not(Box::new(parse_not(cur, names, values)?)));
    }
    parse_primary(cur, names, values)
}

fn parse_primary(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<ConditionExpr, Error> {
    if matches!(cur.peek(), Token::LParen) {
        cur.advance();
        let inner = parse_or(cur, names, values)?;
        cur.expect(&Token::RParen)?;
        return Ok(inner);
    }
    if cur.peek_keyword("attribute_exists") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        let attr = resolve_attr(&cur.advance(), names)?;
        cur.expect(&Token::RParen)?;
        return Ok(ConditionExpr::AttributeExists(attr));
    }
    if cur.peek_keyword("attribute_not_exists") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        let attr = resolve_attr(&cur.advance(), names)?;
        cur.expect(&Token::RParen)?;
        return Ok(ConditionExpr::AttributeNotExists(attr));
    }
    if cur.peek_keyword("begins_with") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        let attr = parse_operand(cur, names, values)?;
        cur.expect(&Token::Comma)?;
        let prefix = parse_operand(cur, names, values)?;
        cur.expect(&Token::RParen)?;
        return Ok(ConditionExpr::BeginsWith(attr, prefix));
    }
    if cur.peek_keyword("contains") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        let attr = parse_operand(cur, names, values)?;
        cur.expect(&Token::Comma)?;
        let needle = parse_operand(cur, names, values)?;
        cur.expect(&Token::RParen)?;
        return Ok(ConditionExpr::Contains(attr, needle));
    }

    // A comparison or a BETWEEN, which binds tighter than the ambient AND.
    let lhs = parse_operand(cur, names, values)?;
    if cur.peek_keyword("BETWEEN") {
        cur.advance();
        let lo = parse_operand(cur, names, values)?;
        if !cur.eat_keyword("AND") {
            return Err(Error::invalid_expression("expected AND in BETWEEN clause"));
        }
        let hi = parse_operand(cur, names, values)?;
        return Ok(ConditionExpr::Between(lhs, lo, hi));
    }
    let cmp = match cur.advance() {
        Token::Eq => Cmp::Eq,
        Token::Ne => Cmp::Ne,
        Token::Lt => Cmp::Lt,
        Token::Gt => Cmp::Gt,
        Token::Le => Cmp::Le,
        Token::Ge => Cmp::Ge,
        other => {
            return Err(Error::invalid_expression(format!(
                "expected a comparison operator or BETWEEN, found {other:?}"
            )))
        }
    };
    let rhs = parse_operand(cur, names, values)?;
    Ok(ConditionExpr::Compare(lhs, cmp, rhs))
}

fn parse_operand(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<Operand, Error> {
    if let Token::Value(_) = cur.peek() {
        Ok(Operand::Literal(resolve_value(&cur.advance(), values)?))
    } else {
        Ok(Operand::Attr(resolve_attr(&cur.advance(), names)?))
    }
}

fn resolve_operand(op: &Operand, item: &AttributeMap) -> Option<AttributeValue> {
    match op {
        Operand::Literal(v) => Some(v.clone()),
        Operand::Attr(attr) => item.get(attr).cloned(),
    }
}

fn ordering_of(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::S(x), AttributeValue::S(y)) => Some(x.cmp(y)),
        (AttributeValue::B(x), AttributeValue::B(y)) => Some(x.cmp(y)),
        (AttributeValue::N(x), AttributeValue::N(y)) => {
            let (x, y) = (BigDecimal::from_str(x).ok()?, BigDecimal::from_str(y).ok()?);
            Some(x.cmp(&y))
        }
        _ => None,
    }
}

impl ConditionExpr {
    pub fn evaluate(&self, item: &AttributeMap) -> bool {
        match self {
            ConditionExpr::True => true,
            ConditionExpr::And(a, b) => a.evaluate(item) && b.evaluate(item),
            ConditionExpr::Or(a, b) => a.evaluate(item) || b.evaluate(item),
            ConditionExpr::Not(a) => !a.evaluate(item),
            ConditionExpr::Compare(a, cmp, b) => evaluate_compare(a, *cmp, b, item),
            ConditionExpr::Between(v, lo, hi) => evaluate_between(v, lo, hi, item),
            ConditionExpr::AttributeExists(attr) => item.contains_key(attr),
            ConditionExpr::AttributeNotExists(attr) => !item.contains_key(attr),
            ConditionExpr::BeginsWith(attr, prefix) => evaluate_begins_with(attr, prefix, item),
            ConditionExpr::Contains(attr, needle) => evaluate_contains(attr, needle, item),
        }
    }
}

fn evaluate_compare(a: &Operand, cmp: Cmp, b: &Operand, item: &AttributeMap) -> bool {
    let (Some(a), Some(b)) = (resolve_operand(a, item), resolve_operand(b, item)) else {
        return false;
    };
    match cmp {
        Cmp::Eq => a == b,
        Cmp::Ne => a != b,
        Cmp::Lt => ordering_of(&a, &b) == Some(Ordering::Less),
        Cmp::Gt => ordering_of(&a, &b) == Some(Ordering::Greater),
        Cmp::Le => matches!(ordering_of(&a, &b), Some(Ordering::Less | Ordering::Equal)),
        Cmp::Ge => matches!(ordering_of(&a, &b), Some(Ordering::Greater | Ordering::Equal)),
    }
}

fn evaluate_between(v: &Operand, lo: &Operand, hi: &Operand, item: &AttributeMap) -> bool {
    let (Some(v), Some(lo), Some(hi)) = (
        resolve_operand(v, item),
        resolve_operand(lo, item),
        resolve_operand(hi, item),
    ) else {
        return false;
    };
    matches!(
        (ordering_of(&v, &lo), ordering_of(&v, &hi)),
        (Some(Ordering::Greater | Ordering::Equal), Some(Ordering::Less | Ordering::Equal))
    )
}

fn evaluate_begins_with(attr: &Operand, prefix: &Operand, item: &AttributeMap) -> bool {
    let (Some(attr), Some(prefix)) = (resolve_operand(attr, item), resolve_operand(prefix, item)) else {
        return false;
    };
    match (attr, prefix) {
        (AttributeValue::S(s), AttributeValue::S(p)) => s.starts_with(p.as_str()),
        (AttributeValue::B(s), AttributeValue::B(p)) => s.starts_with(p.as_slice()),
        _ => false,
    }
}

fn evaluate_contains(attr: &Operand, needle: &Operand, item: &AttributeMap) -> bool {
    let (Some(attr), Some(needle)) = (resolve_operand(attr, item), resolve_operand(needle, item)) else {
        return false;
    };
    match (attr, needle) {
        (AttributeValue::S(s), AttributeValue::S(n)) => s.contains(n.as_str()),
        (AttributeValue::Ss(set), AttributeValue::S(n)) => set.contains(&n),
        (AttributeValue::Ns(set), AttributeValue::N(n)) => set.contains(&n),
        (AttributeValue::Bs(set), AttributeValue::B(n)) => set.contains(&n),
        (AttributeValue::L(list), n) => list.contains(&n),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn null_expression_is_always_true() {
        let expr = parse(None, &HashMap::new(), &HashMap::new()).unwrap();
        assert!(expr.evaluate(&AttributeMap::new()));
    }

    #[test]
    fn attribute_not_exists_true_when_missing() {
        let expr = parse(Some("attribute_not_exists(id)"), &HashMap::new(), &HashMap::new()).unwrap();
        assert!(expr.evaluate(&AttributeMap::new()));
    }

    #[test]
    fn missing_attribute_fails_comparison() {
        let vals = values(&[(":v", AttributeValue::N("1".into()))]);
        let expr = parse(Some("age = :v"), &HashMap::new(), &vals).unwrap();
        assert!(!expr.evaluate(&AttributeMap::new()));
    }

    #[test]
    fn mismatched_types_compare_unequal() {
        let mut item = AttributeMap::new();
        item.insert("v".into(), AttributeValue::N("1".into()));
        let vals = values(&[(":v", AttributeValue::S("1".into()))]);
        let expr = parse(Some("v = :v"), &HashMap::new(), &vals).unwrap();
        assert!(!expr.evaluate(&item));
        let expr_ne = parse(Some("v <> :v"), &HashMap::new(), &vals).unwrap();
        assert!(expr_ne.evaluate(&item));
    }

    #[test]
    fn between_binds_tighter_than_and() {
        let mut item = AttributeMap::new();
        item.insert("a".into(), AttributeValue::N("5".into()));
        item.insert("flag".into(), AttributeValue::Bool(true));
        let vals = values(&[
            (":lo", AttributeValue::N("1".into())),
            (":hi", AttributeValue::N("10".into())),
            (":t", AttributeValue::Bool(true)),
        ]);
        let expr = parse(Some("a BETWEEN :lo AND :hi AND flag = :t"), &HashMap::new(), &vals).unwrap();
        assert!(expr.evaluate(&item));
    }

    #[test]
    fn or_has_lower_precedence_than_and() {
        let mut item = AttributeMap::new();
        item.insert("a".into(), AttributeValue::Bool(true));
        let vals = values(&[
            (":t", AttributeValue::Bool(true)),
            (":f", AttributeValue::Bool(false)),
        ]);
        // a = :t OR (a = :f AND a = :f) -> true via the left disjunct.
        let expr = parse(Some("a = :t OR a = :f AND a = :f"), &HashMap::new(), &vals).unwrap();
        assert!(expr.evaluate(&item));
    }

    #[test]
    fn contains_checks_set_membership() {
        let mut item = AttributeMap::new();
        item.insert(
            "tags".into(),
            AttributeValue::Ss(std::collections::BTreeSet::from(["a".to_string(), "b".to_string()])),
        );
        let vals = values(&[(":t", AttributeValue::S("a".into()))]);
        let expr = parse(Some("contains(tags, :t)"), &HashMap::new(), &vals).unwrap();
        assert!(expr.evaluate(&item));
    }
}
