//! The update-expression parser: any permutation of `SET`, `REMOVE`, `ADD`,
//! `DELETE` clauses, applied to a mutable attribute map.

use crate::common::{resolve_attr, resolve_value};
use crate::tokenizer::{tokenize, Cursor, Token};
use bigdecimal::BigDecimal;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use types::{AttributeMap, AttributeValue, Error};

#[derive(Debug, Clone)]
enum ListOperand {
    Path(String),
    Literal(AttributeValue),
}

#[derive(Debug, Clone)]
enum SetExpr {
    Literal(AttributeValue),
    ListAppend(ListOperand, ListOperand),
    IfNotExists(String, AttributeValue),
    Add(String, AttributeValue),
    Sub(String, AttributeValue),
}

#[derive(Debug, Clone)]
struct SetAction {
    target: String,
    expr: SetExpr,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateExpression {
    sets: Vec<SetAction>,
    removes: Vec<String>,
    adds: Vec<(String, AttributeValue)>,
    deletes: Vec<(String, AttributeValue)>,
}

pub fn parse(
    expression: &str,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<UpdateExpression, Error> {
    let tokens = tokenize(expression)?;
    let mut cur = Cursor::new(&tokens);
    let mut update = UpdateExpression::default();

    let mut seen_set = false;
    let mut seen_remove = false;
    let mut seen_add = false;
    let mut seen_delete = false;

    while !cur.at_eof() {
        if cur.eat_keyword("SET") {
            if seen_set {
                return Err(Error::invalid_expression("duplicate SET clause"));
            }
            seen_set = true;
            update.sets = parse_set_clause(&mut cur, names, values)?;
        } else if cur.eat_keyword("REMOVE") {
            if seen_remove {
                return Err(Error::invalid_expression("duplicate REMOVE clause"));
            }
            seen_remove = true;
            update.removes = parse_remove_clause(&mut cur, names)?;
        } else if cur.eat_keyword("ADD") {
            if seen_add {
                return Err(Error::invalid_expression("duplicate ADD clause"));
            }
            seen_add = true;
            update.adds = parse_path_value_clause(&mut cur, names, values)?;
        } else if cur.eat_keyword("DELETE") {
            if seen_delete {
                return Err(Error::invalid_expression("duplicate DELETE clause"));
            }
            seen_delete = true;
            update.deletes = parse_path_value_clause(&mut cur, names, values)?;
        } else {
            return Err(Error::invalid_expression(format!(
                "expected SET, REMOVE, ADD, or DELETE, found {:?}",
                cur.peek()
            )));
        }
    }

    Ok(update)
}

fn parse_set_clause(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<Vec<SetAction>, Error> {
    let mut actions = Vec::new();
    loop {
        let target = resolve_attr(&cur.advance(), names)?;
        cur.expect(&Token::Eq)?;
        let expr = parse_set_expr(cur, names, values)?;
        actions.push(SetAction { target, expr });
        if matches!(cur.peek(), Token::Comma) {
            cur.advance();
            continue;
        }
        break;
    }
    Ok(actions)
}

fn parse_set_expr(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<SetExpr, Error> {
    if cur.peek_keyword("list_append") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        let a = parse_list_operand(cur, names, values)?;
        cur.expect(&Token::Comma)?;
        let b = parse_list_operand(cur, names, values)?;
        cur.expect(&Token::RParen)?;
        return Ok(SetExpr::ListAppend(a, b));
    }
    if cur.peek_keyword("if_not_exists") {
        cur.advance();
        cur.expect(&Token::LParen)?;
        let attr = resolve_attr(&cur.advance(), names)?;
        cur.expect(&Token::Comma)?;
        let default = resolve_value(&cur.advance(), values)?;
        cur.expect(&Token::RParen)?;
        return Ok(SetExpr::IfNotExists(attr, default));
    }

    // Either a bare `:v` literal, or `attr + :v` / `attr - :v`.
    if let Token::Value(_) = cur.peek() {
        let value = resolve_value(&cur.advance(), values)?;
        return Ok(SetExpr::Literal(value));
    }
    let attr = resolve_attr(&cur.advance(), names)?;
    match cur.advance() {
        Token::Plus => Ok(SetExpr::Add(attr, resolve_value(&cur.advance(), values)?)),
        Token::Minus => Ok(SetExpr::Sub(attr, resolve_value(&cur.advance(), values)?)),
        other => Err(Error::invalid_expression(format!(
            "expected '+' or '-' after attribute reference in SET clause, found {other:?}"
        ))),
    }
}

fn parse_list_operand(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<ListOperand, Error> {
    if let Token::Value(_) = cur.peek() {
        Ok(ListOperand::Literal(resolve_value(&cur.advance(), values)?))
    } else {
        Ok(ListOperand::Path(resolve_attr(&cur.advance(), names)?))
    }
}

fn parse_remove_clause(cur: &mut Cursor<'_>, names: &HashMap<String, String>) -> Result<Vec<String>, Error> {
    let mut attrs = Vec::new();
    loop {
        attrs.push(resolve_attr(&cur.advance(), names)?);
        if matches!(cur.peek(), Token::Comma) {
            cur.advance();
            continue;
        }
        break;
    }
    Ok(attrs)
}

fn parse_path_value_clause(
    cur: &mut Cursor<'_>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<Vec<(String, AttributeValue)>, Error> {
    let mut pairs = Vec::new();
    loop {
        let attr = resolve_attr(&cur.advance(), names)?;
        let value = resolve_value(&cur.advance(), values)?;
        pairs.push((attr, value));
        if matches!(cur.peek(), Token::Comma) {
            cur.advance();
            continue;
        }
        break;
    }
    Ok(pairs)
}

impl UpdateExpression {
    /// Applies every clause to `item` in place.
    pub fn apply(&self, item: &mut AttributeMap) -> Result<(), Error> {
        for action in &self.sets {
            let value = self.evaluate_set_expr(&action.expr, item)?;
            item.insert(action.target.clone(), value);
        }
        for attr in &self.removes {
            item.remove(attr);
        }
        for (attr, addend) in &self.adds {
            apply_add(item, attr, addend)?;
        }
        for (attr, subtrahend) in &self.deletes {
            apply_delete(item, attr, subtrahend)?;
        }
        Ok(())
    }

    fn evaluate_set_expr(&self, expr: &SetExpr, item: &AttributeMap) -> Result<AttributeValue, Error> {
        match expr {
            SetExpr::Literal(v) => Ok(v.clone()),
            SetExpr::ListAppend(a, b) => {
                let mut list = resolve_list_operand(a, item)?;
                list.extend(resolve_list_operand(b, item)?);
                Ok(AttributeValue::L(list))
            }
            SetExpr::IfNotExists(attr, default) => Ok(item.get(attr).cloned().unwrap_or_else(|| default.clone())),
            SetExpr::Add(attr, delta) => numeric_op(item, attr, delta, |a, b| a + b),
            SetExpr::Sub(attr, delta) => numeric_op(item, attr, delta, |a, b| a - b),
        }
    }
}

fn resolve_list_operand(op: &ListOperand, item: &AttributeMap) -> Result<Vec<AttributeValue>, Error> {
    let value = match op {
        ListOperand::Literal(v) => v.clone(),
        ListOperand::Path(attr) => item
            .get(attr)
            .cloned()
            .ok_or_else(|| Error::invalid_expression(format!("list_append: '{attr}' does not exist")))?,
    };
    match value {
        AttributeValue::L(items) => Ok(items),
        _ => Err(Error::invalid_expression("list_append operands must be lists")),
    }
}

fn parse_decimal(attr: &str, value: &AttributeValue) -> Result<BigDecimal, Error> {
    match value {
        AttributeValue::N(n) => {
            BigDecimal::from_str(n).map_err(|_| Error::invalid_expression(format!("'{attr}' is not a valid number")))
        }
        _ => Err(Error::invalid_expression(format!("'{attr}' is not a numeric attribute"))),
    }
}

fn numeric_op(
    item: &AttributeMap,
    attr: &str,
    delta: &AttributeValue,
    op: impl Fn(BigDecimal, BigDecimal) -> BigDecimal,
) -> Result<AttributeValue, Error> {
    let current = item
        .get(attr)
        .ok_or_else(|| Error::invalid_expression(format!("'{attr}' does not exist")))?;
    let current = parse_decimal(attr, current)?;
    let delta = parse_decimal(attr, delta)?;
    Ok(AttributeValue::N(op(current, delta).to_string()))
}

fn apply_add(item: &mut AttributeMap, attr: &str, addend: &AttributeValue) -> Result<(), Error> {
    match addend {
        AttributeValue::N(_) => {
            let updated = if item.contains_key(attr) {
                numeric_op(item, attr, addend, |a, b| a + b)?
            } else {
                addend.clone()
            };
            item.insert(attr.to_string(), updated);
        }
        AttributeValue::Ss(set) => union_set(item, attr, Sets::Ss(set.clone()))?,
        AttributeValue::Ns(set) => union_set(item, attr, Sets::Ns(set.clone()))?,
        AttributeValue::Bs(set) => union_set(item, attr, Sets::Bs(set.clone()))?,
        _ => return Err(Error::invalid_expression("ADD only supports N or set-typed values")),
    }
    Ok(())
}

enum Sets {
    Ss(BTreeSet<String>),
    Ns(BTreeSet<String>),
    Bs(BTreeSet<Vec<u8>>),
}

fn union_set(item: &mut AttributeMap, attr: &str, addend: Sets) -> Result<(), Error> {
    let merged = match (item.get(attr).cloned(), addend) {
        (None, Sets::Ss(s)) => AttributeValue::Ss(s),
        (None, Sets::Ns(s)) => AttributeValue::Ns(s),
        (None, Sets::Bs(s)) => AttributeValue::Bs(s),
        (Some(AttributeValue::Ss(mut existing)), Sets::Ss(s)) => {
            existing.extend(s);
            AttributeValue::Ss(existing)
        }
        (Some(AttributeValue::Ns(mut existing)), Sets::Ns(s)) => {
            existing.extend(s);
            AttributeValue::Ns(existing)
        }
        (Some(AttributeValue::Bs(mut existing)), Sets::Bs(s)) => {
            existing.extend(s);
            AttributeValue::Bs(existing)
        }
        _ => return Err(Error::invalid_expression(format!("'{attr}' is not a matching set type"))),
    };
    item.insert(attr.to_string(), merged);
    Ok(())
}

fn apply_delete(item: &mut AttributeMap, attr: &str, subtrahend: &AttributeValue) -> Result<(), Error> {
    let Some(existing) = item.get(attr).cloned() else {
        return Ok(());
    };
    let shrunk = match (existing, subtrahend) {
        (AttributeValue::Ss(mut set), AttributeValue::Ss(remove)) => {
            for v in remove {
                set.remove(v);
            }
            AttributeValue::Ss(set)
        }
        (AttributeValue::Ns(mut set), AttributeValue::Ns(remove)) => {
            for v in remove {
                set.remove(v);
            }
            AttributeValue::Ns(set)
        }
        (AttributeValue::Bs(mut set), AttributeValue::Bs(remove)) => {
            for v in remove {
                set.remove(v);
            }
            AttributeValue::Bs(set)
        }
        _ => return Err(Error::invalid_expression(format!("'{attr}' is not a matching set type"))),
    };
    let is_empty = match &shrunk {
        AttributeValue::Ss(s) => s.is_empty(),
        AttributeValue::Ns(s) => s.is_empty(),
        AttributeValue::Bs(s) => s.is_empty(),
        _ => false,
    };
    if is_empty {
        item.remove(attr);
    } else {
        item.insert(attr.to_string(), shrunk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, AttributeValue)]) -> HashMap<String, AttributeValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn set_literal_assigns_value() {
        let vals = values(&[(":n", AttributeValue::S("Bob".into()))]);
        let update = parse("SET name = :n", &HashMap::new(), &vals).unwrap();
        let mut item = AttributeMap::new();
        update.apply(&mut item).unwrap();
        assert_eq!(item.get("name"), Some(&AttributeValue::S("Bob".into())));
    }

    #[test]
    fn set_add_requires_existing_numeric_attribute() {
        let vals = values(&[(":v", AttributeValue::N("1".into()))]);
        let update = parse("SET total = total + :v", &HashMap::new(), &vals).unwrap();
        let mut item = AttributeMap::new();
        item.insert("total".into(), AttributeValue::N("10".into()));
        update.apply(&mut item).unwrap();
        assert_eq!(item.get("total"), Some(&AttributeValue::N("11".into())));
    }

    #[test]
    fn remove_add_delete_and_set_compose_in_one_expression() {
        let vals = values(&[
            (":v", AttributeValue::N("3".into())),
            (":tag", AttributeValue::Ss(BTreeSet::from(["x".to_string()]))),
        ]);
        let update = parse("SET hits = hits + :v REMOVE stale ADD tags :tag", &HashMap::new(), &vals).unwrap();
        let mut item = AttributeMap::new();
        item.insert("hits".into(), AttributeValue::N("1".into()));
        item.insert("stale".into(), AttributeValue::Bool(true));
        update.apply(&mut item).unwrap();
        assert_eq!(item.get("hits"), Some(&AttributeValue::N("4".into())));
        assert!(!item.contains_key("stale"));
        assert_eq!(
            item.get("tags"),
            Some(&AttributeValue::Ss(BTreeSet::from(["x".to_string()])))
        );
    }

    #[test]
    fn delete_removes_attribute_once_set_is_empty() {
        let vals = values(&[(":tag", AttributeValue::Ss(BTreeSet::from(["x".to_string()])))]);
        let update = parse("DELETE tags :tag", &HashMap::new(), &vals).unwrap();
        let mut item = AttributeMap::new();
        item.insert("tags".into(), AttributeValue::Ss(BTreeSet::from(["x".to_string()])));
        update.apply(&mut item).unwrap();
        assert!(!item.contains_key("tags"));
    }

    #[test]
    fn list_append_concatenates_in_order() {
        let vals = values(&[(":new", AttributeValue::L(vec![AttributeValue::S("b".into())]))]);
        let update = parse("SET items = list_append(items, :new)", &HashMap::new(), &vals).unwrap();
        let mut item = AttributeMap::new();
        item.insert("items".into(), AttributeValue::L(vec![AttributeValue::S("a".into())]));
        update.apply(&mut item).unwrap();
        assert_eq!(
            item.get("items"),
            Some(&AttributeValue::L(vec![
                AttributeValue::S("a".into()),
                AttributeValue::S("b".into())
            ]))
        );
    }

    #[test]
    fn if_not_exists_keeps_existing_value() {
        let vals = values(&[(":d", AttributeValue::N("0".into()))]);
        let update = parse("SET count = if_not_exists(count, :d)", &HashMap::new(), &vals).unwrap();
        let mut item = AttributeMap::new();
        item.insert("count".into(), AttributeValue::N("7".into()));
        update.apply(&mut item).unwrap();
        assert_eq!(item.get("count"), Some(&AttributeValue::N("7".into())));
    }
}
