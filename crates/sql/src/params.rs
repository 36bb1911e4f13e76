//! A tiny helper that rewrites `:name` tokens in a SQL template into the
//! driver's native placeholder syntax while building an ordered argument
//! list, per the design notes on dynamic SQL with named parameters.

use crate::dialect::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::any::AnyArguments;
use sqlx::Arguments;

static NAME_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r":([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());

/// A bindable scalar value. Item attributes and metadata are always carried
/// as text or integers at the SQL boundary; the attribute codec owns any
/// further structure.
#[derive(Debug, Clone)]
pub enum Param {
    Text(String),
    Int(i64),
    Bool(bool),
    Null,
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Param::Null,
        }
    }
}

/// Accumulates `:name -> value` bindings for a single query, independent of
/// the eventual placeholder syntax.
#[derive(Debug, Default, Clone)]
pub struct NamedParams(Vec<(String, Param)>);

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, value: impl Into<Param>) -> Self {
        self.0.push((name.to_string(), value.into()));
        self
    }

    fn get(&self, name: &str) -> Option<&Param> {
        // Last write wins, so callers may override a default binding.
        self.0.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Rewrites every `:name` occurrence in `template` into the dialect's native
/// positional placeholder, in the order the tokens appear, and produces the
/// matching `AnyArguments` list. Returns an error mentioning the first
/// unbound name it encounters.
pub fn rewrite(template: &str, params: &NamedParams, dialect: Dialect) -> anyhow::Result<(String, AnyArguments<'static>)> {
    let mut out = String::with_capacity(template.len());
    let mut args = AnyArguments::default();
    let mut last = 0;
    let mut position = 0usize;

    for capture in NAME_TOKEN.captures_iter(template) {
        let whole = capture.get(0).unwrap();
        let name = &capture[1];
        out.push_str(&template[last..whole.start()]);
        position += 1;
        out.push_str(&dialect.placeholder(position));
        last = whole.end();

        let Some(value) = params.get(name).cloned() else {
            anyhow::bail!("no binding supplied for parameter ':{name}'")
        };
        match value {
            Param::Text(v) => args.add(v),
            Param::Int(v) => args.add(v),
            Param::Bool(v) => args.add(v),
            Param::Null => args.add(Option::<String>::None),
        }
    }
    out.push_str(&template[last..]);

    Ok((out, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_postgres_placeholders_in_order() {
        let params = NamedParams::new().bind("hash", "u1").bind("sort", 5i64);
        let (sql, _) = rewrite(
            "select * from t where hash_key_value = :hash and sort_key_value > :sort",
            &params,
            Dialect::Postgres,
        )
        .unwrap();
        assert_eq!(
            sql,
            "select * from t where hash_key_value = $1 and sort_key_value > $2"
        );
    }

    #[test]
    fn rewrites_sqlite_placeholders() {
        let params = NamedParams::new().bind("hash", "u1");
        let (sql, _) = rewrite("select * from t where hash_key_value = :hash", &params, Dialect::Sqlite).unwrap();
        assert_eq!(sql, "select * from t where hash_key_value = ?");
    }

    #[test]
    fn errors_on_unbound_name() {
        let params = NamedParams::new();
        let result = rewrite("select * from t where hash_key_value = :hash", &params, Dialect::Postgres);
        assert!(result.is_err());
    }

    #[test]
    fn repeated_names_each_get_a_placeholder() {
        let params = NamedParams::new().bind("x", 1i64);
        let (sql, _) = rewrite("select :x, :x", &params, Dialect::Postgres).unwrap();
        assert_eq!(sql, "select $1, $2");
    }
}
