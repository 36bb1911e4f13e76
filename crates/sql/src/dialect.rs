/// Which SQL engine backs a `SqlHandle`. Production runs against PostgreSQL;
/// tests run against an in-memory SQLite database, selected by the same
/// `usePostgresql` configuration flag the specification names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_use_postgresql(use_postgresql: bool) -> Self {
        if use_postgresql {
            Dialect::Postgres
        } else {
            Dialect::Sqlite
        }
    }

    /// The native column type used for a JSON-valued column.
    pub fn json_column_type(&self) -> &'static str {
        match self {
            Dialect::Postgres => "jsonb",
            Dialect::Sqlite => "text",
        }
    }

    /// The bind expression for a named JSON parameter: cast explicitly to the
    /// native JSON type on Postgres, bound raw on SQLite. Uses `CAST(...)`
    /// rather than `::jsonb` so the named-parameter rewriter (which only
    /// understands single `:name` tokens) doesn't misparse the `::`.
    pub fn json_bind_expr(&self, param_name: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST(:{param_name} AS jsonb)"),
            Dialect::Sqlite => format!(":{param_name}"),
        }
    }

    /// Positional placeholder syntax for the `n`th (1-indexed) occurrence of
    /// a bound parameter.
    pub(crate) fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${position}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }
}
