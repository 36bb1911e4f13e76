use crate::dialect::Dialect;
use crate::params::{rewrite, NamedParams};
use anyhow::Context;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::Row;

/// A thin wrapper over a pooled connection, parameterized by dialect. All
/// persistence in the item engine goes through a `SqlHandle` or a
/// transaction opened from one; nothing speaks SQL directly to a driver pool.
#[derive(Clone)]
pub struct SqlHandle {
    pool: sqlx::AnyPool,
    dialect: Dialect,
}

pub type SqlTxn<'c> = sqlx::Transaction<'c, sqlx::Any>;

impl SqlHandle {
    pub async fn connect(database_url: &str, dialect: Dialect) -> anyhow::Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .with_context(|| format!("connecting to {database_url}"))?;
        Ok(Self { pool, dialect })
    }

    /// Builds a handle directly from an already-open pool, primarily for
    /// tests that share one in-memory SQLite database across assertions.
    pub fn from_pool(pool: sqlx::AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn pool(&self) -> &sqlx::AnyPool {
        &self.pool
    }

    pub async fn begin(&self) -> anyhow::Result<SqlTxn<'static>> {
        Ok(self.pool.begin().await?)
    }

    /// Runs `template` (with `:name` placeholders) against a fresh
    /// connection drawn from the pool.
    pub async fn execute(&self, template: &str, params: &NamedParams) -> anyhow::Result<u64> {
        let (sql, args) = rewrite(template, params, self.dialect)?;
        let result = sqlx::query_with(&sql, args).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_all(&self, template: &str, params: &NamedParams) -> anyhow::Result<Vec<AnyRow>> {
        let (sql, args) = rewrite(template, params, self.dialect)?;
        Ok(sqlx::query_with(&sql, args).fetch_all(&self.pool).await?)
    }

    pub async fn fetch_optional(&self, template: &str, params: &NamedParams) -> anyhow::Result<Option<AnyRow>> {
        let (sql, args) = rewrite(template, params, self.dialect)?;
        Ok(sqlx::query_with(&sql, args).fetch_optional(&self.pool).await?)
    }
}

/// Runs `template` against a caller-supplied transaction, for the
/// multi-step operations (§4.3) that must preserve atomicity across several
/// statements.
pub async fn execute_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    template: &str,
    params: &NamedParams,
) -> anyhow::Result<u64> {
    let (sql, args) = rewrite(template, params, dialect)?;
    let result = sqlx::query_with(&sql, args).execute(&mut *txn).await?;
    Ok(result.rows_affected())
}

pub async fn fetch_all_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    template: &str,
    params: &NamedParams,
) -> anyhow::Result<Vec<AnyRow>> {
    let (sql, args) = rewrite(template, params, dialect)?;
    Ok(sqlx::query_with(&sql, args).fetch_all(&mut *txn).await?)
}

pub async fn fetch_optional_in_txn(
    txn: &mut SqlTxn<'_>,
    dialect: Dialect,
    template: &str,
    params: &NamedParams,
) -> anyhow::Result<Option<AnyRow>> {
    let (sql, args) = rewrite(template, params, dialect)?;
    Ok(sqlx::query_with(&sql, args).fetch_optional(&mut *txn).await?)
}

/// Reads a `TEXT`/`VARCHAR` column by name, tolerating either dialect's
/// `AnyRow` column mapping.
pub fn get_string(row: &AnyRow, column: &str) -> anyhow::Result<String> {
    Ok(row.try_get::<String, _>(column)?)
}

pub fn get_opt_string(row: &AnyRow, column: &str) -> anyhow::Result<Option<String>> {
    Ok(row.try_get::<Option<String>, _>(column)?)
}

pub fn get_i64(row: &AnyRow, column: &str) -> anyhow::Result<i64> {
    Ok(row.try_get::<i64, _>(column)?)
}

pub fn get_bool(row: &AnyRow, column: &str) -> anyhow::Result<bool> {
    Ok(row.try_get::<bool, _>(column)?)
}
