pub mod error;
pub mod filter;
pub mod movie;
pub mod query;

use std::{fmt::Display, str::FromStr as _, time::Duration};

pub use error::Error;
pub use filter::{Filter, FilterParams, MetaData, MovieSearch};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenRow = sqlx::sqlite::SqliteRow;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

const SCHEMA: &str = include_str!("../sql/schema.sql");

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Runs a trivial statement, failing with [`Error::ConnectionTimeout`] if the
/// database does not answer within `timeout`.
pub async fn check_connection(pool: &Pool, timeout: Duration) -> Result<()> {
    let res = tokio::time::timeout(timeout, sqlx::query("SELECT 1").execute(pool))
        .await
        .map_err(|_| Error::ConnectionTimeout)?;
    res?;
    debug!("Database connection is alive");
    Ok(())
}

/// Creates the movies table and its indexes if they do not exist yet.
pub async fn init_schema(pool: &Pool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Sort order over a column taken from an allow-list.
///
/// Only `&'static str` column names can be held here, and they only ever come
/// from the caller's declared list of sortable columns, never from request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc(&'static str),
    Desc(&'static str),
}

impl Order {
    /// Parses `name` or `-name`, accepting it only if `name` is in `valid_fields`.
    pub fn parse(sort: &str, valid_fields: &[&'static str]) -> Option<Order> {
        let (name, descending) = match sort.strip_prefix('-') {
            Some(name) => (name, true),
            None => (sort, false),
        };
        let column = valid_fields.iter().copied().find(|f| *f == name)?;
        if descending {
            Some(Order::Desc(column))
        } else {
            Some(Order::Asc(column))
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Order::Asc(s) => s,
            Order::Desc(s) => s,
        }
    }

    pub fn direction(&self) -> &'static str {
        match self {
            Order::Asc(_) => "ASC",
            Order::Desc(_) => "DESC",
        }
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column(), self.direction())
    }
}
