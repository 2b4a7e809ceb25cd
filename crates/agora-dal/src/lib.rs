pub mod author;
pub mod book;
pub mod comment;
pub mod error;
pub mod follow;
pub mod library;
pub mod like;
pub mod notification;
pub mod post;
pub mod profile;
pub mod user;

use std::{fmt::Display, str::FromStr, time::Duration};

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::debug;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

/// Escape clause matching [`ListingParams::search_pattern`]
pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Applies embedded migrations from the workspace `migrations` directory
pub async fn migrate(pool: &Pool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    debug!("Database migrations applied");
    Ok(())
}

#[derive(Debug, Clone)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc(s) => write!(f, "{}", s),
            Order::Desc(s) => write!(f, "{} DESC", s),
        }
    }
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

impl Order {
    fn with_column(&self, column: &str) -> String {
        match self {
            Order::Asc(_) => column.to_string(),
            Order::Desc(_) => format!("{column} DESC"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
    pub search: Option<String>,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
            search: None,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Search term as `LIKE` pattern, blank terms are ignored.
    /// Wildcards in the term are escaped with `\`, so the pattern must be used with
    /// [`LIKE_ESCAPE`].
    pub(crate) fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let mut pattern = String::with_capacity(s.len() + 2);
                pattern.push('%');
                for c in s.chars() {
                    if matches!(c, '\\' | '%' | '_') {
                        pattern.push('\\');
                    }
                    pattern.push(c);
                }
                pattern.push('%');
                pattern
            })
    }

    /// Builds `ORDER BY` clause, `valid_fields` maps public field names to columns
    pub fn ordering(&self, valid_fields: &[(&str, &str)], default: &str) -> Result<String> {
        let ordering = match self.order.as_ref().filter(|o| !o.is_empty()) {
            Some(order) => order
                .iter()
                .map(|o| {
                    valid_fields
                        .iter()
                        .find(|(field, _)| *field == o.as_ref())
                        .map(|(_, column)| o.with_column(column))
                        .ok_or_else(|| Error::InvalidOrderByField(o.as_ref().to_string()))
                })
                .collect::<Result<Vec<String>>>()?
                .join(", "),
            None => default.to_string(),
        };
        Ok(format!(" ORDER BY {ordering}"))
    }
}

/// One page of records together with total count of matching records
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub offset: i64,
    pub limit: i64,
    pub rows: Vec<T>,
    pub total: u64,
}

impl<T> Batch<T> {
    pub(crate) fn new(params: &ListingParams, rows: Vec<T>, total: i64) -> Self {
        Batch {
            offset: params.offset,
            limit: params.limit,
            rows,
            total: total.max(0) as u64,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Batch<U> {
        Batch {
            offset: self.offset,
            limit: self.limit,
            rows: self.rows.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}
