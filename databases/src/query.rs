//! Query construction
//!
//! Fixed-table queries are built from the closed [`Table`] set. The feed item
//! query binds its time window as parameters; placeholder syntax depends on
//! the backend [`Dialect`].

use chrono::{Duration, Local, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// Row limit applied by [`crate::FetchOptions::default_limit`]
pub const DEFAULT_LIMIT: u64 = 100;

/// Length of the trailing feed item window
pub const FEED_WINDOW_WEEKS: i64 = 8;

/// Tables the accessor knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Table {
    FeedItem,
    Publication,
    Feed,
    Tag,
    Association,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::FeedItem,
        Table::Publication,
        Table::Feed,
        Table::Tag,
        Table::Association,
    ];

    /// Table name in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::FeedItem => "feed_fetcher_feeditem",
            Table::Publication => "feed_fetcher_publication",
            Table::Feed => "feed_fetcher_feed",
            Table::Tag => "feed_fetcher_tag",
            Table::Association => "feed_fetcher_association",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL flavour used to render placeholders and date arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Resolve a dialect from a connection URI scheme such as
    /// `postgresql+psycopg2` or `sqlite`
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        let base = scheme.split('+').next().unwrap_or(scheme);
        match base.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Some(Dialect::Postgres),
            "sqlite" => Some(Dialect::Sqlite),
            _ => None,
        }
    }

    /// Positional placeholder for the 1-based parameter `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }

    /// `expr` advanced by one calendar day
    fn plus_one_day(&self, expr: &str) -> String {
        match self {
            Dialect::Postgres => format!("{expr} + interval '1 day'"),
            // strftime keeps the fractional seconds that datetime() drops.
            Dialect::Sqlite => format!("strftime('%Y-%m-%d %H:%M:%f', {expr}, '+1 day')"),
        }
    }
}

/// Bound query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Timestamp(NaiveDateTime),
    Int(i64),
    Text(String),
}

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Query {
    /// Query with no parameters
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// `SELECT *` over a known table
    pub fn select_all(table: Table, limit: Option<u64>) -> Self {
        Self::raw(build_select_all(table.as_str(), limit))
    }

    /// Feed items published inside `window` that have non-empty content
    ///
    /// The upper bound is `end + 1 day`, evaluated by the database.
    pub fn feed_items(window: &FeedWindow, dialect: Dialect, limit: Option<u64>) -> Self {
        let start = dialect.placeholder(1);
        let end = dialect.plus_one_day(&dialect.placeholder(2));
        let mut sql = format!(
            "SELECT * FROM {} \
             WHERE \"publication_date\" >= {start} \
             AND \"publication_date\" < {end} \
             AND \"content\" != ''",
            Table::FeedItem
        );
        push_limit(&mut sql, limit);

        Self {
            sql,
            params: vec![Param::Timestamp(window.start), Param::Timestamp(window.end)],
        }
    }
}

/// `SELECT * FROM <table>` with an optional `LIMIT`
///
/// The table name is inserted verbatim. Only pass trusted identifiers; the
/// fixed-table fetchers go through [`Table`]. A limit of zero means no limit.
pub fn build_select_all(table: &str, limit: Option<u64>) -> String {
    let mut query = format!("SELECT * FROM {table}");
    push_limit(&mut query, limit);
    query
}

fn push_limit(sql: &mut String, limit: Option<u64>) {
    if let Some(n) = limit.filter(|n| *n > 0) {
        sql.push_str(&format!(" LIMIT {n}"));
    }
}

/// Trailing time window used by the feed item query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl FeedWindow {
    /// Window of [`FEED_WINDOW_WEEKS`] ending at `end`
    pub fn ending_at(end: NaiveDateTime) -> Self {
        Self {
            start: end - Duration::weeks(FEED_WINDOW_WEEKS),
            end,
        }
    }

    /// Window ending at the current local time
    pub fn trailing() -> Self {
        Self::ending_at(Local::now().naive_local())
    }
}
