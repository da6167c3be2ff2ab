//! Feed store accessor
//!
//! ## Architecture
//!
//! - `Accessor::new()` — take credentials plus a [`ConnectionFactory`]
//! - `get_connection()` — call the factory once, then hand out the cached handle
//! - Fixed-table fetchers and `feed_items()` build their query from [`Table`]
//! - `run_query()` executes caller SQL as-is
//!
//! Everything blocks. Nothing retries. Driver errors are returned untouched.
//! The cached handle sits in a `OnceCell`, so an accessor cannot be shared
//! across threads; build one per thread instead.

use crate::connection::{ConnectionFactory, DefaultFactory, SqlConnection};
use crate::credentials::Credentials;
use crate::query::{FeedWindow, Query, Table, DEFAULT_LIMIT};
use crate::result_set::ResultSet;
use crate::Result;
use std::cell::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call options shared by every fetch method
#[derive(Debug)]
pub struct FetchOptions<C> {
    /// Use this connection instead of the accessor's cached one
    pub connection: Option<Arc<C>>,
    /// Append `LIMIT n` when set
    pub limit: Option<u64>,
}

impl<C> Default for FetchOptions<C> {
    fn default() -> Self {
        Self {
            connection: None,
            limit: None,
        }
    }
}

impl<C> FetchOptions<C> {
    /// No connection override, no limit
    pub fn new() -> Self {
        Self::default()
    }

    /// No connection override, [`DEFAULT_LIMIT`] rows
    pub fn default_limit() -> Self {
        Self::new().limit(DEFAULT_LIMIT)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn no_limit(mut self) -> Self {
        self.limit = None;
        self
    }

    pub fn connection(mut self, connection: Arc<C>) -> Self {
        self.connection = Some(connection);
        self
    }
}

/// Reads the feed store through a lazily created connection
pub struct Accessor<F: ConnectionFactory> {
    credentials: Credentials,
    factory: F,
    connection: OnceCell<Arc<F::Connection>>,
}

impl Accessor<DefaultFactory> {
    /// Load `credentials.json` from the working directory
    pub fn from_default_credentials() -> Result<Self> {
        Ok(Self::new(Credentials::load()?, DefaultFactory))
    }

    /// Load credentials from `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Credentials::load_from(path)?, DefaultFactory))
    }
}

impl<F: ConnectionFactory> Accessor<F> {
    pub fn new(credentials: Credentials, factory: F) -> Self {
        Self {
            credentials,
            factory,
            connection: OnceCell::new(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `existing` if given, otherwise the cached connection
    ///
    /// The factory runs on the first call without `existing`; later calls
    /// return the same `Arc`. A failed connect caches nothing.
    pub fn get_connection(
        &self,
        existing: Option<&Arc<F::Connection>>,
    ) -> Result<Arc<F::Connection>> {
        if let Some(conn) = existing {
            return Ok(Arc::clone(conn));
        }
        if let Some(conn) = self.connection.get() {
            return Ok(Arc::clone(conn));
        }

        debug!(
            uri = %self.credentials.redacted_connection_string(),
            "Opening database connection"
        );
        let conn = Arc::new(self.factory.connect(&self.credentials)?);
        Ok(Arc::clone(self.connection.get_or_init(|| conn)))
    }

    /// Feed items from the trailing eight weeks with non-empty content
    pub fn feed_items(&self, options: FetchOptions<F::Connection>) -> Result<ResultSet> {
        self.feed_items_in(&FeedWindow::trailing(), options)
    }

    /// Feed items inside an explicit window
    pub fn feed_items_in(
        &self,
        window: &FeedWindow,
        options: FetchOptions<F::Connection>,
    ) -> Result<ResultSet> {
        let conn = self.get_connection(options.connection.as_ref())?;
        let query = Query::feed_items(window, conn.dialect(), options.limit);

        info!(start = %window.start, end = %window.end, "Fetching feed items");
        run(&*conn, &query)
    }

    pub fn publications(&self, options: FetchOptions<F::Connection>) -> Result<ResultSet> {
        self.fetch_table(Table::Publication, options)
    }

    pub fn feeds(&self, options: FetchOptions<F::Connection>) -> Result<ResultSet> {
        self.fetch_table(Table::Feed, options)
    }

    pub fn tags(&self, options: FetchOptions<F::Connection>) -> Result<ResultSet> {
        self.fetch_table(Table::Tag, options)
    }

    pub fn associations(&self, options: FetchOptions<F::Connection>) -> Result<ResultSet> {
        self.fetch_table(Table::Association, options)
    }

    /// `SELECT *` over any known table
    pub fn fetch_table(
        &self,
        table: Table,
        options: FetchOptions<F::Connection>,
    ) -> Result<ResultSet> {
        let conn = self.get_connection(options.connection.as_ref())?;
        let query = Query::select_all(table, options.limit);

        info!(%table, limit = ?options.limit, "Fetching table");
        run(&*conn, &query)
    }

    /// Execute caller-supplied SQL and return its rows unchanged
    ///
    /// The text is sent to the database as written. Do not pass untrusted
    /// input.
    pub fn run_query(
        &self,
        sql: &str,
        connection: Option<&Arc<F::Connection>>,
    ) -> Result<ResultSet> {
        let conn = self.get_connection(connection)?;

        info!("Running caller query");
        run(&*conn, &Query::raw(sql))
    }
}

fn run<C: SqlConnection + ?Sized>(conn: &C, query: &Query) -> Result<ResultSet> {
    let result = conn.fetch(query)?;
    debug!(rows = result.len(), columns = result.columns.len(), "Query returned");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Dialect, Param};
    use crate::Error;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    /// Records every query and answers with a one-row result
    struct Recorder {
        queries: RefCell<Vec<Query>>,
    }

    impl SqlConnection for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        fn fetch(&self, query: &Query) -> Result<ResultSet> {
            self.queries.borrow_mut().push(query.clone());
            let mut rs = ResultSet::new(vec!["sql".into()]);
            rs.push_row(vec![json!(query.sql)]);
            Ok(rs)
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        calls: Cell<usize>,
        fail: bool,
    }

    impl ConnectionFactory for CountingFactory {
        type Connection = Recorder;

        fn connect(&self, _credentials: &Credentials) -> Result<Recorder> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Error::Configuration("refused".into()));
            }
            Ok(Recorder {
                queries: RefCell::new(Vec::new()),
            })
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "u".into(),
            password: "p".into(),
            host: "h".into(),
            port: None,
            dbname: "d".into(),
            sql_dialect: Some("postgresql".into()),
            sql_engine: "psycopg2".into(),
        }
    }

    fn accessor() -> Accessor<CountingFactory> {
        Accessor::new(credentials(), CountingFactory::default())
    }

    #[test]
    fn test_get_connection_is_cached() {
        let acc = accessor();
        let first = acc.get_connection(None).unwrap();
        let second = acc.get_connection(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(acc.factory.calls.get(), 1);
    }

    #[test]
    fn test_get_connection_prefers_existing() {
        let acc = accessor();
        let external = Arc::new(Recorder {
            queries: RefCell::new(Vec::new()),
        });
        let got = acc.get_connection(Some(&external)).unwrap();
        assert!(Arc::ptr_eq(&got, &external));
        assert_eq!(acc.factory.calls.get(), 0);
    }

    #[test]
    fn test_failed_connect_is_not_cached() {
        let acc = Accessor::new(
            credentials(),
            CountingFactory {
                fail: true,
                ..Default::default()
            },
        );
        assert!(acc.get_connection(None).is_err());
        assert!(acc.get_connection(None).is_err());
        assert_eq!(acc.factory.calls.get(), 2);
    }

    #[test]
    fn test_table_fetchers_share_connection() {
        let acc = accessor();
        acc.publications(FetchOptions::default_limit()).unwrap();
        acc.feeds(FetchOptions::new()).unwrap();
        acc.tags(FetchOptions::new().limit(3)).unwrap();
        acc.associations(FetchOptions::default_limit().no_limit())
            .unwrap();

        let conn = acc.get_connection(None).unwrap();
        let sql: Vec<_> = conn.queries.borrow().iter().map(|q| q.sql.clone()).collect();
        assert_eq!(
            sql,
            [
                "SELECT * FROM feed_fetcher_publication LIMIT 100",
                "SELECT * FROM feed_fetcher_feed",
                "SELECT * FROM feed_fetcher_tag LIMIT 3",
                "SELECT * FROM feed_fetcher_association",
            ]
        );
        assert_eq!(acc.factory.calls.get(), 1);
    }

    #[test]
    fn test_fetch_with_external_connection_skips_cache() {
        let acc = accessor();
        let external = Arc::new(Recorder {
            queries: RefCell::new(Vec::new()),
        });
        acc.tags(FetchOptions::new().connection(Arc::clone(&external)))
            .unwrap();
        assert_eq!(external.queries.borrow().len(), 1);
        assert_eq!(acc.factory.calls.get(), 0);
    }

    #[test]
    fn test_feed_items_binds_window() {
        let acc = accessor();
        let end = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let window = FeedWindow::ending_at(end);
        acc.feed_items_in(&window, FetchOptions::new()).unwrap();

        let conn = acc.get_connection(None).unwrap();
        let queries = conn.queries.borrow();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].sql.contains("$2 + interval '1 day'"));
        assert_eq!(
            queries[0].params,
            vec![
                Param::Timestamp(end - Duration::weeks(8)),
                Param::Timestamp(end)
            ]
        );
    }

    #[test]
    fn test_run_query_passes_sql_verbatim() {
        let acc = accessor();
        let rs = acc.run_query("select 42 as answer", None).unwrap();
        assert_eq!(rs.rows, vec![vec![json!("select 42 as answer")]]);
    }
}
