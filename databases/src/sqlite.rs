//! SQLite backend
//!
//! The database file is `dbname` from the credentials (`:memory:` works).
//! Host, port and user are ignored by SQLite.

use crate::connection::{ConnectionFactory, SqlConnection};
use crate::credentials::Credentials;
use crate::query::{Dialect, Param, Query};
use crate::result_set::ResultSet;
use crate::Result;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Opens [`SqliteConnection`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFactory;

impl ConnectionFactory for SqliteFactory {
    type Connection = SqliteConnection;

    fn connect(&self, credentials: &Credentials) -> Result<SqliteConnection> {
        SqliteConnection::open(&credentials.dbname)
    }
}

/// Blocking SQLite handle
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SQLite database: {}", path.display());

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;

        Ok(Self { conn })
    }

    /// Wrap an already open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Underlying rusqlite connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl SqlConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn fetch(&self, query: &Query) -> Result<ResultSet> {
        debug!(sql = %query.sql, params = query.params.len(), "Running SQLite query");

        let mut stmt = self.conn.prepare(&query.sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut result = ResultSet::new(columns);

        let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(value_to_json(row.get_ref(idx)?));
            }
            result.push_row(values);
        }

        debug!(rows = result.len(), "SQLite query complete");
        Ok(result)
    }
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Param::Timestamp(ts) => ts.to_sql(),
            Param::Int(i) => i.to_sql(),
            Param::Text(s) => s.to_sql(),
        }
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}
