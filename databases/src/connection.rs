//! Connection seams
//!
//! The accessor never opens connections itself. It is handed a
//! [`ConnectionFactory`] and calls it at most once; whatever the factory
//! returns is shared by every later query.

use crate::credentials::{build_connection_string, Credentials};
use crate::postgres::{PostgresConnection, PostgresFactory};
use crate::query::{Dialect, Query};
use crate::result_set::ResultSet;
use crate::sqlite::{SqliteConnection, SqliteFactory};
use crate::{Error, Result};

/// A live, blocking database handle
pub trait SqlConnection {
    /// Dialect used to render parameterized queries for this handle
    fn dialect(&self) -> Dialect;

    /// Run a query and collect every row
    fn fetch(&self, query: &Query) -> Result<ResultSet>;
}

/// Builds a connection from credentials
pub trait ConnectionFactory {
    type Connection: SqlConnection;

    fn connect(&self, credentials: &Credentials) -> Result<Self::Connection>;
}

/// Handle returned by [`DefaultFactory`]
pub enum DbConnection {
    Postgres(PostgresConnection),
    Sqlite(SqliteConnection),
}

impl SqlConnection for DbConnection {
    fn dialect(&self) -> Dialect {
        match self {
            DbConnection::Postgres(conn) => conn.dialect(),
            DbConnection::Sqlite(conn) => conn.dialect(),
        }
    }

    fn fetch(&self, query: &Query) -> Result<ResultSet> {
        match self {
            DbConnection::Postgres(conn) => conn.fetch(query),
            DbConnection::Sqlite(conn) => conn.fetch(query),
        }
    }
}

/// Picks a backend from the connection URI scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl DefaultFactory {
    /// Backend dialect for these credentials
    pub fn dialect_for(credentials: &Credentials) -> Result<Dialect> {
        let uri = build_connection_string(credentials);
        let scheme = uri.split("://").next().unwrap_or_default();
        Dialect::from_scheme(scheme)
            .ok_or_else(|| Error::Configuration(format!("unsupported SQL dialect '{scheme}'")))
    }
}

impl ConnectionFactory for DefaultFactory {
    type Connection = DbConnection;

    fn connect(&self, credentials: &Credentials) -> Result<DbConnection> {
        match Self::dialect_for(credentials)? {
            Dialect::Postgres => PostgresFactory
                .connect(credentials)
                .map(DbConnection::Postgres),
            Dialect::Sqlite => SqliteFactory.connect(credentials).map(DbConnection::Sqlite),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(dialect: Option<&str>, engine: &str) -> Credentials {
        Credentials {
            username: "u".into(),
            password: "p".into(),
            host: "localhost".into(),
            port: None,
            dbname: ":memory:".into(),
            sql_dialect: dialect.map(str::to_string),
            sql_engine: engine.into(),
        }
    }

    #[test]
    fn test_dialect_from_dialect_field() {
        let dialect = DefaultFactory::dialect_for(&creds(Some("postgresql"), "psycopg2")).unwrap();
        assert_eq!(dialect, Dialect::Postgres);
    }

    #[test]
    fn test_dialect_from_engine_when_dialect_null() {
        let dialect = DefaultFactory::dialect_for(&creds(None, "sqlite")).unwrap();
        assert_eq!(dialect, Dialect::Sqlite);
    }

    #[test]
    fn test_unsupported_dialect() {
        let err = DefaultFactory::dialect_for(&creds(Some("mssql"), "pyodbc")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_default_factory_opens_sqlite() {
        let conn = DefaultFactory.connect(&creds(Some("sqlite"), "pysqlite")).unwrap();
        assert!(matches!(conn, DbConnection::Sqlite(_)));
        let rs = conn.fetch(&Query::raw("SELECT 1 AS one")).unwrap();
        assert_eq!(rs.columns, vec!["one"]);
    }
}
