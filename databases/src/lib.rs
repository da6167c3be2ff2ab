//! Spectrum Databases
//!
//! Read access to the feed store: credentials loading, connection string
//! assembly, and a small set of fixed queries returning tabular results.
//!
//! ```no_run
//! use spectrum_databases::{Accessor, FetchOptions};
//!
//! let accessor = Accessor::from_default_credentials()?;
//! let tags = accessor.tags(FetchOptions::default_limit())?;
//! println!("{} tags", tags.len());
//! # Ok::<(), spectrum_databases::Error>(())
//! ```

pub mod accessor;
pub mod connection;
pub mod credentials;
pub mod postgres;
pub mod query;
pub mod result_set;
pub mod sqlite;

pub use accessor::{Accessor, FetchOptions};
pub use connection::{ConnectionFactory, DbConnection, DefaultFactory, SqlConnection};
pub use credentials::{build_connection_string, Credentials, CREDENTIALS_FILE};
pub use postgres::{PostgresConnection, PostgresFactory};
pub use query::{build_select_all, Dialect, FeedWindow, Param, Query, Table, DEFAULT_LIMIT};
pub use result_set::ResultSet;
pub use sqlite::{SqliteConnection, SqliteFactory};

/// Accessor errors
///
/// Driver errors are wrapped transparently so callers see the driver's own
/// message and can downcast to it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported column type {type_name} in column '{column}'")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Postgres(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised by a database driver
    pub fn is_driver(&self) -> bool {
        matches!(self, Error::Sqlite(_) | Error::Postgres(_))
    }
}

/// Result type for accessor operations
pub type Result<T> = std::result::Result<T, Error>;
