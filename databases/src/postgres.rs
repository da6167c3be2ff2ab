//! PostgreSQL backend
//!
//! `sqlx` is async; [`PostgresConnection`] owns a current-thread tokio runtime
//! and blocks on it so callers get a synchronous API. The pool is created
//! lazily and capped at one connection, so nothing touches the network until
//! the first query.
//!
//! Because it blocks, a handle must not be used or dropped from inside
//! another tokio runtime.

use crate::connection::{ConnectionFactory, SqlConnection};
use crate::credentials::{build_connection_string, Credentials};
use crate::query::{Dialect, Param, Query};
use crate::result_set::ResultSet;
use crate::Result;
use crate::Error;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::{PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row, TypeInfo};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};
use uuid::Uuid;

/// Opens [`PostgresConnection`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresFactory;

impl ConnectionFactory for PostgresFactory {
    type Connection = PostgresConnection;

    fn connect(&self, credentials: &Credentials) -> Result<PostgresConnection> {
        info!(
            uri = %credentials.redacted_connection_string(),
            "Creating PostgreSQL engine"
        );
        PostgresConnection::connect_lazy(&driver_url(credentials))
    }
}

/// `sqlx` understands `postgresql://` but not a `+driver` suffix on the scheme
fn driver_url(credentials: &Credentials) -> String {
    let uri = build_connection_string(credentials);
    match uri.split_once("://") {
        Some((scheme, rest)) => {
            let base = scheme.split('+').next().unwrap_or(scheme);
            format!("{base}://{rest}")
        }
        None => uri,
    }
}

/// Blocking PostgreSQL handle
pub struct PostgresConnection {
    // Dropped before the runtime that drives it.
    pool: PgPool,
    runtime: Runtime,
}

impl PostgresConnection {
    /// Prepare a handle for `url` without connecting
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        // Pool maintenance tasks are spawned on creation and need a runtime.
        let pool = {
            let _guard = runtime.enter();
            PgPoolOptions::new().max_connections(1).connect_lazy(url)?
        };

        Ok(Self { pool, runtime })
    }
}

impl SqlConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn fetch(&self, query: &Query) -> Result<ResultSet> {
        debug!(sql = %query.sql, params = query.params.len(), "Running PostgreSQL query");

        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = match param {
                Param::Timestamp(ts) => statement.bind(*ts),
                Param::Int(i) => statement.bind(*i),
                Param::Text(s) => statement.bind(s.clone()),
            };
        }

        let rows = self.runtime.block_on(statement.fetch_all(&self.pool))?;

        // Column metadata only arrives with rows; describe the statement
        // when there are none so the result still carries its schema.
        let columns = match rows.first() {
            Some(first) => column_names(first.columns()),
            None => {
                let described = self.runtime.block_on((&self.pool).describe(&query.sql))?;
                column_names(described.columns())
            }
        };
        let result = rows_to_result_set(columns, &rows)?;

        debug!(rows = result.len(), "PostgreSQL query complete");
        Ok(result)
    }
}

fn column_names(columns: &[PgColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn rows_to_result_set(columns: Vec<String>, rows: &[PgRow]) -> Result<ResultSet> {
    let mut result = ResultSet::new(columns);

    for row in rows {
        let mut values = Vec::with_capacity(row.len());
        for idx in 0..row.len() {
            values.push(column_to_json(row, idx)?);
        }
        result.push_row(values);
    }
    Ok(result)
}

/// PostgreSQL column types with a JSON mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PgKind {
    Bool,
    Char,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    Text,
    Bytea,
    Timestamp,
    Timestamptz,
    Date,
    Time,
    Timetz,
    Interval,
    Uuid,
    Json,
    BoolArray,
    Int2Array,
    Int4Array,
    Int8Array,
    Float4Array,
    Float8Array,
    NumericArray,
    TextArray,
}

impl PgKind {
    fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "BOOL" => PgKind::Bool,
            "\"CHAR\"" | "CHAR" => PgKind::Char,
            "INT2" => PgKind::Int2,
            "INT4" => PgKind::Int4,
            "INT8" => PgKind::Int8,
            "OID" => PgKind::Oid,
            "FLOAT4" => PgKind::Float4,
            "FLOAT8" => PgKind::Float8,
            "NUMERIC" => PgKind::Numeric,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => PgKind::Text,
            "BYTEA" => PgKind::Bytea,
            "TIMESTAMP" => PgKind::Timestamp,
            "TIMESTAMPTZ" => PgKind::Timestamptz,
            "DATE" => PgKind::Date,
            "TIME" => PgKind::Time,
            "TIMETZ" => PgKind::Timetz,
            "INTERVAL" => PgKind::Interval,
            "UUID" => PgKind::Uuid,
            "JSON" | "JSONB" => PgKind::Json,
            "BOOL[]" => PgKind::BoolArray,
            "INT2[]" => PgKind::Int2Array,
            "INT4[]" => PgKind::Int4Array,
            "INT8[]" => PgKind::Int8Array,
            "FLOAT4[]" => PgKind::Float4Array,
            "FLOAT8[]" => PgKind::Float8Array,
            "NUMERIC[]" => PgKind::NumericArray,
            "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => PgKind::TextArray,
            _ => return None,
        };
        Some(kind)
    }
}

fn column_to_json(row: &PgRow, idx: usize) -> Result<Value> {
    let column = row.column(idx);
    let type_name = column.type_info().name();
    let kind = PgKind::from_type_name(type_name).ok_or_else(|| Error::UnsupportedColumnType {
        column: column.name().to_string(),
        type_name: type_name.to_string(),
    })?;

    let value = match kind {
        PgKind::Bool => row.try_get::<Option<bool>, _>(idx)?.map(Value::from),
        PgKind::Char => row.try_get::<Option<i8>, _>(idx)?.map(Value::from),
        PgKind::Int2 => row.try_get::<Option<i16>, _>(idx)?.map(Value::from),
        PgKind::Int4 => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
        PgKind::Int8 => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        PgKind::Oid => row.try_get::<Option<Oid>, _>(idx)?.map(|oid| Value::from(oid.0)),
        PgKind::Float4 => row.try_get::<Option<f32>, _>(idx)?.map(Value::from),
        PgKind::Float8 => row.try_get::<Option<f64>, _>(idx)?.map(Value::from),
        // Rendered as text so no precision is lost.
        PgKind::Numeric => row
            .try_get::<Option<Decimal>, _>(idx)?
            .map(|d| Value::from(d.to_string())),
        PgKind::Text => row.try_get::<Option<String>, _>(idx)?.map(Value::from),
        PgKind::Bytea => row.try_get::<Option<Vec<u8>>, _>(idx)?.map(Value::from),
        PgKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|ts| Value::from(ts.to_string())),
        PgKind::Timestamptz => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        PgKind::Date => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|d| Value::from(d.to_string())),
        PgKind::Time => row
            .try_get::<Option<NaiveTime>, _>(idx)?
            .map(|t| Value::from(t.to_string())),
        PgKind::Timetz => row
            .try_get::<Option<PgTimeTz<NaiveTime, FixedOffset>>, _>(idx)?
            .map(|t| Value::from(format!("{}{}", t.time, t.offset))),
        PgKind::Interval => row.try_get::<Option<PgInterval>, _>(idx)?.map(|i| {
            json!({
                "months": i.months,
                "days": i.days,
                "microseconds": i.microseconds,
            })
        }),
        PgKind::Uuid => row
            .try_get::<Option<Uuid>, _>(idx)?
            .map(|u| Value::from(u.to_string())),
        PgKind::Json => row.try_get::<Option<Value>, _>(idx)?,
        PgKind::BoolArray => row.try_get::<Option<Vec<bool>>, _>(idx)?.map(Value::from),
        PgKind::Int2Array => row.try_get::<Option<Vec<i16>>, _>(idx)?.map(Value::from),
        PgKind::Int4Array => row.try_get::<Option<Vec<i32>>, _>(idx)?.map(Value::from),
        PgKind::Int8Array => row.try_get::<Option<Vec<i64>>, _>(idx)?.map(Value::from),
        PgKind::Float4Array => row.try_get::<Option<Vec<f32>>, _>(idx)?.map(Value::from),
        PgKind::Float8Array => row.try_get::<Option<Vec<f64>>, _>(idx)?.map(Value::from),
        PgKind::NumericArray => row.try_get::<Option<Vec<Decimal>>, _>(idx)?.map(|ds| {
            Value::from(ds.iter().map(|d| d.to_string()).collect::<Vec<_>>())
        }),
        PgKind::TextArray => row.try_get::<Option<Vec<String>>, _>(idx)?.map(Value::from),
    };

    Ok(value.unwrap_or(Value::Null))
}
