use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OpenFlags, params_from_iter};

use crate::error::{BidlensError, Result};
use crate::gateway::Warehouse;
use crate::models::result_set::{format_iso_date, parse_iso_date};
use crate::models::{ColumnDescriptor, ResultSet, Row, ScalarValue};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Warehouse backed by a single SQLite connection opened read-only.
#[derive(Debug)]
pub struct SqliteWarehouse {
    connection: Connection,
    path: Option<PathBuf>,
}

impl SqliteWarehouse {
    pub fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if !path.is_file() {
            return Err(BidlensError::store_unavailable(format!(
                "warehouse file not found: {}",
                path.display()
            )));
        }

        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(map_sqlite_error)?;
        connection
            .busy_timeout(busy_timeout)
            .map_err(map_sqlite_error)?;

        tracing::debug!(path = %path.display(), "opened warehouse read-only");
        Ok(Self {
            connection,
            path: Some(path.to_path_buf()),
        })
    }

    /// Wraps an existing connection; the caller is responsible for its access mode.
    #[must_use]
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            path: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Warehouse for SqliteWarehouse {
    fn query(&mut self, sql: &str, params: &[ScalarValue]) -> Result<ResultSet> {
        let mut statement = self.connection.prepare(sql).map_err(map_sqlite_error)?;
        let column_names = statement
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let date_columns = statement
            .columns()
            .iter()
            .map(|column| column.decl_type().is_some_and(is_date_type))
            .collect::<Vec<_>>();

        let bound = params.iter().map(sql_value_from_scalar).collect::<Vec<_>>();
        let mut rows = statement
            .query(params_from_iter(bound.iter()))
            .map_err(map_sqlite_error)?;

        let mut result_rows = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqlite_error)? {
            let mut values = Vec::with_capacity(column_names.len());
            for index in 0..column_names.len() {
                let value = row
                    .get::<usize, SqlValue>(index)
                    .map_err(map_sqlite_error)?;
                let is_date = date_columns.get(index).copied().unwrap_or(false);
                values.push(scalar_from_sql(value, is_date));
            }
            result_rows.push(Row::new(values));
        }

        Ok(ResultSet::new(sql, column_names, result_rows))
    }

    fn describe(&mut self, dataset: &str) -> Result<Vec<ColumnDescriptor>> {
        let pragma_sql = format!("PRAGMA table_info({})", sqlite_single_quoted(dataset));
        let mut statement = self
            .connection
            .prepare(&pragma_sql)
            .map_err(map_sqlite_error)?;

        let column_rows = statement
            .query_map([], |row| {
                Ok(ColumnDescriptor {
                    name: row.get::<usize, String>(1)?,
                    data_type: row
                        .get::<usize, Option<String>>(2)?
                        .filter(|declared| !declared.is_empty())
                        .unwrap_or_else(|| "ANY".to_string()),
                    nullable: row.get::<usize, i64>(3)? == 0,
                })
            })
            .map_err(map_sqlite_error)?;

        column_rows
            .map(|row| row.map_err(map_sqlite_error))
            .collect()
    }
}

fn is_date_type(declared: &str) -> bool {
    declared.trim().eq_ignore_ascii_case("date")
}

fn sqlite_single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn sql_value_from_scalar(value: &ScalarValue) -> SqlValue {
    match value {
        ScalarValue::Integer(value) => SqlValue::Integer(*value),
        ScalarValue::Float(value) => SqlValue::Real(*value),
        ScalarValue::Text(value) => SqlValue::Text(value.clone()),
        ScalarValue::Date(value) => SqlValue::Text(format_iso_date(*value)),
        ScalarValue::Null => SqlValue::Null,
    }
}

fn scalar_from_sql(value: SqlValue, is_date_column: bool) -> ScalarValue {
    match value {
        SqlValue::Null => ScalarValue::Null,
        SqlValue::Integer(value) => ScalarValue::Integer(value),
        SqlValue::Real(value) => ScalarValue::Float(value),
        SqlValue::Text(value) if is_date_column => match parse_iso_date(&value) {
            Some(date) => ScalarValue::Date(date),
            None => ScalarValue::Text(value),
        },
        SqlValue::Text(value) => ScalarValue::Text(value),
        SqlValue::Blob(value) => ScalarValue::Text(encode_blob_hex(&value)),
    }
}

fn map_sqlite_error(error: rusqlite::Error) -> BidlensError {
    let code = match &error {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
        _ => None,
    };

    match code {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::PermissionDenied
            | ErrorCode::OutOfMemory,
        ) => BidlensError::store_unavailable(error.to_string()),
        Some(ErrorCode::ReadOnly) => BidlensError::WriteNotAllowed {
            leading_keyword: "unknown".to_string(),
            reason: format!("warehouse connection is read-only: {error}"),
        },
        _ => BidlensError::query_failed(error.to_string()),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
