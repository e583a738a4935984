//! Whole-table access to the order database
//!
//! Tables are read in full into a [`RawTable`] of dynamically typed values.
//! Typed validation happens afterwards in [`crate::schema`].

use crate::error::{ForecastError, Result};
use polars::prelude::*;
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Product reference table
pub const BIKES_TABLE: &str = "bikes";
/// Shop reference table
pub const BIKESHOPS_TABLE: &str = "bikeshops";
/// Transaction table
pub const ORDERLINES_TABLE: &str = "orderlines";

/// A single dynamically typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Infer a value from an untyped text field, as read from CSV
    pub fn infer(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() || matches!(trimmed, "NA" | "NaN" | "null" | "NULL") {
            return Value::Null;
        }
        if let Ok(integer) = trimmed.parse::<i64>() {
            return Value::Integer(integer);
        }
        if let Ok(real) = trimmed.parse::<f64>() {
            return Value::Real(real);
        }
        Value::Text(field.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text content, if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Short storage-class name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(value: rusqlite::types::Value) -> Self {
        match value {
            rusqlite::types::Value::Null => Value::Null,
            rusqlite::types::Value::Integer(v) => Value::Integer(v),
            rusqlite::types::Value::Real(v) => Value::Real(v),
            rusqlite::types::Value::Text(v) => Value::Text(v),
            rusqlite::types::Value::Blob(v) => Value::Text(String::from_utf8_lossy(&v).into_owned()),
        }
    }
}

/// All rows of one source table, with column names exactly as stored
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Create a table, checking that every row matches the header width
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let name = name.into();
        if let Some(position) = rows.iter().position(|row| row.len() != columns.len()) {
            return Err(ForecastError::SchemaError(format!(
                "Table '{}' row {} has {} values but {} columns",
                name,
                position,
                rows[position].len(),
                columns.len()
            )));
        }
        Ok(Self { name, columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Index of a column that must be present
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column).ok_or_else(|| {
            ForecastError::SchemaError(format!(
                "Table '{}' has no column '{}' (columns: {})",
                self.name,
                column,
                self.columns.join(", ")
            ))
        })
    }

    /// Drop serialized dataframe index columns (`Unnamed: 0`, `index`, blank headers).
    ///
    /// Returns the names of the dropped columns.
    pub fn drop_index_artifacts(&mut self) -> Vec<String> {
        let artifact = |name: &str| {
            let trimmed = name.trim();
            trimmed.is_empty() || trimmed.starts_with("Unnamed:") || trimmed == "index"
        };
        let keep: Vec<bool> = self.columns.iter().map(|name| !artifact(name)).collect();
        if keep.iter().all(|&k| k) {
            return Vec::new();
        }

        let dropped: Vec<String> = self
            .columns
            .iter()
            .zip(keep.iter())
            .filter(|(_, &k)| !k)
            .map(|(name, _)| name.clone())
            .collect();
        self.columns = retain_flagged(std::mem::take(&mut self.columns), &keep);
        for row in self.rows.iter_mut() {
            *row = retain_flagged(std::mem::take(row), &keep);
        }
        debug!(table = %self.name, dropped = ?dropped, "Dropped index columns");
        dropped
    }

    /// Polars view of the table for inspection and export.
    ///
    /// Columns holding only integers become `Int64`, numeric columns `Float64`
    /// and anything else `Utf8`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut series = Vec::with_capacity(self.columns.len());
        for (index, column) in self.columns.iter().enumerate() {
            let cells: Vec<&Value> = self.rows.iter().map(|row| &row[index]).collect();
            let all_integer = cells
                .iter()
                .all(|v| matches!(v, Value::Null | Value::Integer(_)));
            let all_numeric = cells
                .iter()
                .all(|v| matches!(v, Value::Null | Value::Integer(_) | Value::Real(_)));

            let s = if all_integer {
                let values: Vec<Option<i64>> = cells
                    .iter()
                    .map(|v| match v {
                        Value::Integer(i) => Some(*i),
                        _ => None,
                    })
                    .collect();
                Series::new(column, values)
            } else if all_numeric {
                let values: Vec<Option<f64>> = cells
                    .iter()
                    .map(|v| match v {
                        Value::Integer(i) => Some(*i as f64),
                        Value::Real(r) => Some(*r),
                        _ => None,
                    })
                    .collect();
                Series::new(column, values)
            } else {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|v| if v.is_null() { None } else { Some(v.to_string()) })
                    .collect();
                Series::new(column, values)
            };
            series.push(s);
        }
        Ok(DataFrame::new(series)?)
    }
}

fn retain_flagged<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep.iter())
        .filter(|(_, &k)| k)
        .map(|(item, _)| item)
        .collect()
}

/// Reject table names that are not plain identifiers
fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ForecastError::QueryError(format!(
            "Invalid table name '{}'",
            name
        )))
    }
}

/// Anything that can serve whole tables by name
pub trait TableSource {
    /// Read every row of `name`
    fn read_table(&self, name: &str) -> Result<RawTable>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Read-only SQLite database handle.
///
/// The connection is released when the source is dropped; [`SqliteSource::close`]
/// releases it explicitly and reports failures.
#[derive(Debug)]
pub struct SqliteSource {
    path: PathBuf,
    conn: Connection,
}

impl SqliteSource {
    /// Open an existing database file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ForecastError::ConnectionError(format!(
                "Database file not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            ForecastError::ConnectionError(format!("Cannot open {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Opened SQLite source");
        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the tables in the database, sorted
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Release the connection, surfacing close errors
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| {
            ForecastError::ConnectionError(format!("Cannot close {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Closed SQLite source");
        Ok(())
    }
}

impl TableSource for SqliteSource {
    fn read_table(&self, name: &str) -> Result<RawTable> {
        validate_table_name(name)?;
        let sql = format!("SELECT * FROM \"{}\"", name);
        let mut stmt = self.conn.prepare(&sql).map_err(|e| {
            ForecastError::QueryError(format!("Cannot read table '{}': {}", name, e))
        })?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, rusqlite::types::Value>(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<rusqlite::Result<Vec<Vec<Value>>>>()?;

        debug!(table = name, rows = rows.len(), columns = width, "Read table");
        RawTable::new(name, columns, rows)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// Directory of `<table>.csv` files with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(ForecastError::ConnectionError(format!(
                "CSV directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }
}

impl TableSource for CsvSource {
    fn read_table(&self, name: &str) -> Result<RawTable> {
        validate_table_name(name)?;
        let path = self.table_path(name);
        if !path.is_file() {
            return Err(ForecastError::QueryError(format!(
                "Table '{}' not found at {}",
                name,
                path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::infer).collect());
        }

        debug!(table = name, rows = rows.len(), columns = columns.len(), "Read CSV table");
        RawTable::new(name, columns, rows)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.dir.display())
    }
}
