//! Buffered, per-table record persistence.
//!
//! A [`BatchWriter`] buffers records for one table and hands them to a
//! [`TableStore`] in batches. The first buffered record of each flush decides
//! the column types, the table is created when missing, and the whole buffer is
//! inserted in one transaction. Oversized text or byte values can be moved to
//! side files before buffering.

use indexmap::IndexMap;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{BatchWriterConfig, UnloadingConfig};
use crate::constants::persistence::{
    SIDE_FILE_EXTENSION, SIDE_FILE_SCHEME, TEXT_COLUMN_LENGTH, TEXT_SEARCH_PREFIX,
    TEXT_SEARCH_TABLE,
};
use crate::errors::IndexerError;
use crate::types::{FieldName, TableName};

/// One column value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean, stored as 0/1.
    Boolean(bool),
    /// SQL `NULL`.
    Null,
}

static NULL_VALUE: FieldValue = FieldValue::Null;

impl FieldValue {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(flag) => FieldValue::Boolean(flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => FieldValue::Integer(int),
                None => FieldValue::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => FieldValue::Text(text),
            nested => FieldValue::Text(nested.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            FieldValue::Integer(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Boolean(value) => write!(f, "{value}"),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            FieldValue::Bytes(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes.as_slice())),
            FieldValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            FieldValue::Float(value) => ToSqlOutput::Owned(Value::Real(*value)),
            FieldValue::Boolean(value) => ToSqlOutput::Owned(Value::Integer(i64::from(*value))),
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// Field name to value map that keeps insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<FieldName, FieldValue>,
}

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a serializable struct into a record, one field per JSON key.
    ///
    /// Nested arrays and objects are stored as their JSON text.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, IndexerError> {
        match serde_json::to_value(value) {
            Ok(serde_json::Value::Object(map)) => Ok(map
                .into_iter()
                .map(|(name, value)| (name, FieldValue::from_json(value)))
                .collect()),
            Ok(other) => Err(IndexerError::Persistence(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(err) => Err(IndexerError::Persistence(err.to_string())),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<FieldName>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<FieldName>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FieldValue)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<FieldName>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Destination for output records.
pub trait RecordSink {
    /// Accept one record.
    fn add_record(&mut self, record: Record) -> Result<(), IndexerError>;
}

impl RecordSink for Vec<Record> {
    fn add_record(&mut self, record: Record) -> Result<(), IndexerError> {
        self.push(record);
        Ok(())
    }
}

/// Declared type of a table column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Bounded string of at most this many characters.
    Text(usize),
    /// 64-bit integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean.
    Boolean,
}

impl ColumnType {
    /// Column type for a value. Bytes and nulls fall back to bounded text.
    pub fn infer(value: &FieldValue) -> Self {
        match value {
            FieldValue::Integer(_) => ColumnType::Integer,
            FieldValue::Float(_) => ColumnType::Float,
            FieldValue::Boolean(_) => ColumnType::Boolean,
            FieldValue::Text(_) | FieldValue::Bytes(_) | FieldValue::Null => {
                ColumnType::Text(TEXT_COLUMN_LENGTH)
            }
        }
    }

    /// SQL type name.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Text(length) => format!("VARCHAR({length})"),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
        }
    }
}

/// Table name plus ordered column definitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub table: TableName,
    /// Columns in record field order.
    pub columns: Vec<(FieldName, ColumnType)>,
}

impl TableSchema {
    /// Schema whose columns follow `record`'s fields and value types.
    pub fn infer(table: impl Into<TableName>, record: &Record) -> Self {
        Self {
            table: table.into(),
            columns: record
                .iter()
                .map(|(name, value)| (name.clone(), ColumnType::infer(value)))
                .collect(),
        }
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(column, _)| column == name)
    }
}

/// SQL engine behind a [`BatchWriter`].
pub trait TableStore {
    /// Create `schema.table` unless it already exists.
    fn create_table_if_absent(&mut self, schema: &TableSchema) -> Result<(), IndexerError>;
    /// Insert all `records` atomically. Missing fields are stored as `NULL`.
    fn insert_batch(
        &mut self,
        schema: &TableSchema,
        records: &[Record],
    ) -> Result<usize, IndexerError>;
    /// Non-unique index `idx_{table}` on `column`.
    fn create_index(&mut self, table: &str, column: &str) -> Result<(), IndexerError>;
    /// Full-text index over `columns`, linked to `table` by row id and filled from it.
    fn create_text_index(&mut self, table: &str, columns: &[FieldName])
    -> Result<(), IndexerError>;
    /// Number of rows in `table`.
    fn row_count(&self, table: &str) -> Result<u64, IndexerError>;
}

/// [`TableStore`] backed by a SQLite database.
pub struct SqliteTableStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl fmt::Debug for SqliteTableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTableStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteTableStore {
    /// Open or create a database file. Parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self, IndexerError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Underlying connection, for ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl TableStore for SqliteTableStore {
    fn create_table_if_absent(&mut self, schema: &TableSchema) -> Result<(), IndexerError> {
        let table = quoted_identifier(&schema.table)?;
        let columns = schema
            .columns
            .iter()
            .map(|(name, column_type)| {
                quoted_identifier(name).map(|name| format!("{name} {}", column_type.sql_type()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            columns.join(", ")
        ))?;
        Ok(())
    }

    fn insert_batch(
        &mut self,
        schema: &TableSchema,
        records: &[Record],
    ) -> Result<usize, IndexerError> {
        let table = quoted_identifier(&schema.table)?;
        for record in records {
            if let Some((name, _)) = record.iter().find(|(name, _)| !schema.has_column(name)) {
                return Err(IndexerError::Persistence(format!(
                    "field '{name}' is not a column of table {table}"
                )));
            }
        }
        let names = schema
            .columns
            .iter()
            .map(|(name, _)| quoted_identifier(name))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = (1..=names.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            names.join(", ")
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let values = schema
                    .columns
                    .iter()
                    .map(|(name, _)| record.get(name).unwrap_or(&NULL_VALUE));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn create_index(&mut self, table: &str, column: &str) -> Result<(), IndexerError> {
        let index = quoted_identifier(&format!("idx_{table}"))?;
        let table = quoted_identifier(table)?;
        let column = quoted_identifier(column)?;
        self.conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {index} ON {table} ({column})"
        ))?;
        Ok(())
    }

    fn create_text_index(
        &mut self,
        table: &str,
        columns: &[FieldName],
    ) -> Result<(), IndexerError> {
        let content = checked_identifier(table)?;
        let table = quoted_identifier(table)?;
        let columns = columns
            .iter()
            .map(|name| quoted_identifier(name))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        self.conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {TEXT_SEARCH_TABLE} USING fts5(\
             {columns}, content='{content}', content_rowid='rowid', prefix={TEXT_SEARCH_PREFIX});\
             INSERT INTO {TEXT_SEARCH_TABLE}(rowid, {columns}) SELECT rowid, {columns} FROM {table};"
        ))?;
        Ok(())
    }

    fn row_count(&self, table: &str) -> Result<u64, IndexerError> {
        let table = quoted_identifier(table)?;
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Table and column names are interpolated into SQL; only plain identifiers
/// are accepted.
fn checked_identifier(name: &str) -> Result<&str, IndexerError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(IndexerError::Configuration(format!(
            "'{name}' is not a valid table or column name"
        )))
    }
}

/// Validated name wrapped in double quotes (columns such as `when` are keywords).
fn quoted_identifier(name: &str) -> Result<String, IndexerError> {
    checked_identifier(name).map(|name| format!("\"{name}\""))
}

/// Buffers records for one table and writes them in batches.
#[derive(Debug)]
pub struct BatchWriter<S: TableStore> {
    store: S,
    config: BatchWriterConfig,
    buffer: Vec<Record>,
    rows_written: u64,
}

impl<S: TableStore> BatchWriter<S> {
    /// Build a writer. Creates the offload directory when offloading is enabled.
    pub fn new(store: S, config: BatchWriterConfig) -> Result<Self, IndexerError> {
        checked_identifier(&config.table)?;
        if let Some(unloading) = &config.unloading {
            if config.index_key.is_none() {
                return Err(IndexerError::Configuration(format!(
                    "table '{}' offloads large values but has no index key to name side files",
                    config.table
                )));
            }
            fs::create_dir_all(&unloading.dir)?;
        }
        Ok(Self {
            store,
            config,
            buffer: Vec::new(),
            rows_written: 0,
        })
    }

    /// Buffer a record, flushing once the buffer exceeds the batch size.
    pub fn add_record(&mut self, mut record: Record) -> Result<(), IndexerError> {
        if let (Some(unloading), Some(index_key)) =
            (&self.config.unloading, &self.config.index_key)
        {
            offload_large_values(unloading, index_key, &mut record)?;
        }
        self.buffer.push(record);
        if self.buffer.len() > self.config.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write every buffered record. Returns the number of rows written.
    ///
    /// On failure the buffer is left untouched and the error is returned.
    pub fn flush(&mut self) -> Result<usize, IndexerError> {
        let Some(first) = self.buffer.first() else {
            return Ok(0);
        };
        let schema = TableSchema::infer(self.config.table.clone(), first);
        let result = self
            .store
            .create_table_if_absent(&schema)
            .and_then(|()| self.store.insert_batch(&schema, &self.buffer));
        match result {
            Ok(rows) => {
                debug!(table = %self.config.table, rows, "flushed batch");
                self.buffer.clear();
                self.rows_written += rows as u64;
                Ok(rows)
            }
            Err(err) => {
                warn!(
                    table = %self.config.table,
                    buffered = self.buffer.len(),
                    error = %err,
                    "batch flush failed"
                );
                Err(err)
            }
        }
    }

    /// Create the secondary index on the configured index key.
    pub fn create_index(&mut self) -> Result<(), IndexerError> {
        let index_key = self.config.index_key.as_deref().ok_or_else(|| {
            IndexerError::Configuration(format!(
                "table '{}' has no index key configured",
                self.config.table
            ))
        })?;
        self.store.create_index(&self.config.table, index_key)
    }

    /// Create the full-text index over the configured text fields.
    pub fn create_text_index(&mut self) -> Result<(), IndexerError> {
        if self.config.text_indexed_fields.is_empty() {
            return Err(IndexerError::Configuration(format!(
                "table '{}' has no text-indexed fields configured",
                self.config.table
            )));
        }
        self.store
            .create_text_index(&self.config.table, &self.config.text_indexed_fields)
    }

    /// Flush remaining records and hand back the store.
    pub fn finish(mut self) -> Result<S, IndexerError> {
        self.flush()?;
        Ok(self.store)
    }

    /// Records waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Rows written by successful flushes so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Writer configuration.
    pub fn config(&self) -> &BatchWriterConfig {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: TableStore> RecordSink for BatchWriter<S> {
    fn add_record(&mut self, record: Record) -> Result<(), IndexerError> {
        BatchWriter::add_record(self, record)
    }
}

/// Percent-encode `%`, `/` and `\` so a record id stays one path component.
fn file_name_component(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for ch in id.chars() {
        match ch {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '\\' => encoded.push_str("%5C"),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Move text/byte values longer than the threshold into side files.
///
/// Side files are named `{record_id}_{field}.dat`, with path separators in the
/// record id percent-encoded; the value is replaced by a
/// `file:{serving_path}/{filename}` reference of the same kind (text or bytes).
fn offload_large_values(
    unloading: &UnloadingConfig,
    index_key: &str,
    record: &mut Record,
) -> Result<(), IndexerError> {
    let record_id = match record.get(index_key) {
        Some(FieldValue::Null) | None => {
            return Err(IndexerError::Configuration(format!(
                "record has no '{index_key}' value to name side files"
            )));
        }
        Some(value) => file_name_component(&value.to_string()),
    };
    for (name, value) in record.fields.iter_mut() {
        let (payload, is_bytes): (&[u8], bool) = match &*value {
            FieldValue::Text(text) if text.chars().count() > unloading.threshold => {
                (text.as_bytes(), false)
            }
            FieldValue::Bytes(bytes) if bytes.len() > unloading.threshold => (bytes.as_slice(), true),
            _ => continue,
        };
        let filename = format!(
            "{record_id}_{}.{SIDE_FILE_EXTENSION}",
            file_name_component(name)
        );
        fs::write(unloading.dir.join(&filename), payload)?;
        let reference = format!("{SIDE_FILE_SCHEME}{}/{filename}", unloading.serving_path);
        debug!(field = %name, file = %filename, "offloaded large value");
        *value = if is_bytes {
            FieldValue::Bytes(reference.into_bytes())
        } else {
            FieldValue::Text(reference)
        };
    }
    Ok(())
}
