//! Typed tables over the flat record store.
//!
//! A table is a schema (ordered columns, exactly one string key column) plus
//! one record per row. Layout inside the [`RecordStore`]:
//!
//! - `table/<name>`: the schema, JSON encoded
//! - `row/<name>/<key>`: the row, a JSON array of typed column values
//!
//! Table names are restricted to ASCII alphanumerics and `_`, so a row prefix
//! can never be a prefix of another table's rows, and neither layout can
//! collide with reserved system keys such as the admin identity.

use crate::core::error::StoreError;
use crate::core::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const TABLE_PREFIX: &str = "table/";
const ROW_PREFIX: &str = "row/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Bool,
    Bytes,
    Int64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub key: bool,
}

impl ColumnDefinition {
    pub fn new(name: &str, column_type: ColumnType, key: bool) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            key,
        }
    }
}

/// A single typed column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Int64(i64),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Bool(_) => ColumnType::Bool,
            Value::Bytes(_) => ColumnType::Bytes,
            Value::Int64(_) => ColumnType::Int64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Ordered column values, one per schema column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub columns: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<Value>) -> Self {
        Self { columns }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn new(name: &str, columns: Vec<ColumnDefinition>) -> Result<Self, StoreError> {
        validate_table_name(name)?;
        let invalid = |reason: String| StoreError::InvalidSchema {
            table: name.to_string(),
            reason,
        };

        if columns.is_empty() {
            return Err(invalid("no columns".to_string()));
        }
        let mut seen = HashSet::new();
        for col in &columns {
            if col.name.is_empty() {
                return Err(invalid("empty column name".to_string()));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(invalid(format!("duplicate column '{}'", col.name)));
            }
        }

        let keys: Vec<&ColumnDefinition> = columns.iter().filter(|c| c.key).collect();
        match keys.as_slice() {
            [key] if key.column_type == ColumnType::String => {}
            [key] => {
                return Err(invalid(format!(
                    "key column '{}' must be a string column",
                    key.name
                )));
            }
            _ => {
                return Err(invalid(format!(
                    "expected exactly one key column, found {}",
                    keys.len()
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            columns,
        })
    }

    pub fn key_index(&self) -> usize {
        self.columns.iter().position(|c| c.key).unwrap_or(0)
    }

    /// Checks arity and column types; returns the row's key.
    fn check_row<'r>(&self, row: &'r Row) -> Result<&'r str, StoreError> {
        let mismatch = |reason: String| StoreError::SchemaMismatch {
            table: self.name.clone(),
            reason,
        };

        if row.columns.len() != self.columns.len() {
            return Err(mismatch(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                row.columns.len()
            )));
        }
        for (def, value) in self.columns.iter().zip(&row.columns) {
            if def.column_type != value.column_type() {
                return Err(mismatch(format!(
                    "column '{}' expects {:?}, got {:?}",
                    def.name,
                    def.column_type,
                    value.column_type()
                )));
            }
        }

        row.columns[self.key_index()]
            .as_str()
            .ok_or_else(|| mismatch("key column is not a string".to_string()))
    }
}

fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSchema {
            table: name.to_string(),
            reason: "table names are limited to ASCII letters, digits and '_'".to_string(),
        })
    }
}

fn schema_key(table: &str) -> String {
    format!("{TABLE_PREFIX}{table}")
}

fn row_prefix(table: &str) -> String {
    format!("{ROW_PREFIX}{table}/")
}

fn row_key(table: &str, key: &str) -> String {
    format!("{ROW_PREFIX}{table}/{key}")
}

fn decode_row(schema: &TableSchema, record_key: &str, bytes: &[u8]) -> Result<Row, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        key: record_key.to_string(),
        reason,
    };
    let row: Row = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    schema
        .check_row(&row)
        .map_err(|e| corrupt(e.to_string()))?;
    Ok(row)
}

pub fn create_table<S: RecordStore + ?Sized>(
    store: &mut S,
    name: &str,
    columns: Vec<ColumnDefinition>,
) -> Result<TableSchema, StoreError> {
    let schema = TableSchema::new(name, columns)?;
    let bytes = serde_json::to_vec(&schema)?;
    if !store.insert_if_absent(&schema_key(name), &bytes)? {
        return Err(StoreError::TableAlreadyExists(name.to_string()));
    }
    Ok(schema)
}

pub fn get_table<S: RecordStore + ?Sized>(
    store: &S,
    name: &str,
) -> Result<Option<TableSchema>, StoreError> {
    validate_table_name(name)?;
    let key = schema_key(name);
    match store.get(&key)? {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            }),
    }
}

fn require_table<S: RecordStore + ?Sized>(store: &S, name: &str) -> Result<TableSchema, StoreError> {
    get_table(store, name)?.ok_or_else(|| StoreError::TableNotFound(name.to_string()))
}

/// Removes the schema and every row. Returns whether the table existed.
pub fn drop_table<S: RecordStore + ?Sized>(store: &mut S, name: &str) -> Result<bool, StoreError> {
    if get_table(&*store, name)?.is_none() {
        return Ok(false);
    }
    store.delete_prefix(&row_prefix(name))?;
    store.delete(&schema_key(name))?;
    Ok(true)
}

/// Inserts `row` unless its key is taken. `Ok(false)` means a row with the
/// same key already exists; nothing was written.
pub fn insert_row<S: RecordStore + ?Sized>(
    store: &mut S,
    table: &str,
    row: &Row,
) -> Result<bool, StoreError> {
    let schema = require_table(&*store, table)?;
    let key = schema.check_row(row)?;
    let bytes = serde_json::to_vec(row)?;
    store.insert_if_absent(&row_key(table, key), &bytes)
}

pub fn get_row<S: RecordStore + ?Sized>(
    store: &S,
    table: &str,
    key: &str,
) -> Result<Row, StoreError> {
    let schema = require_table(store, table)?;
    let record_key = row_key(table, key);
    let bytes = store
        .get(&record_key)?
        .ok_or_else(|| StoreError::NotFound {
            table: table.to_string(),
            key: key.to_string(),
        })?;
    decode_row(&schema, &record_key, &bytes)
}

/// Lazily iterates every row of `table` in key order, `page_size` records
/// per store round trip.
pub fn scan_all<'s, S: RecordStore + ?Sized>(
    store: &'s S,
    table: &str,
    page_size: usize,
) -> Result<RowScan<'s, S>, StoreError> {
    let schema = require_table(store, table)?;
    Ok(RowScan {
        store,
        prefix: row_prefix(table),
        schema,
        page_size: page_size.max(1),
        page: Vec::new().into_iter(),
        cursor: None,
        done: false,
    })
}

/// One-pass row iterator returned by [`scan_all`]. Not restartable.
pub struct RowScan<'s, S: RecordStore + ?Sized> {
    store: &'s S,
    prefix: String,
    schema: TableSchema,
    page_size: usize,
    page: std::vec::IntoIter<(String, Vec<u8>)>,
    cursor: Option<String>,
    done: bool,
}

impl<S: RecordStore + ?Sized> Iterator for RowScan<'_, S> {
    type Item = Result<Row, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, bytes)) = self.page.next() {
                return Some(decode_row(&self.schema, &key, &bytes));
            }
            if self.done {
                return None;
            }
            match self
                .store
                .scan(&self.prefix, self.cursor.as_deref(), self.page_size)
            {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.done = true;
                    }
                    match page.last() {
                        Some((last, _)) => self.cursor = Some(last.clone()),
                        None => return None,
                    }
                    self.page = page.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
