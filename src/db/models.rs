// db/models.rs
// Data structures for table metadata, relationships and row values

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub type_code: i32,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub required: bool,
    /// Type name as reported by the backend, kept for diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_type: Option<String>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_code: i32, size: Option<i64>, required: bool) -> Self {
        Self {
            name: name.into(),
            type_code,
            size,
            required,
            native_type: None,
        }
    }
}

/// A table as listed by a metadata provider: name plus columns in declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnMetadata>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Directed foreign-key edge `(source_table.source_column) -> (target_table.target_column)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

/// Everything the DDL renderer needs for one table.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub table: TableMetadata,
    pub primary_key: Vec<String>,
    pub relationships: Vec<Relationship>,
}

/// Table names are compared case-insensitively everywhere in the exporter.
pub fn same_table_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Insertion-ordered set of table names compared case-insensitively.
///
/// The first spelling inserted wins; later inserts differing only by case are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TableSet {
    names: Vec<String>,
    keys: HashSet<String>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the name was not yet present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.keys.insert(name.to_lowercase()) {
            self.names.push(name);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains(&name.to_lowercase())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_subset(&self, other: &TableSet) -> bool {
        self.names.iter().all(|n| other.contains(n))
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.insert(name);
        }
    }
}

impl PartialEq for TableSet {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl Eq for TableSet {}

impl<S: Into<String>> FromIterator<S> for TableSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TableSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a TableSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

impl From<Vec<String>> for TableSet {
    fn from(names: Vec<String>) -> Self {
        names.into_iter().collect()
    }
}

impl From<TableSet> for Vec<String> {
    fn from(set: TableSet) -> Self {
        set.names
    }
}

impl fmt::Display for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(", "))
    }
}

/// A single cell value read from a data provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    /// Exact numeric already in decimal text form (currency, numeric).
    Decimal(String),
    Boolean(bool),
    Text(String),
    /// Date/time value in the backend's default text form.
    Temporal(String),
    Binary(Vec<u8>),
    /// Any other value, in the backend's default text form.
    Other(String),
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => n
                    .as_f64()
                    .map(SqlValue::Float)
                    .unwrap_or_else(|| SqlValue::Decimal(n.to_string())),
            },
            Value::String(s) => SqlValue::Text(s),
            other => SqlValue::Other(other.to_string()),
        }
    }
}

/// One row: column name to value. Columns absent from the map read as `NULL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
