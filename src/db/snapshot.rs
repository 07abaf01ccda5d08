// db/snapshot.rs
// File-backed metadata and data provider (YAML or JSON)

use super::accessors::{DataProvider, MetadataProvider};
use super::models::*;
use super::native_types::ValueKind;
use crate::config::FileFormat;
use crate::error::ExportError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SnapshotForeignKey {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SnapshotTable {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<SnapshotForeignKey>,
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DatabaseSnapshot {
    pub tables: Vec<SnapshotTable>,
}

/// Serves a [`DatabaseSnapshot`] through the provider traits. Column types are DAO codes.
#[derive(Debug, Clone, Default)]
pub struct SnapshotAccessor {
    snapshot: DatabaseSnapshot,
}

impl SnapshotAccessor {
    pub fn new(snapshot: DatabaseSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: DatabaseSnapshot = match FileFormat::from_path(path) {
            FileFormat::Yaml => serde_yaml::from_str(&raw)?,
            FileFormat::Json => serde_json::from_str(&raw)?,
        };
        tracing::debug!(path = %path.display(), tables = snapshot.tables.len(), "Loaded snapshot");
        Ok(Self::new(snapshot))
    }

    fn find(&self, table: &str) -> Option<&SnapshotTable> {
        self.snapshot
            .tables
            .iter()
            .find(|t| same_table_name(&t.name, table))
    }
}

#[async_trait]
impl MetadataProvider for SnapshotAccessor {
    async fn list_tables(&mut self) -> std::result::Result<Vec<TableMetadata>, ExportError> {
        Ok(self
            .snapshot
            .tables
            .iter()
            .map(|t| TableMetadata::new(t.name.clone(), t.columns.clone()))
            .collect())
    }

    async fn list_relationships(&mut self, table: &str) -> std::result::Result<Vec<Relationship>, ExportError> {
        let Some(found) = self.find(table) else {
            return Ok(Vec::new());
        };
        Ok(found
            .foreign_keys
            .iter()
            .map(|fk| Relationship {
                source_table: found.name.clone(),
                source_column: fk.column.clone(),
                target_table: fk.target_table.clone(),
                target_column: fk.target_column.clone(),
            })
            .collect())
    }

    async fn list_primary_key_columns(&mut self, table: &str) -> std::result::Result<Vec<String>, ExportError> {
        Ok(self.find(table).map(|t| t.primary_key.clone()).unwrap_or_default())
    }
}

impl DataProvider for SnapshotAccessor {
    fn open_rows<'a>(
        &'a mut self,
        table: &'a TableMetadata,
    ) -> BoxStream<'a, std::result::Result<Row, ExportError>> {
        let rows: Vec<BTreeMap<String, serde_json::Value>> =
            self.find(&table.name).map(|t| t.rows.clone()).unwrap_or_default();
        stream::iter(rows.into_iter().map(move |row| {
            Ok(row
                .into_iter()
                .map(|(column, value)| {
                    let kind = table
                        .columns
                        .iter()
                        .find(|c| c.name == column)
                        .map(|c| ValueKind::for_type_code(c.type_code));
                    (column, typed_value(kind, value))
                })
                .collect::<Row>())
        }))
        .boxed()
    }
}

/// JSON strings stored for decimal or temporal columns keep their column kind.
fn typed_value(kind: Option<ValueKind>, value: serde_json::Value) -> SqlValue {
    match (kind, value) {
        (Some(ValueKind::Decimal), serde_json::Value::String(s)) => SqlValue::Decimal(s),
        (Some(ValueKind::Temporal), serde_json::Value::String(s)) => SqlValue::Temporal(s),
        (_, value) => SqlValue::from(value),
    }
}
