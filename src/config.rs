// config.rs
// Export selection and the files it can be loaded from

use crate::db::models::TableSet;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    Json,
    #[value(alias = "yml")]
    Yaml,
}

impl FileFormat {
    /// `.yaml`/`.yml` select YAML; everything else is treated as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
            Some(ext) if ext == "yaml" || ext == "yml" => FileFormat::Yaml,
            _ => FileFormat::Json,
        }
    }
}

/// Tables to export. `to_upload` tables also get their rows exported, as does every exported
/// table (including ones added by the foreign-key closure) whose name starts with one of
/// `upload_prefixes`.
///
/// `to_upload` is expected to be a subset of `to_export`; this is not enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSelection {
    pub to_export: TableSet,
    pub to_upload: TableSet,
    #[serde(default)]
    pub upload_prefixes: Vec<String>,
}

impl ExportSelection {
    pub fn new(to_export: TableSet, to_upload: TableSet) -> Self {
        Self {
            to_export,
            to_upload,
            upload_prefixes: Vec::new(),
        }
    }

    pub fn with_upload_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.upload_prefixes = prefixes;
        self
    }

    /// Upload set for the resolved tables: explicit uploads plus every resolved table matching a
    /// prefix.
    pub fn uploads_for(&self, resolved: &TableSet) -> TableSet {
        let mut uploads = self.to_upload.clone();
        for name in resolved {
            if self.upload_prefixes.iter().any(|p| name.starts_with(p.as_str())) && uploads.insert(name.clone()) {
                tracing::debug!(table = %name, "Table added to upload set by prefix");
            }
        }
        uploads
    }

    pub fn uploads_outside_export(&self) -> Vec<&str> {
        self.to_upload
            .iter()
            .filter(|t| !self.to_export.contains(t))
            .map(String::as_str)
            .collect()
    }
}

/// On-disk selection: `export`, `upload` and `upload_prefixes` lists, all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionFile {
    #[serde(default)]
    pub export: Vec<String>,
    #[serde(default)]
    pub upload: Vec<String>,
    #[serde(default)]
    pub upload_prefixes: Vec<String>,
}

impl SelectionFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read selection file {}", path.display()))?;
        let file = match FileFormat::from_path(path) {
            FileFormat::Yaml => serde_yaml::from_str(&raw)
                .with_context(|| format!("Invalid YAML selection in {}", path.display()))?,
            FileFormat::Json => serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON selection in {}", path.display()))?,
        };
        Ok(file)
    }

    /// Combines file contents with command-line lists; command-line entries come after.
    pub fn merge(mut self, export: &[String], upload: &[String], upload_prefixes: &[String]) -> Self {
        self.export.extend_from_slice(export);
        self.upload.extend_from_slice(upload);
        self.upload_prefixes.extend_from_slice(upload_prefixes);
        self
    }

    /// Builds the selection. An empty export list means every table in `all_tables`.
    pub fn into_selection(self, all_tables: &[String]) -> ExportSelection {
        let to_export: TableSet = if self.export.is_empty() {
            all_tables.iter().cloned().collect()
        } else {
            self.export.into_iter().collect()
        };
        ExportSelection::new(to_export, self.upload.into_iter().collect())
            .with_upload_prefixes(self.upload_prefixes)
    }
}
