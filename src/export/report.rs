// export/report.rs
// Writes a machine-readable summary of an export run

use super::exporter::ExportSummary;
use crate::config::FileFormat;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub source_database_type: String,
    pub output_file: String,
    pub resolved_tables: Vec<String>,
    pub added_tables: Vec<String>,
    pub uploaded_tables: Vec<String>,
    pub rows_written: u64,
    pub generated_at: DateTime<Utc>,
}

impl ExportReport {
    pub fn from_summary(summary: &ExportSummary, db_type: &str) -> Self {
        Self {
            source_database_type: db_type.to_string(),
            output_file: summary.output_path.display().to_string(),
            resolved_tables: summary.resolved.clone().into(),
            added_tables: summary.added.clone().into(),
            uploaded_tables: summary.uploaded.clone().into(),
            rows_written: summary.rows_written,
            generated_at: Utc::now(),
        }
    }
}

pub struct ReportExporter;

impl ReportExporter {
    pub fn export_report_to_file(&self, report: &ExportReport, output_file: &Path, format: FileFormat) -> Result<()> {
        let serialized = match format {
            FileFormat::Json => serde_json::to_string_pretty(report)?,
            FileFormat::Yaml => serde_yaml::to_string(report)?,
        };
        let mut file = File::create(output_file)
            .with_context(|| format!("Failed to create report file {}", output_file.display()))?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }
}
