// export/exporter.rs
// Runs an export: closure, confirmation, rendering, atomic file write

use super::confirm::ClosureConfirmation;
use super::type_mapper::TypeMapper;
use super::{data, ddl, resolver};
use crate::config::ExportSelection;
use crate::db::accessors::SourceDatabase;
use crate::db::models::{same_table_name, TableDefinition, TableMetadata, TableSet};
use crate::error::ExportError;
use futures::TryStreamExt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Resolving,
    Confirming,
    Rendering,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub resolved: TableSet,
    pub added: TableSet,
    pub uploaded: TableSet,
    pub output_path: PathBuf,
    pub rows_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Completed(ExportSummary),
    /// The caller refused the tables the closure added; nothing was written.
    Declined { added: TableSet },
}

pub struct ScriptExporter<C> {
    output_path: PathBuf,
    type_mapper: TypeMapper,
    confirmation: C,
    phase: ExportPhase,
}

impl<C: ClosureConfirmation> ScriptExporter<C> {
    pub fn new(output_path: impl Into<PathBuf>, confirmation: C) -> Self {
        Self {
            output_path: output_path.into(),
            type_mapper: TypeMapper::default(),
            confirmation,
            phase: ExportPhase::Idle,
        }
    }

    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    fn enter(&mut self, phase: ExportPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Export phase change");
        self.phase = phase;
    }

    /// Exports `selection` from `source` into the configured output file.
    ///
    /// Either the whole script is written or nothing is: output goes to a temporary file in
    /// the target directory that is renamed into place only after every table rendered.
    pub async fn export<P>(&mut self, source: &mut P, selection: &ExportSelection) -> Result<ExportOutcome, ExportError>
    where
        P: SourceDatabase + ?Sized,
    {
        self.enter(ExportPhase::Resolving);
        let result = self.run(source, selection).await;
        match &result {
            Ok(ExportOutcome::Completed(_)) => self.enter(ExportPhase::Done),
            Ok(ExportOutcome::Declined { .. }) | Err(_) => self.enter(ExportPhase::Idle),
        }
        result
    }

    async fn run<P>(&mut self, source: &mut P, selection: &ExportSelection) -> Result<ExportOutcome, ExportError>
    where
        P: SourceDatabase + ?Sized,
    {
        let resolution = resolver::resolve(source, &selection.to_export).await?;
        tracing::info!(
            selected = selection.to_export.len(),
            resolved = resolution.resolved.len(),
            added = resolution.added.len(),
            "Resolved export set"
        );

        if !resolution.added.is_empty() {
            self.enter(ExportPhase::Confirming);
            if !self.confirmation.confirm_added_tables(&resolution.added)? {
                tracing::warn!("Export cancelled: referenced tables were not confirmed");
                return Ok(ExportOutcome::Declined {
                    added: resolution.added,
                });
            }
        }

        let to_upload = selection.uploads_for(&resolution.resolved);
        for table in to_upload.iter() {
            if !resolution.resolved.contains(table) {
                tracing::warn!(table = %table, "Table selected for data upload is not exported; skipping its rows");
            }
        }

        self.enter(ExportPhase::Rendering);
        let available = source.list_tables().await?;
        let tables = order_tables(&resolution.resolved, &available)?;

        let mut script = ScriptWriter::create(&self.output_path)?;
        let mut uploaded = TableSet::new();
        let mut rows_written = 0u64;

        for table in &tables {
            let definition = TableDefinition {
                table: table.clone(),
                primary_key: source.list_primary_key_columns(&table.name).await?,
                relationships: source.list_relationships(&table.name).await?,
            };
            script.line(&format!("-- Table: {}", table.name))?;
            script.write(&ddl::render_create_table(&definition, &self.type_mapper))?;
            script.line("")?;

            if to_upload.contains(&table.name) {
                let rows = write_table_data(&mut script, source, table).await?;
                tracing::info!(table = %table.name, rows, "Exported table data");
                rows_written += rows;
                uploaded.insert(table.name.clone());
            } else {
                tracing::info!(table = %table.name, "Exported table schema");
            }
        }

        script.finish()?;
        tracing::info!(path = %self.output_path.display(), tables = tables.len(), rows = rows_written, "Export script written");

        Ok(ExportOutcome::Completed(ExportSummary {
            resolved: resolution.resolved,
            added: resolution.added,
            uploaded,
            output_path: self.output_path.clone(),
            rows_written,
        }))
    }
}

/// Metadata for every resolved table, in resolution order. Any name the source does not know
/// fails the whole export.
fn order_tables(resolved: &TableSet, available: &[TableMetadata]) -> Result<Vec<TableMetadata>, ExportError> {
    resolved
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|t| same_table_name(&t.name, name))
                .cloned()
                .ok_or_else(|| ExportError::UnresolvedReference { table: name.clone() })
        })
        .collect()
}

async fn write_table_data<P>(script: &mut ScriptWriter, source: &mut P, table: &TableMetadata) -> Result<u64, ExportError>
where
    P: SourceDatabase + ?Sized,
{
    script.line(&format!("-- Filling data for {}", table.name))?;
    let header = data::insert_header(table);
    let mut inserts = std::pin::pin!(data::render_inserts(table, source.open_rows(table)));
    let mut count = 0u64;
    while let Some(values) = inserts.try_next().await? {
        script.line(&format!("{} {};", header, values))?;
        count += 1;
    }
    script.line("")?;
    Ok(count)
}

struct ScriptWriter {
    path: PathBuf,
    out: BufWriter<NamedTempFile>,
}

impl ScriptWriter {
    fn create(path: &Path) -> Result<Self, ExportError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(".export-")
            .suffix(".sql.tmp")
            .tempfile_in(dir)
            .map_err(|e| write_failure(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    fn write(&mut self, text: &str) -> Result<(), ExportError> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|e| write_failure(&self.path, e))
    }

    fn line(&mut self, text: &str) -> Result<(), ExportError> {
        self.write(text)?;
        self.write("\n")
    }

    fn finish(self) -> Result<(), ExportError> {
        let ScriptWriter { path, out } = self;
        let file = out.into_inner().map_err(|e| write_failure(&path, e.into_error()))?;
        file.persist(&path).map_err(|e| write_failure(&path, e.error))?;
        Ok(())
    }
}

fn write_failure(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::OutputWriteFailure {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::accessors::{DataProvider, MetadataProvider};
    use crate::db::models::{ColumnMetadata, Relationship, Row};
    use crate::db::snapshot::{DatabaseSnapshot, SnapshotAccessor};
    use crate::export::confirm::AutoInclude;
    use async_trait::async_trait;
    use futures::stream::BoxStream;

    const SNAPSHOT: &str = r#"
tables:
  - name: Orders
    columns:
      - { name: id, type_code: 4, required: true }
      - { name: customer_id, type_code: 4 }
    primary_key: [id]
    foreign_keys:
      - { column: customer_id, target_table: Customers, target_column: id }
    rows:
      - { id: 10, customer_id: 1 }
  - name: Customers
    columns:
      - { name: id, type_code: 4, required: true }
      - { name: name, type_code: 10, size: 40 }
    primary_key: [id]
    rows:
      - { id: 1, name: "O'Brien" }
      - { id: 2, name: null }
  - name: Audit
    columns:
      - { name: entry, type_code: 12 }
"#;

    fn source() -> SnapshotAccessor {
        SnapshotAccessor::new(serde_yaml::from_str::<DatabaseSnapshot>(SNAPSHOT).unwrap())
    }

    fn selection(export: &[&str], upload: &[&str]) -> ExportSelection {
        ExportSelection::new(export.iter().copied().collect(), upload.iter().copied().collect())
    }

    struct Decline;

    impl ClosureConfirmation for Decline {
        fn confirm_added_tables(&mut self, _added: &TableSet) -> Result<bool, ExportError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn writes_schema_and_data_in_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        let mut exporter = ScriptExporter::new(&path, AutoInclude);
        let outcome = exporter
            .export(&mut source(), &selection(&["Orders"], &["Customers"]))
            .await
            .unwrap();

        let ExportOutcome::Completed(summary) = outcome else {
            panic!("export should complete");
        };
        assert_eq!(summary.added, ["Customers"].into_iter().collect::<TableSet>());
        assert_eq!(summary.rows_written, 2);
        assert_eq!(exporter.phase(), ExportPhase::Done);

        let script = std::fs::read_to_string(&path).unwrap();
        let expected = "\
-- Table: Orders
CREATE TABLE 'Orders' (
 'id' Long NOT NULL,
 'customer_id' Long ,
 FOREIGN KEY (customer_id) REFERENCES Customers(id),
 PRIMARY KEY (id) AUTOINCREMENT
);

-- Table: Customers
CREATE TABLE 'Customers' (
 'id' Long NOT NULL,
 'name' Text(40) ,
 PRIMARY KEY (id) AUTOINCREMENT
);

-- Filling data for Customers
INSERT INTO 'Customers' (id, name) VALUES (1, 'O''Brien');
INSERT INTO 'Customers' (id, name) VALUES (2, NULL);

";
        assert_eq!(script, expected);
    }

    #[tokio::test]
    async fn prefix_uploads_tables_added_by_closure() {
        let snapshot = r#"
tables:
  - name: Orders
    columns:
      - { name: id, type_code: 4, required: true }
      - { name: status, type_code: 10, size: 1 }
    foreign_keys:
      - { column: status, target_table: Ref_Status, target_column: code }
  - name: Ref_Status
    columns:
      - { name: code, type_code: 10, size: 1, required: true }
      - { name: label, type_code: 10, size: 20 }
    primary_key: [code]
    rows:
      - { code: "A", label: "Active" }
"#;
        let mut source = SnapshotAccessor::new(serde_yaml::from_str(snapshot).unwrap());
        let sel = selection(&["Orders"], &[]).with_upload_prefixes(vec!["Ref_".to_string()]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");

        let outcome = ScriptExporter::new(&path, AutoInclude).export(&mut source, &sel).await.unwrap();
        let ExportOutcome::Completed(summary) = outcome else {
            panic!("export should complete");
        };
        assert_eq!(summary.uploaded, ["Ref_Status"].into_iter().collect::<TableSet>());
        assert_eq!(summary.rows_written, 1);

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.ends_with(
            "-- Filling data for Ref_Status\nINSERT INTO 'Ref_Status' (code, label) VALUES ('A', 'Active');\n\n"
        ));
    }

    #[tokio::test]
    async fn output_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.sql");
        let second = dir.path().join("b.sql");
        let sel = selection(&["Orders", "Audit"], &["Orders"]);
        ScriptExporter::new(&first, AutoInclude).export(&mut source(), &sel).await.unwrap();
        ScriptExporter::new(&second, AutoInclude).export(&mut source(), &sel).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(first).unwrap(),
            std::fs::read_to_string(second).unwrap()
        );
    }

    #[tokio::test]
    async fn declining_added_tables_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        let mut exporter = ScriptExporter::new(&path, Decline);
        let outcome = exporter.export(&mut source(), &selection(&["Orders"], &[])).await.unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::Declined {
                added: ["Customers"].into_iter().collect()
            }
        );
        assert_eq!(exporter.phase(), ExportPhase::Idle);
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn closed_selection_skips_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        let mut exporter = ScriptExporter::new(&path, Decline);
        let outcome = exporter.export(&mut source(), &selection(&["Audit"], &[])).await.unwrap();
        assert!(matches!(outcome, ExportOutcome::Completed(_)));
        let script = std::fs::read_to_string(&path).unwrap();
        assert_eq!(script, "-- Table: Audit\nCREATE TABLE 'Audit' (\n 'entry' Text \n);\n\n");
    }

    #[tokio::test]
    async fn unresolved_reference_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        let mut exporter = ScriptExporter::new(&path, AutoInclude);
        let err = exporter
            .export(&mut source(), &selection(&["Orders", "Ghost"], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::UnresolvedReference { ref table } if table == "Ghost"));
        assert!(!path.exists());
        assert_eq!(exporter.phase(), ExportPhase::Idle);
    }

    #[tokio::test]
    async fn unwritable_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.sql");
        let mut exporter = ScriptExporter::new(&path, AutoInclude);
        let err = exporter.export(&mut source(), &selection(&["Audit"], &[])).await.unwrap_err();
        assert!(matches!(err, ExportError::OutputWriteFailure { .. }));
    }

    /// Lists tables but refuses to read rows.
    struct LockedRows(SnapshotAccessor);

    #[async_trait]
    impl MetadataProvider for LockedRows {
        async fn list_tables(&mut self) -> Result<Vec<TableMetadata>, ExportError> {
            self.0.list_tables().await
        }
        async fn list_relationships(&mut self, table: &str) -> Result<Vec<Relationship>, ExportError> {
            self.0.list_relationships(table).await
        }
        async fn list_primary_key_columns(&mut self, table: &str) -> Result<Vec<String>, ExportError> {
            self.0.list_primary_key_columns(table).await
        }
    }

    impl DataProvider for LockedRows {
        fn open_rows<'a>(&'a mut self, _table: &'a TableMetadata) -> BoxStream<'a, Result<Row, ExportError>> {
            Box::pin(futures::stream::once(async {
                Err(ExportError::ProviderAccessDenied {
                    context: "reading rows".into(),
                    message: "no read permission".into(),
                })
            }))
        }
    }

    #[tokio::test]
    async fn access_denied_surfaces_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql");
        let mut exporter = ScriptExporter::new(&path, AutoInclude);
        let err = exporter
            .export(&mut LockedRows(source()), &selection(&["Audit"], &["Audit"]))
            .await
            .unwrap_err();
        assert!(err.is_access_denied());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn ordering_follows_resolution() {
        let available = vec![
            TableMetadata::new("b", vec![ColumnMetadata::new("x", 4, None, false)]),
            TableMetadata::new("A", vec![]),
        ];
        let resolved: TableSet = ["B", "a"].into_iter().collect();
        let ordered = order_tables(&resolved, &available).unwrap();
        let names: Vec<&str> = ordered.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b", "A"]);
    }
}
