// Exports from an on-disk SQLite database through the sqlx accessor

use db_script_exporter::config::SelectionFile;
use db_script_exporter::db::accessors::{MetadataProvider, SqliteAccessor};
use db_script_exporter::db::models::TableSet;
use db_script_exporter::export::confirm::AutoInclude;
use db_script_exporter::{ExportOutcome, ScriptExporter};
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

const SCHEMA: &[&str] = &[
    "CREATE TABLE Customers (id INTEGER PRIMARY KEY, name VARCHAR(40) NOT NULL, balance REAL, joined DATE)",
    "CREATE TABLE Orders (id INTEGER NOT NULL, line INTEGER NOT NULL, customer_id INTEGER REFERENCES Customers(id), note TEXT, PRIMARY KEY (id, line))",
    "CREATE TABLE Ref_Status (code TEXT PRIMARY KEY, label TEXT)",
    "CREATE TABLE Notes (customer_ref INTEGER REFERENCES Customers, body BLOB)",
    "INSERT INTO Customers VALUES (1, 'O''Brien', 12.5, '2024-01-02'), (2, 'Lee', NULL, NULL)",
    "INSERT INTO Ref_Status VALUES ('A', 'Active')",
];

async fn create_database(dir: &Path) -> String {
    let url = format!("sqlite://{}?mode=rwc", dir.join("source.db").display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
    url
}

#[tokio::test]
async fn sqlite_metadata_is_read_in_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let url = create_database(dir.path()).await;
    let mut accessor = SqliteAccessor::new(&url).await.unwrap();

    let tables = accessor.list_tables().await.unwrap();
    let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Customers", "Notes", "Orders", "Ref_Status"]);

    let orders = tables.iter().find(|t| t.name == "Orders").unwrap();
    let columns: Vec<&str> = orders.column_names().collect();
    assert_eq!(columns, vec!["id", "line", "customer_id", "note"]);

    assert_eq!(accessor.list_primary_key_columns("Orders").await.unwrap(), vec!["id", "line"]);
    let referenced = accessor.referenced_tables("Orders").await.unwrap();
    assert_eq!(referenced, ["Customers"].into_iter().collect::<TableSet>());
}

#[tokio::test]
async fn implicit_foreign_key_target_uses_primary_key() {
    let dir = tempfile::tempdir().unwrap();
    let url = create_database(dir.path()).await;
    let mut accessor = SqliteAccessor::new(&url).await.unwrap();

    let rels = accessor.list_relationships("Notes").await.unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].target_table, "Customers");
    assert_eq!(rels[0].target_column, "id");
}

#[tokio::test]
async fn sqlite_export_writes_closed_script() {
    let dir = tempfile::tempdir().unwrap();
    let url = create_database(dir.path()).await;
    let mut accessor = SqliteAccessor::new(&url).await.unwrap();

    let all: Vec<String> = accessor
        .list_tables()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    let selection = SelectionFile::default()
        .merge(
            &["Orders".to_string(), "Ref_Status".to_string()],
            &["Customers".to_string()],
            &["Ref_".to_string()],
        )
        .into_selection(&all);

    let output = dir.path().join("export.sql");
    let mut exporter = ScriptExporter::new(&output, AutoInclude);
    let outcome = exporter.export(&mut accessor, &selection).await.unwrap();
    let ExportOutcome::Completed(summary) = outcome else {
        panic!("export should complete");
    };
    assert_eq!(summary.added, ["Customers"].into_iter().collect::<TableSet>());
    assert_eq!(summary.rows_written, 3);

    let script = std::fs::read_to_string(&output).unwrap();
    let expected = "\
-- Table: Orders
CREATE TABLE 'Orders' (
 'id' Long NOT NULL,
 'line' Long NOT NULL,
 'customer_id' Long ,
 'note' Text ,
 FOREIGN KEY (customer_id) REFERENCES Customers(id),
 PRIMARY KEY (id,line) AUTOINCREMENT
);

-- Table: Ref_Status
CREATE TABLE 'Ref_Status' (
 'code' Text ,
 'label' Text ,
 PRIMARY KEY (code) AUTOINCREMENT
);

-- Filling data for Ref_Status
INSERT INTO 'Ref_Status' (code, label) VALUES ('A', 'Active');

-- Table: Customers
CREATE TABLE 'Customers' (
 'id' Long ,
 'name' Text(40) NOT NULL,
 'balance' Double ,
 'joined' Date ,
 PRIMARY KEY (id) AUTOINCREMENT
);

-- Filling data for Customers
INSERT INTO 'Customers' (id, name, balance, joined) VALUES (1, 'O''Brien', 12.5, '2024-01-02');
INSERT INTO 'Customers' (id, name, balance, joined) VALUES (2, 'Lee', NULL, NULL);

";
    assert_eq!(script, expected);
}
