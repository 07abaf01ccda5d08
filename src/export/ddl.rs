// export/ddl.rs
// Renders CREATE TABLE statements from table definitions

use super::type_mapper::TypeMapper;
use crate::db::models::{ColumnMetadata, TableDefinition};

/// Renders one `CREATE TABLE` statement, terminated by `;\n`.
///
/// Identifiers are emitted as-is; a name containing `'` produces invalid SQL.
pub fn render_create_table(definition: &TableDefinition, mapper: &TypeMapper) -> String {
    let table = &definition.table;
    let mut clauses: Vec<String> = table
        .columns
        .iter()
        .map(|column| render_column(&table.name, column, mapper))
        .collect();

    for rel in &definition.relationships {
        clauses.push(format!(
            " FOREIGN KEY ({}) REFERENCES {}({})",
            rel.source_column, rel.target_table, rel.target_column
        ));
    }

    if !definition.primary_key.is_empty() {
        clauses.push(format!(
            " PRIMARY KEY ({}) AUTOINCREMENT",
            definition.primary_key.join(",")
        ));
    }

    let mut sql = format!("CREATE TABLE '{}' (\n", table.name);
    sql.push_str(&clauses.join(",\n"));
    sql.push_str("\n);\n");
    sql
}

fn render_column(table: &str, column: &ColumnMetadata, mapper: &TypeMapper) -> String {
    if mapper.lookup(column.type_code).is_none() {
        tracing::warn!(
            table,
            column = %column.name,
            type_code = column.type_code,
            native_type = column.native_type.as_deref().unwrap_or("-"),
            "Unrecognized column type, rendering as Unknown"
        );
    }
    let not_null = if column.required { "NOT NULL" } else { "" };
    format!(
        " '{}' {} {}",
        column.name,
        mapper.column_type(column.type_code, column.size),
        not_null
    )
}
