// export/data.rs
// Renders row data into INSERT statements with quoted literals

use crate::db::models::{Row, SqlValue, TableMetadata};
use crate::error::ExportError;
use futures::{Stream, TryStreamExt};

/// `INSERT INTO '<table>' (<col>, ...) VALUES`, listing every declared column in order.
pub fn insert_header(table: &TableMetadata) -> String {
    let columns: Vec<&str> = table.column_names().collect();
    format!("INSERT INTO '{}' ({}) VALUES", table.name, columns.join(", "))
}

/// Lazily turns a row stream into one `(<v1>, <v2>, ...)` clause per row.
///
/// The stream is single-pass; rendering the table again means reopening its rows.
pub fn render_inserts<'a, S>(
    table: &'a TableMetadata,
    rows: S,
) -> impl Stream<Item = Result<String, ExportError>> + 'a
where
    S: Stream<Item = Result<Row, ExportError>> + 'a,
{
    rows.map_ok(move |row| render_values(table, &row))
}

pub fn render_values(table: &TableMetadata, row: &Row) -> String {
    let values: Vec<String> = table
        .columns
        .iter()
        .map(|column| render_literal(row.get(&column.name).unwrap_or(&SqlValue::Null)))
        .collect();
    format!("({})", values.join(", "))
}

/// Formats one value as a SQL literal.
///
/// Only text values get quote doubling; temporal, boolean, binary and other values are
/// wrapped in quotes verbatim.
pub fn render_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Decimal(d) => d.clone(),
        SqlValue::Boolean(b) => format!("'{}'", b),
        SqlValue::Temporal(s) | SqlValue::Other(s) => format!("'{}'", s),
        SqlValue::Binary(bytes) => format!("'{}'", hex(bytes)),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ColumnMetadata;
    use crate::export::type_mapper::type_codes::*;
    use futures::stream;

    fn people() -> TableMetadata {
        TableMetadata::new(
            "People",
            vec![
                ColumnMetadata::new("id", LONG, None, true),
                ColumnMetadata::new("name", TEXT, Some(50), false),
                ColumnMetadata::new("born", DATE, None, false),
            ],
        )
    }

    #[test]
    fn literal_quoting() {
        assert_eq!(render_literal(&SqlValue::Text("O'Brien".into())), "'O''Brien'");
        assert_eq!(render_literal(&SqlValue::Null), "NULL");
        assert_eq!(render_literal(&SqlValue::Integer(42)), "42");
        assert_eq!(render_literal(&SqlValue::Float(2.5)), "2.5");
        assert_eq!(render_literal(&SqlValue::Decimal("10.25".into())), "10.25");
    }

    #[test]
    fn other_values_are_quoted_verbatim() {
        assert_eq!(
            render_literal(&SqlValue::Temporal("2024-01-02 03:04:05".into())),
            "'2024-01-02 03:04:05'"
        );
        assert_eq!(render_literal(&SqlValue::Boolean(true)), "'true'");
        assert_eq!(render_literal(&SqlValue::Binary(vec![0x0a, 0xff])), "'0aff'");
    }

    #[test]
    fn header_lists_all_columns() {
        assert_eq!(insert_header(&people()), "INSERT INTO 'People' (id, name, born) VALUES");
    }

    #[test]
    fn missing_columns_render_as_null() {
        let row: Row = [("id", SqlValue::Integer(7))].into_iter().collect();
        assert_eq!(render_values(&people(), &row), "(7, NULL, NULL)");
    }

    #[tokio::test]
    async fn renders_rows_lazily_in_order() {
        let table = people();
        let rows = stream::iter(vec![
            Ok([("id", SqlValue::Integer(1)), ("name", SqlValue::Text("Ann".into()))]
                .into_iter()
                .collect::<Row>()),
            Ok([("id", SqlValue::Integer(2)), ("born", SqlValue::Temporal("1990-05-01".into()))]
                .into_iter()
                .collect::<Row>()),
        ]);
        let lines: Vec<String> = render_inserts(&table, rows).try_collect().await.unwrap();
        assert_eq!(lines, vec!["(1, 'Ann', NULL)", "(2, NULL, '1990-05-01')"]);
    }

    #[tokio::test]
    async fn provider_errors_pass_through() {
        let table = people();
        let rows = stream::iter(vec![Err(ExportError::UnresolvedReference {
            table: "People".into(),
        })]);
        let result: Result<Vec<String>, _> = render_inserts(&table, rows).try_collect().await;
        assert!(matches!(result, Err(ExportError::UnresolvedReference { .. })));
    }
}
