// db/accessors.rs
// Metadata and data provider implementations for different database systems.

use super::models::*;
use super::native_types::{declared_size, Dialect, ValueKind};
use crate::error::ExportError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::{self, mysql::MySqlPoolOptions, postgres::PgPoolOptions, sqlite::SqlitePoolOptions, Row as _};
use sqlx::{TypeInfo, ValueRef};

type Result<T> = std::result::Result<T, ExportError>;

/// Schema facts about the source database.
#[async_trait]
pub trait MetadataProvider: Send {
    /// User tables with their columns in declaration order. System tables are excluded.
    async fn list_tables(&mut self) -> Result<Vec<TableMetadata>>;

    /// Outgoing foreign keys of `table`, in the backend's natural order. Unknown tables yield none.
    async fn list_relationships(&mut self, table: &str) -> Result<Vec<Relationship>>;

    /// Primary-key columns of `table` in index-column order.
    async fn list_primary_key_columns(&mut self, table: &str) -> Result<Vec<String>>;

    /// Distinct tables referenced by `table`'s foreign keys.
    async fn referenced_tables(&mut self, table: &str) -> Result<TableSet> {
        let relationships = self.list_relationships(table).await?;
        Ok(relationships.into_iter().map(|r| r.target_table).collect())
    }
}

/// Row access. The returned stream holds the provider until it is dropped.
pub trait DataProvider: Send {
    fn open_rows<'a>(&'a mut self, table: &'a TableMetadata) -> BoxStream<'a, Result<Row>>;
}

/// A backend that can serve both metadata and rows.
pub trait SourceDatabase: MetadataProvider + DataProvider {}

impl<T: MetadataProvider + DataProvider + ?Sized> SourceDatabase for T {}

fn select_rows_sql(dialect: Dialect, qualified_table: &str, table: &TableMetadata) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let expr = dialect.select_expr(&c.name, ValueKind::for_type_code(c.type_code));
            format!("{} AS {}", expr, dialect.quote_ident(&c.name))
        })
        .collect();
    format!("SELECT {} FROM {}", columns.join(", "), qualified_table)
}

fn decode_failure(table: &TableMetadata, column: &str, err: sqlx::Error) -> ExportError {
    ExportError::UnsupportedValue {
        table: table.name.clone(),
        column: column.to_string(),
        reason: err.to_string(),
    }
}

// ------------------- PostgreSQL -------------------
/// Outgoing foreign keys, one row per column pair. Referencing and referenced columns are paired
/// through `position_in_unique_constraint`, so composite keys keep their column order.
const POSTGRES_FOREIGN_KEYS_SQL: &str =
    "SELECT kcu.column_name::text AS column_name, ukcu.table_name::text AS foreign_table,
            ukcu.column_name::text AS foreign_column
     FROM information_schema.table_constraints tc
     JOIN information_schema.key_column_usage kcu
       ON kcu.constraint_name = tc.constraint_name AND kcu.constraint_schema = tc.constraint_schema
     JOIN information_schema.referential_constraints rc
       ON rc.constraint_name = tc.constraint_name AND rc.constraint_schema = tc.constraint_schema
     JOIN information_schema.key_column_usage ukcu
       ON ukcu.constraint_name = rc.unique_constraint_name
      AND ukcu.constraint_schema = rc.unique_constraint_schema
      AND ukcu.ordinal_position = kcu.position_in_unique_constraint
     WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 AND tc.table_name = $2
     ORDER BY tc.constraint_name, kcu.ordinal_position";

pub struct PostgresAccessor {
    pool: sqlx::Pool<sqlx::Postgres>,
    schema: String,
    row_query: String,
}

impl PostgresAccessor {
    pub async fn new(connection_string: &str, schema: Option<&str>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .connect(connection_string)
            .await
            .map_err(|e| ExportError::from_provider("connecting to PostgreSQL", e))?;
        Ok(Self {
            pool,
            schema: schema.unwrap_or("public").to_string(),
            row_query: String::new(),
        })
    }

    async fn get_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name::text AS table_name FROM information_schema.tables
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider("listing PostgreSQL tables", e))?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("table_name")).collect())
    }

    async fn get_columns_for_table(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let rows = sqlx::query(
            "SELECT column_name::text AS column_name, data_type::text AS data_type,
                    is_nullable::text AS is_nullable, character_maximum_length::int8 AS max_length
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider(format!("reading columns of {}", table), e))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let data_type: String = row.get("data_type");
                ColumnMetadata {
                    name: row.get("column_name"),
                    type_code: Dialect::Postgres.classify(&data_type, None),
                    size: row.get::<Option<i64>, _>("max_length"),
                    required: row.get::<String, _>("is_nullable") == "NO",
                    native_type: Some(data_type),
                }
            })
            .collect())
    }
}

#[async_trait]
impl MetadataProvider for PostgresAccessor {
    async fn list_tables(&mut self) -> Result<Vec<TableMetadata>> {
        let mut tables = Vec::new();
        for name in self.get_tables().await? {
            let columns = self.get_columns_for_table(&name).await?;
            tables.push(TableMetadata { name, columns });
        }
        Ok(tables)
    }

    async fn list_relationships(&mut self, table: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(POSTGRES_FOREIGN_KEYS_SQL)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExportError::from_provider(format!("reading foreign keys of {}", table), e))?;
        Ok(rows
            .into_iter()
            .map(|row| Relationship {
                source_table: table.to_string(),
                source_column: row.get("column_name"),
                target_table: row.get("foreign_table"),
                target_column: row.get("foreign_column"),
            })
            .collect())
    }

    async fn list_primary_key_columns(&mut self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT kcu.column_name::text AS column_name
             FROM information_schema.table_constraints tc
             JOIN information_schema.key_column_usage kcu
               ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1 AND tc.table_name = $2
             ORDER BY kcu.ordinal_position",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider(format!("reading primary key of {}", table), e))?;
        Ok(rows.into_iter().map(|row| row.get("column_name")).collect())
    }
}

impl DataProvider for PostgresAccessor {
    fn open_rows<'a>(&'a mut self, table: &'a TableMetadata) -> BoxStream<'a, Result<Row>> {
        if table.columns.is_empty() {
            return stream::empty().boxed();
        }
        let qualified = format!(
            "{}.{}",
            Dialect::Postgres.quote_ident(&self.schema),
            Dialect::Postgres.quote_ident(&table.name)
        );
        self.row_query = select_rows_sql(Dialect::Postgres, &qualified, table);
        tracing::debug!(table = %table.name, query = %self.row_query, "Opening PostgreSQL rows");
        let this: &'a Self = self;
        sqlx::query(&this.row_query)
            .fetch(&this.pool)
            .map(move |row| {
                let row = row.map_err(|e| ExportError::from_provider(format!("reading rows of {}", table.name), e))?;
                decode_postgres_row(table, &row)
            })
            .boxed()
    }
}

fn decode_postgres_row(table: &TableMetadata, row: &sqlx::postgres::PgRow) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in table.columns.iter().enumerate() {
        let fail = |e: sqlx::Error| decode_failure(table, &column.name, e);
        let value = match ValueKind::for_type_code(column.type_code) {
            ValueKind::Boolean => row.try_get::<Option<bool>, _>(idx).map_err(fail)?.map(SqlValue::Boolean),
            ValueKind::Integer => row.try_get::<Option<i64>, _>(idx).map_err(fail)?.map(SqlValue::Integer),
            ValueKind::Float => row.try_get::<Option<f64>, _>(idx).map_err(fail)?.map(SqlValue::Float),
            ValueKind::Binary => row.try_get::<Option<Vec<u8>>, _>(idx).map_err(fail)?.map(SqlValue::Binary),
            kind => row.try_get::<Option<String>, _>(idx).map_err(fail)?.map(|s| text_value(kind, s)),
        };
        out.insert(column.name.clone(), value.unwrap_or(SqlValue::Null));
    }
    Ok(out)
}

fn text_value(kind: ValueKind, s: String) -> SqlValue {
    match kind {
        ValueKind::Decimal => SqlValue::Decimal(s),
        ValueKind::Temporal => SqlValue::Temporal(s),
        ValueKind::Other => SqlValue::Other(s),
        _ => SqlValue::Text(s),
    }
}

// ------------------- MySQL -------------------
pub struct MySqlAccessor {
    pool: sqlx::Pool<sqlx::MySql>,
    database: String,
    row_query: String,
}

impl MySqlAccessor {
    pub async fn new(connection_string: &str, database: Option<&str>) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .connect(connection_string)
            .await
            .map_err(|e| ExportError::from_provider("connecting to MySQL", e))?;
        let database = match database {
            Some(db) => db.to_string(),
            None => sqlx::query_scalar::<_, Option<String>>("SELECT DATABASE()")
                .fetch_one(&pool)
                .await
                .map_err(|e| ExportError::from_provider("reading the current MySQL database", e))?
                .unwrap_or_default(),
        };
        Ok(Self {
            pool,
            database,
            row_query: String::new(),
        })
    }

    async fn get_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name AS table_name FROM information_schema.tables
             WHERE table_schema = ? AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(&self.database)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider("listing MySQL tables", e))?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("table_name")).collect())
    }

    async fn get_columns_for_table(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let rows = sqlx::query(
            "SELECT column_name AS column_name, data_type AS data_type, column_type AS column_type,
                    is_nullable AS is_nullable, CAST(character_maximum_length AS SIGNED) AS max_length
             FROM information_schema.columns
             WHERE table_schema = ? AND table_name = ?
             ORDER BY ordinal_position",
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider(format!("reading columns of {}", table), e))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let data_type: String = row.get("data_type");
                let column_type: String = row.get("column_type");
                ColumnMetadata {
                    name: row.get("column_name"),
                    type_code: Dialect::MySql.classify(&data_type, Some(&column_type)),
                    size: row.try_get::<Option<i64>, _>("max_length").ok().flatten(),
                    required: row.get::<String, _>("is_nullable") == "NO",
                    native_type: Some(column_type),
                }
            })
            .collect())
    }
}

#[async_trait]
impl MetadataProvider for MySqlAccessor {
    async fn list_tables(&mut self) -> Result<Vec<TableMetadata>> {
        let mut tables = Vec::new();
        for name in self.get_tables().await? {
            let columns = self.get_columns_for_table(&name).await?;
            tables.push(TableMetadata { name, columns });
        }
        Ok(tables)
    }

    async fn list_relationships(&mut self, table: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(
            "SELECT column_name AS column_name, referenced_table_name AS referenced_table_name,
                    referenced_column_name AS referenced_column_name
             FROM information_schema.key_column_usage
             WHERE table_schema = ? AND table_name = ? AND referenced_table_name IS NOT NULL
             ORDER BY constraint_name, ordinal_position",
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider(format!("reading foreign keys of {}", table), e))?;
        Ok(rows
            .into_iter()
            .map(|row| Relationship {
                source_table: table.to_string(),
                source_column: row.get("column_name"),
                target_table: row.get("referenced_table_name"),
                target_column: row.get("referenced_column_name"),
            })
            .collect())
    }

    async fn list_primary_key_columns(&mut self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT column_name AS column_name FROM information_schema.key_column_usage
             WHERE table_schema = ? AND table_name = ? AND constraint_name = 'PRIMARY'
             ORDER BY ordinal_position",
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider(format!("reading primary key of {}", table), e))?;
        Ok(rows.into_iter().map(|row| row.get("column_name")).collect())
    }
}

impl DataProvider for MySqlAccessor {
    fn open_rows<'a>(&'a mut self, table: &'a TableMetadata) -> BoxStream<'a, Result<Row>> {
        if table.columns.is_empty() {
            return stream::empty().boxed();
        }
        let qualified = format!(
            "{}.{}",
            Dialect::MySql.quote_ident(&self.database),
            Dialect::MySql.quote_ident(&table.name)
        );
        self.row_query = select_rows_sql(Dialect::MySql, &qualified, table);
        tracing::debug!(table = %table.name, query = %self.row_query, "Opening MySQL rows");
        let this: &'a Self = self;
        sqlx::query(&this.row_query)
            .fetch(&this.pool)
            .map(move |row| {
                let row = row.map_err(|e| ExportError::from_provider(format!("reading rows of {}", table.name), e))?;
                decode_mysql_row(table, &row)
            })
            .boxed()
    }
}

fn decode_mysql_row(table: &TableMetadata, row: &sqlx::mysql::MySqlRow) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in table.columns.iter().enumerate() {
        let fail = |e: sqlx::Error| decode_failure(table, &column.name, e);
        let value = match ValueKind::for_type_code(column.type_code) {
            ValueKind::Boolean => row
                .try_get::<Option<i64>, _>(idx)
                .map_err(fail)?
                .map(|v| SqlValue::Boolean(v != 0)),
            ValueKind::Integer => row.try_get::<Option<i64>, _>(idx).map_err(fail)?.map(SqlValue::Integer),
            ValueKind::Float => row.try_get::<Option<f64>, _>(idx).map_err(fail)?.map(SqlValue::Float),
            ValueKind::Binary => row.try_get::<Option<Vec<u8>>, _>(idx).map_err(fail)?.map(SqlValue::Binary),
            kind => row
                .try_get_unchecked::<Option<String>, _>(idx)
                .map_err(fail)?
                .map(|s| text_value(kind, s)),
        };
        out.insert(column.name.clone(), value.unwrap_or(SqlValue::Null));
    }
    Ok(out)
}

// ------------------- SQLite -------------------
pub struct SqliteAccessor {
    pool: sqlx::Pool<sqlx::Sqlite>,
    row_query: String,
}

impl SqliteAccessor {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .connect(connection_string)
            .await
            .map_err(|e| ExportError::from_provider("connecting to SQLite", e))?;
        Ok(Self {
            pool,
            row_query: String::new(),
        })
    }

    async fn get_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ExportError::from_provider("listing SQLite tables", e))?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("name")).collect())
    }

    async fn table_info(&self, table: &str) -> Result<Vec<sqlx::sqlite::SqliteRow>> {
        sqlx::query(&format!("PRAGMA table_info({})", Dialect::Sqlite.quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExportError::from_provider(format!("reading columns of {}", table), e))
    }

    async fn get_columns_for_table(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let rows = self.table_info(table).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let declared: String = row.get("type");
                ColumnMetadata {
                    name: row.get("name"),
                    type_code: Dialect::Sqlite.classify(&declared, None),
                    size: declared_size(&declared),
                    required: row.get::<i64, _>("notnull") != 0,
                    native_type: Some(declared),
                }
            })
            .collect())
    }

    async fn get_primary_keys_for_table(&self, table: &str) -> Result<Vec<String>> {
        let mut keyed: Vec<(i64, String)> = self
            .table_info(table)
            .await?
            .into_iter()
            .map(|row| (row.get::<i64, _>("pk"), row.get::<String, _>("name")))
            .filter(|(pk, _)| *pk > 0)
            .collect();
        keyed.sort_by_key(|(pk, _)| *pk);
        Ok(keyed.into_iter().map(|(_, name)| name).collect())
    }
}

#[async_trait]
impl MetadataProvider for SqliteAccessor {
    async fn list_tables(&mut self) -> Result<Vec<TableMetadata>> {
        let mut tables = Vec::new();
        for name in self.get_tables().await? {
            let columns = self.get_columns_for_table(&name).await?;
            tables.push(TableMetadata { name, columns });
        }
        Ok(tables)
    }

    async fn list_relationships(&mut self, table: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(&format!("PRAGMA foreign_key_list({})", Dialect::Sqlite.quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExportError::from_provider(format!("reading foreign keys of {}", table), e))?;
        let mut relationships = Vec::with_capacity(rows.len());
        for row in rows {
            let target_table: String = row.get("table");
            // A NULL "to" means the key references the target's primary key.
            let target_column = match row.get::<Option<String>, _>("to") {
                Some(column) => column,
                None => self
                    .get_primary_keys_for_table(&target_table)
                    .await?
                    .into_iter()
                    .next()
                    .unwrap_or_default(),
            };
            relationships.push(Relationship {
                source_table: table.to_string(),
                source_column: row.get("from"),
                target_table,
                target_column,
            });
        }
        Ok(relationships)
    }

    async fn list_primary_key_columns(&mut self, table: &str) -> Result<Vec<String>> {
        self.get_primary_keys_for_table(table).await
    }
}

impl DataProvider for SqliteAccessor {
    fn open_rows<'a>(&'a mut self, table: &'a TableMetadata) -> BoxStream<'a, Result<Row>> {
        if table.columns.is_empty() {
            return stream::empty().boxed();
        }
        let qualified = Dialect::Sqlite.quote_ident(&table.name);
        self.row_query = select_rows_sql(Dialect::Sqlite, &qualified, table);
        tracing::debug!(table = %table.name, query = %self.row_query, "Opening SQLite rows");
        let this: &'a Self = self;
        sqlx::query(&this.row_query)
            .fetch(&this.pool)
            .map(move |row| {
                let row = row.map_err(|e| ExportError::from_provider(format!("reading rows of {}", table.name), e))?;
                decode_sqlite_row(table, &row)
            })
            .boxed()
    }
}

/// SQLite values are decoded by storage class; the declared type only refines text and integers.
fn decode_sqlite_row(table: &TableMetadata, row: &sqlx::sqlite::SqliteRow) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in table.columns.iter().enumerate() {
        let fail = |e: sqlx::Error| decode_failure(table, &column.name, e);
        let raw = row.try_get_raw(idx).map_err(fail)?;
        if raw.is_null() {
            out.insert(column.name.clone(), SqlValue::Null);
            continue;
        }
        let storage = raw.type_info().name().to_string();
        let kind = ValueKind::for_type_code(column.type_code);
        let value = match storage.as_str() {
            "INTEGER" | "INT4" | "INT8" | "BOOLEAN" => {
                let v = row.try_get_unchecked::<i64, _>(idx).map_err(fail)?;
                if kind == ValueKind::Boolean {
                    SqlValue::Boolean(v != 0)
                } else {
                    SqlValue::Integer(v)
                }
            }
            "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(idx).map_err(fail)?),
            "BLOB" => SqlValue::Binary(row.try_get_unchecked::<Vec<u8>, _>(idx).map_err(fail)?),
            _ => {
                let s = row.try_get_unchecked::<String, _>(idx).map_err(fail)?;
                match kind {
                    ValueKind::Temporal => SqlValue::Temporal(s),
                    _ => SqlValue::Text(s),
                }
            }
        };
        out.insert(column.name.clone(), value);
    }
    Ok(out)
}
