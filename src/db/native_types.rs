// db/native_types.rs
// Classifies backend-native column types into exporter type codes

use crate::export::type_mapper::type_codes::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

/// How a column's values are read back from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Temporal,
    Binary,
    Other,
}

impl ValueKind {
    pub fn for_type_code(type_code: i32) -> Self {
        match type_code {
            BOOLEAN => ValueKind::Boolean,
            INTEGER | LONG => ValueKind::Integer,
            CURRENCY => ValueKind::Decimal,
            SINGLE | DOUBLE => ValueKind::Float,
            DATE => ValueKind::Temporal,
            TEXT | MEMO => ValueKind::Text,
            BINARY => ValueKind::Binary,
            _ => ValueKind::Other,
        }
    }
}

impl Dialect {
    /// Maps a native type name to a type code. `column_type` is the full declaration where the
    /// backend reports one separately (MySQL `tinyint(1)`).
    pub fn classify(self, data_type: &str, column_type: Option<&str>) -> i32 {
        let t = data_type.trim().to_lowercase();
        match self {
            Dialect::Postgres => match t.as_str() {
                "boolean" => BOOLEAN,
                "smallint" => INTEGER,
                "integer" | "bigint" => LONG,
                "money" | "numeric" => CURRENCY,
                "real" => SINGLE,
                "double precision" => DOUBLE,
                "date" | "time without time zone" | "time with time zone"
                | "timestamp without time zone" | "timestamp with time zone" => DATE,
                "character varying" | "character" => TEXT,
                "text" => MEMO,
                "bytea" => BINARY,
                _ => UNKNOWN,
            },
            Dialect::MySql => {
                if column_type.is_some_and(|c| c.trim().eq_ignore_ascii_case("tinyint(1)")) {
                    return BOOLEAN;
                }
                match t.as_str() {
                    "bit" | "bool" | "boolean" => BOOLEAN,
                    "tinyint" | "smallint" => INTEGER,
                    "mediumint" | "int" | "integer" | "bigint" => LONG,
                    "decimal" | "numeric" => CURRENCY,
                    "float" => SINGLE,
                    "double" | "real" => DOUBLE,
                    "date" | "datetime" | "timestamp" | "time" | "year" => DATE,
                    "char" | "varchar" => TEXT,
                    "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set" => MEMO,
                    "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => BINARY,
                    _ => UNKNOWN,
                }
            }
            Dialect::Sqlite => classify_sqlite(&t),
        }
    }

    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Select-list expression that brings a column back in a shape the row decoder expects.
    pub fn select_expr(self, column: &str, kind: ValueKind) -> String {
        let ident = self.quote_ident(column);
        match self {
            Dialect::Postgres => match kind {
                ValueKind::Boolean => format!("{}::bool", ident),
                ValueKind::Integer => format!("{}::int8", ident),
                ValueKind::Float => format!("{}::float8", ident),
                ValueKind::Decimal => format!("{}::numeric::text", ident),
                ValueKind::Binary => ident,
                ValueKind::Text | ValueKind::Temporal | ValueKind::Other => format!("{}::text", ident),
            },
            Dialect::MySql => match kind {
                ValueKind::Boolean | ValueKind::Integer => format!("CAST({} AS SIGNED)", ident),
                ValueKind::Float => format!("({} + 0E0)", ident),
                ValueKind::Binary => ident,
                ValueKind::Decimal | ValueKind::Text | ValueKind::Temporal | ValueKind::Other => {
                    format!("CAST({} AS CHAR)", ident)
                }
            },
            Dialect::Sqlite => ident,
        }
    }
}

/// SQLite declared types follow the column affinity rules, so match on substrings.
fn classify_sqlite(t: &str) -> i32 {
    let base = t.split('(').next().unwrap_or(t).trim();
    if base.contains("bool") {
        BOOLEAN
    } else if base == "tinyint" || base == "smallint" {
        INTEGER
    } else if base.contains("int") {
        LONG
    } else if base.contains("char") || base.contains("clob") {
        TEXT
    } else if base.contains("text") {
        MEMO
    } else if base.contains("blob") || base.is_empty() {
        BINARY
    } else if base == "float" {
        SINGLE
    } else if base.contains("real") || base.contains("doub") || base.contains("floa") {
        DOUBLE
    } else if base.contains("date") || base.contains("time") {
        DATE
    } else if base.contains("dec") || base.contains("num") || base.contains("money") {
        CURRENCY
    } else {
        UNKNOWN
    }
}

/// Length from a declaration such as `VARCHAR(50)`. Precision/scale pairs yield nothing.
pub fn declared_size(declared: &str) -> Option<i64> {
    let open = declared.find('(')?;
    let close = declared[open..].find(')')? + open;
    declared[open + 1..close].trim().parse().ok()
}
