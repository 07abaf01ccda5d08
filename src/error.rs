// error.rs
// Error kinds surfaced by the export core

use std::path::PathBuf;

/// Errors raised while resolving, rendering or writing an export.
///
/// Unrecognized column types are not errors: they render as `Unknown` and the export continues.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("table '{table}' is part of the export set but missing from the source database")]
    UnresolvedReference { table: String },

    #[error("failed to write export script to {}: {source}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("access denied by the source database while {context}: {message}")]
    ProviderAccessDenied { context: String, message: String },

    #[error("source database error while {context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("cannot read value of column '{column}' in table '{table}': {reason}")]
    UnsupportedValue {
        table: String,
        column: String,
        reason: String,
    },

    #[error("confirmation prompt failed: {0}")]
    Confirmation(String),
}

const POSTGRES_DENIED: &[&str] = &["42501", "28000", "28P01"];
const MYSQL_DENIED: &[u16] = &[1044, 1045, 1142, 1143, 1227];
const SQLITE_DENIED: &[&str] = &["3", "23"];

impl ExportError {
    /// Classifies a sqlx failure, separating permission problems from other provider errors.
    pub fn from_provider(context: impl Into<String>, err: sqlx::Error) -> Self {
        let context = context.into();
        if is_access_denied(&err) {
            return ExportError::ProviderAccessDenied {
                context,
                message: err.to_string(),
            };
        }
        ExportError::Provider {
            context,
            source: err,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, ExportError::ProviderAccessDenied { .. })
    }
}

fn is_access_denied(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(io) => io.kind() == std::io::ErrorKind::PermissionDenied,
        sqlx::Error::Database(db) => {
            if let Some(mysql) = db.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                return MYSQL_DENIED.contains(&mysql.number());
            }
            let Some(code) = db.code() else {
                return false;
            };
            let code: &str = &code;
            if db.try_downcast_ref::<sqlx::sqlite::SqliteError>().is_some() {
                SQLITE_DENIED.contains(&code)
            } else {
                POSTGRES_DENIED.contains(&code)
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_permission_denied_is_access_denied() {
        let err = sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        let mapped = ExportError::from_provider("listing tables", err);
        assert!(mapped.is_access_denied());
        assert!(mapped.to_string().contains("listing tables"));
    }

    #[test]
    fn other_errors_stay_provider_errors() {
        let mapped = ExportError::from_provider("reading rows", sqlx::Error::RowNotFound);
        assert!(matches!(mapped, ExportError::Provider { .. }));
        assert!(!mapped.is_access_denied());
    }
}
