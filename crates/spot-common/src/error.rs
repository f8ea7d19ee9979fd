//! Error types for spot

use thiserror::Error;

/// Result type alias for spot operations
pub type Result<T> = std::result::Result<T, SpotError>;

/// Unified error type for all spot operations
#[derive(Error, Debug, Clone)]
pub enum SpotError {
    /// Entity type declared without a datasource or fields, unknown
    /// connection name, malformed relation declaration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Condition operator the adapter cannot express.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Field type without a native column mapping.
    #[error("Unsupported field type: {0}")]
    UnsupportedFieldType(String),

    /// Schema change the adapter cannot perform.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The backing table does not exist (yet).
    ///
    /// Kept distinct from `Database` so callers can react, e.g. by running
    /// a migration and retrying.
    #[error("Datasource '{datasource}' does not exist: {message}")]
    DatasourceMissing { datasource: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unique key violation (SQLSTATE 23000 / 23505)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection pool timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpotError {
    /// Returns true if the error signals a missing table.
    pub fn is_datasource_missing(&self) -> bool {
        matches!(self, SpotError::DatasourceMissing { .. })
    }

    /// Returns true for programmer errors that will fail the same way on
    /// every attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpotError::Configuration(_)
                | SpotError::UnsupportedOperator(_)
                | SpotError::UnsupportedFieldType(_)
                | SpotError::UnsupportedOperation(_)
        )
    }
}

impl From<serde_json::Error> for SpotError {
    fn from(err: serde_json::Error) -> Self {
        SpotError::Serialization(err.to_string())
    }
}

// Driver error conversions (when the sqlx-errors feature is enabled)
#[cfg(feature = "sqlx-errors")]
impl From<sqlx::Error> for SpotError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error;
        match &err {
            Error::Configuration(_) => SpotError::Connection(err.to_string()),
            Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    let code_str: &str = &code;
                    match code_str {
                        // MySQL integrity constraint violation
                        "23000" => return SpotError::Conflict(err.to_string()),
                        // SQLite SQLITE_CONSTRAINT_UNIQUE / PRIMARYKEY
                        "2067" | "1555" => return SpotError::Conflict(err.to_string()),
                        // Connection errors (class 08)
                        code if code.starts_with("08") => {
                            return SpotError::Connection(err.to_string())
                        }
                        _ => {}
                    }
                }
                SpotError::Database(err.to_string())
            }
            Error::Io(_) => SpotError::Connection(err.to_string()),
            Error::Tls(_) => SpotError::Connection(err.to_string()),
            Error::Protocol(_) => SpotError::Connection(err.to_string()),
            Error::RowNotFound => SpotError::Query("Row not found".to_string()),
            Error::TypeNotFound { .. } => SpotError::Serialization(err.to_string()),
            Error::ColumnIndexOutOfBounds { .. } => SpotError::Query(err.to_string()),
            Error::ColumnNotFound(_) => SpotError::Query(err.to_string()),
            Error::ColumnDecode { .. } => SpotError::Serialization(err.to_string()),
            Error::Decode(_) => SpotError::Serialization(err.to_string()),
            Error::PoolTimedOut => SpotError::Timeout("Connection pool timed out".to_string()),
            Error::PoolClosed => SpotError::Connection("Connection pool closed".to_string()),
            Error::WorkerCrashed => SpotError::Internal("Worker thread crashed".to_string()),
            _ => SpotError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration() {
        let err = SpotError::Configuration("missing datasource".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing datasource");
    }

    #[test]
    fn test_error_display_unsupported_operator() {
        let err = SpotError::UnsupportedOperator(":all".to_string());
        assert_eq!(err.to_string(), "Unsupported operator: :all");
    }

    #[test]
    fn test_error_display_datasource_missing() {
        let err = SpotError::DatasourceMissing {
            datasource: "posts".to_string(),
            message: "no such table: posts".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Datasource 'posts' does not exist: no such table: posts"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: SpotError = json_err.into();
        assert!(matches!(err, SpotError::Serialization(_)));
    }

    #[test]
    fn test_is_datasource_missing() {
        let missing = SpotError::DatasourceMissing {
            datasource: "t".to_string(),
            message: String::new(),
        };
        assert!(missing.is_datasource_missing());
        assert!(!SpotError::Database("boom".to_string()).is_datasource_missing());
    }

    #[test]
    fn test_is_fatal() {
        assert!(SpotError::Configuration("x".to_string()).is_fatal());
        assert!(SpotError::UnsupportedOperator("x".to_string()).is_fatal());
        assert!(SpotError::UnsupportedFieldType("x".to_string()).is_fatal());
        assert!(!SpotError::Database("x".to_string()).is_fatal());
        assert!(!SpotError::Timeout("x".to_string()).is_fatal());
    }
}
