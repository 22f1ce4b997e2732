use rusqlite::ErrorCode;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for archgraph
#[derive(Error, Debug)]
pub enum GraphError {
    /// Missing or malformed input (bad id format, empty name, non-finite number)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced id, metric name or edge does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique key already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient store failure (busy, locked, unreachable)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Unclassified failure. Details are only in the server log under `correlation_id`.
    #[error("Internal error (ref {correlation_id})")]
    Internal { correlation_id: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Log `detail` under a fresh correlation id and return the opaque error.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        let correlation_id = Uuid::new_v4().simple().to_string();
        log::error!("[{}] {}", correlation_id, detail);
        GraphError::Internal { correlation_id }
    }

    /// HTTP-equivalent status for the transport layer.
    pub fn status_code(&self) -> u16 {
        match self {
            GraphError::Validation(_) => 400,
            GraphError::NotFound(_) => 404,
            GraphError::Conflict(_) => 409,
            GraphError::StorageUnavailable(_) => 503,
            GraphError::Internal { .. } | GraphError::Config(_) | GraphError::Io(_) => 500,
        }
    }

    /// Whether the caller may retry the operation once.
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::StorageUnavailable(_))
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            GraphError::Validation(_)
            | GraphError::NotFound(_)
            | GraphError::Conflict(_)
            | GraphError::Internal { .. } => self.to_string(),
            GraphError::StorageUnavailable(_) => "Storage unavailable, try again".to_string(),
            GraphError::Config(_) | GraphError::Io(_) => "Internal error".to_string(),
        }
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
            match ffi_err.code {
                ErrorCode::ConstraintViolation => match ffi_err.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                        log::debug!("Unique constraint rejected write: {}", err);
                        return GraphError::Conflict("key already exists".to_string());
                    }
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        log::debug!("Foreign key constraint rejected write: {}", err);
                        return GraphError::NotFound("referenced entity does not exist".to_string());
                    }
                    _ => {}
                },
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull => {
                    log::warn!("Graph store unavailable: {}", err);
                    return GraphError::StorageUnavailable(format!("{:?}", ffi_err.code));
                }
                _ => {}
            }
        }
        GraphError::internal(err)
    }
}

/// Convenient Result type using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;
