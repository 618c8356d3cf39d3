use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SprinklerError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Hardware write failure on pin {pin}: {reason}")]
    HardwareWriteFailure { pin: u8, reason: String },

    #[error("Component '{component}' not found for product {product_id}")]
    ComponentNotFound { product_id: i64, component: String },

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl SprinklerError {
    /// True for errors caused by the store being unreachable rather than by the data in it.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            SprinklerError::StorageUnavailable(_) | SprinklerError::ConnectionClosed
        )
    }
}

impl From<rusqlite::Error> for SprinklerError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::PermissionDenied => {
                    SprinklerError::StorageUnavailable(error.to_string())
                }
                _ => SprinklerError::Database(error),
            },
            _ => SprinklerError::Database(error),
        }
    }
}

pub type Result<T> = std::result::Result<T, SprinklerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_open_is_storage_unavailable() {
        let error = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            Some("unable to open database file".to_string()),
        );

        let converted = SprinklerError::from(error);
        assert!(matches!(converted, SprinklerError::StorageUnavailable(_)));
        assert!(converted.is_connection_error());
    }

    #[test]
    fn test_query_error_is_not_connection_error() {
        let converted = SprinklerError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(converted, SprinklerError::Database(_)));
        assert!(!converted.is_connection_error());
    }
}
