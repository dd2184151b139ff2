use thiserror::Error;

/// Errors that can occur in storage operations.
///
/// Key absence is not an error: reads return `Ok(None)`. `NotFound` exists
/// for callers that require presence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    #[error("Invalid column family: {0}")]
    InvalidColumnFamily(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::NotFound("program".to_string());
        assert!(err.to_string().contains("Not found"));
    }
}
