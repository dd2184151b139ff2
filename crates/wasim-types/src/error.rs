use thiserror::Error;

/// Errors that can occur in type operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Invalid id format: {0}")]
    InvalidIdFormat(String),

    #[error("Invalid id length: expected 32, got {0}")]
    InvalidIdLength(usize),

    #[error("Invalid hash length: expected 32, got {0}")]
    InvalidHashLength(usize),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypesError::InvalidIdLength(16);
        assert!(err.to_string().contains("expected 32"));
    }
}
