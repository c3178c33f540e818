use thiserror::Error;

/// Structural failures while reading variant-call text.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("I/O error while reading variants: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        IngestionError::MalformedRecord { line, reason: reason.into() }
    }

    /// Line number for `MalformedRecord`, `None` for I/O failures.
    pub fn line(&self) -> Option<usize> {
        match self {
            IngestionError::MalformedRecord { line, .. } => Some(*line),
            IngestionError::Io(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum VarprioError {
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    SecurityError(String),
}

pub type Result<T> = std::result::Result<T, VarprioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_message_names_line() {
        let err = IngestionError::malformed(7, "missing ALT column");
        assert_eq!(err.line(), Some(7));
        assert_eq!(err.to_string(), "Malformed record at line 7: missing ALT column");
    }

    #[test]
    fn test_ingestion_error_converts() {
        let err: VarprioError = IngestionError::malformed(3, "bad POS").into();
        assert!(matches!(err, VarprioError::Ingestion(_)));
        assert!(err.to_string().contains("line 3"));
    }
}
