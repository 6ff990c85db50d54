use std::path::Path;
use thiserror::Error;

/// Analyzer error with enough context to tell which document failed
///
/// Missing attributes and missing stat blocks are not errors: builders default
/// them to zero. Only unreadable or unparseable input ends up here.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    // Input errors 1xxx
    #[error("Malformed {document} document: {message}")]
    MalformedDocument { document: &'static str, message: String },

    #[error("Unrecognized document: {0}")]
    UnrecognizedDocument(String),

    // I/O errors 2xxx
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Output errors 3xxx
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyzerError {
    /// Helper to create malformed document error
    pub fn malformed(document: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedDocument { document, message: message.into() }
    }

    /// Helper to create unrecognized document error
    pub fn unrecognized(message: impl Into<String>) -> Self {
        Self::UnrecognizedDocument(message.into())
    }

    /// Helper to create I/O error for a path
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }

    /// Re-label a malformed document error once the document kind is known
    pub fn for_document(self, document: &'static str) -> Self {
        match self {
            Self::MalformedDocument { message, .. } => Self::MalformedDocument { document, message },
            other => other,
        }
    }

    /// Stable numeric code for programmatic callers
    pub fn error_code(&self) -> i32 {
        match self {
            Self::MalformedDocument { .. } => 1001,
            Self::UnrecognizedDocument(_) => 1002,
            Self::Io { .. } => 2001,
            Self::Serialization(_) => 3001,
        }
    }
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_document_relabels_only_malformed() {
        let err = AnalyzerError::malformed("xml", "unexpected end of stream").for_document("plan");
        assert_eq!(err.to_string(), "Malformed plan document: unexpected end of stream");
        assert_eq!(err.error_code(), 1001);

        let err = AnalyzerError::unrecognized("no vertices").for_document("plan");
        assert_eq!(err.error_code(), 1002);
    }

    #[test]
    fn test_io_error_carries_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = AnalyzerError::io(Path::new("/tmp/plan.xml"), source);
        assert!(err.to_string().contains("/tmp/plan.xml"));
        assert_eq!(err.error_code(), 2001);
    }
}
