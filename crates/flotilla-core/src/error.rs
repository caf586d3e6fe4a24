// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Flotilla operations
#[derive(Error, Debug, Diagnostic)]
pub enum FlotillaError {
    /// Label selector could not be compiled
    #[error("Invalid label selector: {reason}")]
    #[diagnostic(
        code(flotilla::invalid_selector),
        help("In and NotIn need at least one value; Exists and DoesNotExist take no values")
    )]
    InvalidSelector {
        #[allow(unused)]
        reason: String,
    },

    /// Validation failed
    #[error("Validation failed for {resource_type}: {details}")]
    #[diagnostic(
        code(flotilla::validation_failed),
        help("{help_text}")
    )]
    ValidationFailed {
        #[allow(unused)]
        resource_type: String,
        #[allow(unused)]
        details: String,
        #[allow(unused)]
        help_text: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(flotilla::serialization_error),
        help("Ensure the document is valid JSON or YAML in the placement API format")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File could not be read
    #[error("Failed to read {path}")]
    #[diagnostic(
        code(flotilla::io_error),
        help("Check that the file exists and is readable")
    )]
    IoError {
        #[allow(unused)]
        path: String,
        #[source]
        #[allow(unused)]
        source: std::io::Error,
    },
}

/// Result type alias for Flotilla operations
pub type Result<T> = std::result::Result<T, FlotillaError>;

impl FlotillaError {
    /// Create an InvalidSelector error
    pub fn invalid_selector(reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            reason: reason.into(),
        }
    }

    /// Create a ValidationFailed error
    pub fn validation_failed(
        resource_type: impl Into<String>,
        details: impl Into<String>,
        help_text: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            resource_type: resource_type.into(),
            details: details.into(),
            help_text: help_text.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create an IoError
    pub fn io_error(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = FlotillaError::invalid_selector("values must be non-empty for operator In");
        assert!(matches!(err, FlotillaError::InvalidSelector { .. }));
        assert!(err.to_string().contains("operator In"));

        let err = FlotillaError::validation_failed(
            "ClusterResourcePlacement",
            "resource selector sets both name and label selector",
            "Select resources either by name or by label selector",
        );
        assert!(matches!(err, FlotillaError::ValidationFailed { .. }));
    }
}
