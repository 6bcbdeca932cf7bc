//! Unified error type for the promopilot library.
//!
//! Every fallible library operation returns [`Result`]. The binary converts
//! these into exit codes; the pipeline converts stage failures into failure
//! run records before propagating.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PromoError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for the promopilot library.
#[derive(Error, Debug)]
pub enum PromoError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Oracle error: {message}")]
    Oracle {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Sheet error: {message}")]
    Sheet {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Feed error: {message}")]
    Feed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Pipeline error in {step}: {message}")]
    Pipeline {
        step: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl PromoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error wrapping an underlying cause.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an oracle error.
    pub fn oracle(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
            source: None,
        }
    }

    /// Create a sheet access error.
    pub fn sheet(message: impl Into<String>) -> Self {
        Self::Sheet {
            message: message.into(),
            source: None,
        }
    }

    /// Create a feed error.
    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field.
    pub fn validation_for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a storage error with an optional path.
    pub fn storage(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a pipeline error attributed to a stage.
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            step: step.into(),
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_for_pipeline_errors() {
        let err = PromoError::pipeline("selecting_products", "oracle exhausted retries");
        assert_eq!(
            err.to_string(),
            "Pipeline error in selecting_products: oracle exhausted retries"
        );
    }

    #[test]
    fn validation_for_field_keeps_field() {
        let err = PromoError::validation_for_field("priority", "must be between 1 and 10");
        match err {
            PromoError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("priority")),
            other => panic!("unexpected variant: {other}"),
        }
    }
}
