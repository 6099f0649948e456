//! Typed failures for every pipeline and session operation.
//!
//! Each [`PipelineError`] maps onto a coarse [`ErrorKind`] so callers (the HTTP
//! layer in particular) can branch on the kind instead of matching message text.

use serde::Serialize;
use thiserror::Error;

/// Coarse failure categories reported across the session boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ConfigurationError,
    EncoderUnavailable,
    EncodingError,
    EmptyReferenceSet,
    InsufficientSamples,
    AlignmentError,
    InvalidInput,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::EncoderUnavailable => "EncoderUnavailable",
            Self::EncodingError => "EncodingError",
            Self::EmptyReferenceSet => "EmptyReferenceSet",
            Self::InsufficientSamples => "InsufficientSamples",
            Self::AlignmentError => "AlignmentError",
            Self::InvalidInput => "InvalidInput",
            Self::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unset or invalid encoder identifier, bad chunk parameters, unknown option values.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid projection dimension {0}: expected 2 or 3")]
    InvalidProjectionDimension(usize),

    /// The model is not present in the local cache.
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// The encoder (or its tokenizer) failed. The underlying cause is kept as the source.
    #[error("encoding failed: {source:#}")]
    Encoding {
        #[source]
        source: anyhow::Error,
    },

    #[error("reference set is empty: embed at least one reference label first")]
    EmptyReferenceSet,

    #[error("insufficient samples: projection needs at least {required} items, corpus has {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    #[error("alignment error: {0}")]
    Alignment(String),

    /// The request body could not be read as the expected JSON shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("row is missing field `{field}`")]
    MissingField { field: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::InvalidProjectionDimension(_) => {
                ErrorKind::ConfigurationError
            }
            Self::EncoderUnavailable(_) => ErrorKind::EncoderUnavailable,
            Self::Encoding { .. } => ErrorKind::EncodingError,
            Self::EmptyReferenceSet => ErrorKind::EmptyReferenceSet,
            Self::InsufficientSamples { .. } => ErrorKind::InsufficientSamples,
            Self::Alignment(_) => ErrorKind::AlignmentError,
            Self::InvalidRequest(_)
            | Self::MissingField { .. }
            | Self::DimensionMismatch { .. } => ErrorKind::InvalidInput,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Wrap a collaborator failure as an encoding error.
    pub fn encoding(source: anyhow::Error) -> Self {
        Self::Encoding { source }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
