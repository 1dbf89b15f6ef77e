//! Failures raised while decoding inbound envelopes.

use thiserror::Error;

use super::codes::StandardError;

/// Errors surfaced by [`Envelope::decode`](super::Envelope::decode).
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Payload is not valid JSON.
    #[error("malformed payload: {message}")]
    Parse {
        /// Description of the syntax failure.
        message: String,
        /// Underlying JSON error, when one was produced.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Payload is JSON but not a JSON-RPC 2.0 message.
    #[error("invalid envelope: {message}")]
    Invalid {
        /// Which rule of the envelope shape was violated.
        message: String,
    },
}

impl EnvelopeError {
    /// Creates a parse error from a serde error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::Parse {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a parse error with a custom message.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid envelope error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// The JSON-RPC error this failure is reported as.
    #[must_use]
    pub const fn standard_error(&self) -> StandardError {
        match self {
            Self::Parse { .. } => StandardError::ParseError,
            Self::Invalid { .. } => StandardError::InvalidRequest,
        }
    }

    /// Stable failure kind name carried in `error.data.exception`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "ParseError",
            Self::Invalid { .. } => "InvalidEnvelope",
        }
    }
}
