//! JSON-RPC 2.0 reserved error codes.

/// Errors whose codes and messages the JSON-RPC 2.0 specification reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardError {
    /// Payload was not valid JSON.
    ParseError,
    /// JSON was not a valid request object.
    InvalidRequest,
    /// No handler is bound to the method.
    MethodNotFound,
    /// Parameters did not fit the handler.
    InvalidParams,
    /// The handler failed in an undeclared way.
    InternalError,
}

impl StandardError {
    /// Numeric error code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// Canonical error message.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }

    /// Maps a reserved code back to its error, if it is one.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            _ => None,
        }
    }
}
