//! The result of one dispatch cycle.

/// How a delivery's dispatch completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler returned a value, or a notification had nothing to do.
    Success,
    /// The handler reported a failure or panicked.
    HandlerError {
        /// Error code reported on the wire.
        code: i64,
        /// Description of the failure, for logs.
        failure: String,
    },
    /// The message broke the protocol: malformed payload, invalid envelope,
    /// unroutable key, or an unbound method.
    ProtocolError {
        /// Error code reported on the wire.
        code: i64,
        /// Description of the violation, for logs.
        reason: String,
    },
    /// The message could not be handled and was dropped without a reply.
    Unroutable {
        /// Why the message was dropped.
        reason: String,
    },
}

impl DispatchOutcome {
    /// Short outcome name, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::HandlerError { .. } => "handler_error",
            Self::ProtocolError { .. } => "protocol_error",
            Self::Unroutable { .. } => "unroutable",
        }
    }

    /// Returns `true` for [`DispatchOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Wire error code, when the outcome carries one.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::HandlerError { code, .. } | Self::ProtocolError { code, .. } => Some(*code),
            Self::Success | Self::Unroutable { .. } => None,
        }
    }
}

/// What the dispatcher produced for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    /// How the cycle completed.
    pub outcome: DispatchOutcome,
    /// Encoded reply for the delivery's reply destination, if one is due.
    pub reply: Option<Vec<u8>>,
}

impl Dispatched {
    /// A cycle that produced no reply.
    #[must_use]
    pub const fn silent(outcome: DispatchOutcome) -> Self {
        Self {
            outcome,
            reply: None,
        }
    }
}
