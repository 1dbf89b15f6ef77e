//! Failures building or querying the handler registry.

use thiserror::Error;

/// Errors raised by [`HandlerRegistry`](super::HandlerRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A capability name does not follow the `on_<action>` convention.
    #[error("capability '{name}' is not named on_<action>")]
    InvalidName {
        /// The offending capability name.
        name: String,
    },
    /// A capability is named `on_` with nothing after the prefix.
    #[error("capability '{name}' has an empty action")]
    EmptyAction {
        /// The offending capability name.
        name: String,
    },
    /// Two capabilities bind the same action.
    #[error("action '{action}' is bound more than once")]
    DuplicateAction {
        /// The action bound twice.
        action: String,
    },
    /// More than one fallback handler was supplied.
    #[error("the on_message fallback is bound more than once")]
    DuplicateFallback,
    /// No handler is bound to the method and there is no fallback.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The method that was looked up.
        method: String,
    },
}

impl RegistryError {
    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Creates an empty action error.
    pub fn empty_action(name: impl Into<String>) -> Self {
        Self::EmptyAction { name: name.into() }
    }

    /// Creates a duplicate action error.
    pub fn duplicate_action(action: impl Into<String>) -> Self {
        Self::DuplicateAction {
            action: action.into(),
        }
    }

    /// Creates a method not found error.
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }
}
