//! Queue declarations bound to the service's topic exchange.
//!
//! A binding is written `name=pattern`, for example `simple=simple.*`. The
//! pattern uses topic-exchange wildcards: `*` matches exactly one
//! dot-delimited segment and `#` matches zero or more.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A queue name paired with the routing pattern it is bound with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueBinding {
    name: String,
    pattern: String,
}

impl QueueBinding {
    /// Builds a binding, validating both halves.
    ///
    /// # Errors
    ///
    /// Returns [`QueueBindingParseError`] when the name or pattern is empty, or
    /// when the pattern contains an empty segment.
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, QueueBindingParseError> {
        let queue_name = name.into();
        let routing_pattern = pattern.into();
        if queue_name.trim().is_empty() {
            return Err(QueueBindingParseError::EmptyName(routing_pattern));
        }
        if routing_pattern.is_empty() || routing_pattern.split('.').any(str::is_empty) {
            return Err(QueueBindingParseError::InvalidPattern(routing_pattern));
        }
        Ok(Self {
            name: queue_name,
            pattern: routing_pattern,
        })
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routing pattern the queue is bound with.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Display for QueueBinding {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}={}", self.name, self.pattern)
    }
}

impl FromStr for QueueBinding {
    type Err = QueueBindingParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, pattern) = input
            .split_once('=')
            .ok_or_else(|| QueueBindingParseError::MissingSeparator(input.to_owned()))?;
        Self::new(name.trim(), pattern.trim())
    }
}

impl TryFrom<String> for QueueBinding {
    type Error = QueueBindingParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QueueBinding> for String {
    fn from(value: QueueBinding) -> Self {
        value.to_string()
    }
}

/// Errors produced when parsing a [`QueueBinding`].
#[derive(Debug, Error)]
pub enum QueueBindingParseError {
    /// The `=` separating name from pattern was missing.
    #[error("queue binding '{0}' is missing the '=' separator")]
    MissingSeparator(String),
    /// The queue name was empty.
    #[error("queue binding for pattern '{0}' has an empty name")]
    EmptyName(String),
    /// The routing pattern was empty or had an empty segment.
    #[error("invalid routing pattern '{0}'")]
    InvalidPattern(String),
}
