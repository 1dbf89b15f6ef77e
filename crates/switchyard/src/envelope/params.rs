//! Request parameters and their binding to handler arguments.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use super::errors::EnvelopeError;

/// Parameters of a request or notification.
///
/// An absent `params` member decodes as an empty [`Params::Named`] map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Params {
    /// Arguments bound by position.
    Positional(Vec<Value>),
    /// Arguments bound by name.
    Named(Map<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Self::Named(Map::new())
    }
}

impl Params {
    pub(super) fn from_member(member: Option<Value>) -> Result<Self, EnvelopeError> {
        match member {
            None => Ok(Self::default()),
            Some(Value::Array(values)) => Ok(Self::Positional(values)),
            Some(Value::Object(map)) => Ok(Self::Named(map)),
            Some(_) => Err(EnvelopeError::invalid("params must be an array or an object")),
        }
    }

    /// Number of supplied arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(map) => map.len(),
        }
    }

    /// Returns `true` when no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up an argument by its position or its name, whichever form the
    /// caller used.
    #[must_use]
    pub fn get(&self, position: usize, name: &str) -> Option<&Value> {
        match self {
            Self::Positional(values) => values.get(position),
            Self::Named(map) => map.get(name),
        }
    }

    /// Binds and deserialises a required argument.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Missing`] if the argument was not supplied and
    /// [`ParamsError::Type`] if it does not deserialise into `T`.
    pub fn require<T: DeserializeOwned>(&self, position: usize, name: &str) -> Result<T, ParamsError> {
        let value = self
            .get(position, name)
            .ok_or_else(|| ParamsError::Missing {
                name: name.to_owned(),
                position,
            })?;
        T::deserialize(value).map_err(|source| ParamsError::Type {
            name: name.to_owned(),
            message: source.to_string(),
        })
    }

    /// Binds and deserialises an optional argument; `null` counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Type`] if a supplied argument does not
    /// deserialise into `T`.
    pub fn optional<T: DeserializeOwned>(
        &self,
        position: usize,
        name: &str,
    ) -> Result<Option<T>, ParamsError> {
        match self.get(position, name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| ParamsError::Type {
                    name: name.to_owned(),
                    message: source.to_string(),
                }),
        }
    }

    /// Deserialises all arguments at once: a named map into a struct, or a
    /// positional list into a tuple or sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Shape`] if the arguments do not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ParamsError> {
        let result = match self {
            Self::Positional(values) => T::deserialize(Value::Array(values.clone())),
            Self::Named(map) => T::deserialize(Value::Object(map.clone())),
        };
        result.map_err(|source| ParamsError::Shape {
            message: source.to_string(),
        })
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self::Named(map)
    }
}

/// Failures binding parameters to handler arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    /// A required argument was not supplied.
    #[error("missing argument '{name}' (position {position})")]
    Missing {
        /// Argument name.
        name: String,
        /// Argument position.
        position: usize,
    },
    /// An argument had the wrong type.
    #[error("argument '{name}' has the wrong type: {message}")]
    Type {
        /// Argument name.
        name: String,
        /// Deserialisation failure.
        message: String,
    },
    /// The arguments as a whole did not fit the expected shape.
    #[error("parameters do not fit: {message}")]
    Shape {
        /// Deserialisation failure.
        message: String,
    },
}
