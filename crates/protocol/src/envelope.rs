use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{Error, Result};

/// Why a call payload could not be bound against a declared signature.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BindError {
    /// A declared required parameter was not supplied.
    #[error("missing required parameter `{0}`")]
    Missing(String),

    /// A supplied parameter name is not part of the signature.
    #[error("unexpected parameter `{0}`")]
    Unexpected(String),

    /// The payload was not a mapping of parameter names to values.
    #[error("arguments must be a map of parameter names to values")]
    NotAMap,

    /// A supplied value did not match the requested type.
    #[error("parameter `{name}`: {message}")]
    Invalid {
        /// The offending parameter name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },
}

#[derive(Clone, Debug)]
struct ParamSpec {
    name: String,
    required: bool,
}

/// The declared parameter names of a procedure or client stub, fixed at
/// registration. Signatures are the only contract source; binding validates
/// every call against them.
#[derive(Clone, Debug, Default)]
pub struct Params {
    specs: Vec<ParamSpec>,
}

impl Params {
    /// Creates an empty signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required parameter.
    #[must_use]
    pub fn required(mut self, name: &str) -> Self {
        self.specs.push(ParamSpec {
            name: name.to_owned(),
            required: true,
        });
        self
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(mut self, name: &str) -> Self {
        self.specs.push(ParamSpec {
            name: name.to_owned(),
            required: false,
        });
        self
    }

    /// The declared parameter names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|spec| spec.name == name)
    }

    /// Binds a decoded call payload against the declared names.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::NotAMap`] if the payload is not a map,
    /// [`BindError::Unexpected`] for a name outside the signature, and
    /// [`BindError::Missing`] for an absent required parameter.
    pub fn bind(&self, payload: Value) -> std::result::Result<Arguments, BindError> {
        let values = match payload {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(BindError::NotAMap),
        };

        for name in values.keys() {
            if !self.contains(name) {
                return Err(BindError::Unexpected(name.clone()));
            }
        }
        for spec in &self.specs {
            if spec.required && !values.contains_key(&spec.name) {
                return Err(BindError::Missing(spec.name.clone()));
            }
        }

        Ok(Arguments { values })
    }
}

/// The decoded call payload: a mapping of parameter name to value.
///
/// Created per call and discarded once the call completes.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    /// Creates an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named argument, converting it to a wire value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Argument`] if the value cannot be serialized.
    pub fn with<T: Serialize>(mut self, name: &str, value: T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|source| Error::Argument {
            name: name.to_owned(),
            source,
        })?;
        self.values.insert(name.to_owned(), value);
        Ok(self)
    }

    /// Extracts a required argument as a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Missing`] if absent or [`BindError::Invalid`] if
    /// the value does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<T, BindError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| BindError::Missing(name.to_owned()))?;
        serde_json::from_value(value.clone()).map_err(|error| BindError::Invalid {
            name: name.to_owned(),
            message: error.to_string(),
        })
    }

    /// Extracts an optional argument as a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Invalid`] if present but not deserializable as
    /// `T`.
    pub fn get_opt<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> std::result::Result<Option<T>, BindError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|error| BindError::Invalid {
                    name: name.to_owned(),
                    message: error.to_string(),
                }),
        }
    }

    /// Whether no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The number of supplied arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Converts the arguments into the wire value carried as the request
    /// body.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}
