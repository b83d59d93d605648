//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A sampling rate was outside \[0, 100\].
    #[error("{field} should be a number between 0 and 100, got {value}")]
    NotAPercentage { field: &'static str, value: f64 },

    /// An endpoint could not be parsed as an absolute URL.
    #[error("invalid {field} URL {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// The application a RUM agent reports for.
    ApplicationId, "application ID"
);

define_string_id!(
    /// Token authorizing uploads to the intake endpoints.
    ///
    /// Tokens end up in intake URLs, so they must be non-empty.
    ClientToken, "client token"
);

define_string_id!(
    /// An opaque user session identifier.
    SessionId, "session ID"
);

impl SessionId {
    /// Generates a fresh random session identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// A sampling rate expressed in percent, within \[0, 100\].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(into = "f64")]
pub struct Percentage(f64);

impl Percentage {
    /// Everything is sampled in.
    pub const ALL: Self = Self(100.0);

    /// Creates a percentage, rejecting NaN and values outside \[0, 100\].
    pub fn new(field: &'static str, value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::NotAPercentage { field, value });
        }
        Ok(Self(value))
    }

    /// Whether a draw in \[0, 100) falls inside this percentage.
    #[must_use]
    pub fn admits(self, draw: f64) -> bool {
        draw < self.0
    }
}

impl Default for Percentage {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl From<Percentage> for f64 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}
