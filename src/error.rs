//! Error types shared by the weather client, the model gateway and startup
//! configuration.

use thiserror::Error;

/// Failures from the weather provider.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The upstream call failed or returned data that did not validate.
    #[error("{0}")]
    Provider(String),

    /// The provider could not resolve the requested location.
    #[error("Could not find location '{query}'")]
    NotFound { query: String },
}

impl WeatherError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures from the hosted language model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0}")]
    Request(String),

    #[error("Model request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse model response: {0}")]
    InvalidResponse(String),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Model requested more tools after {0} tool round(s)")]
    ToolLimitExceeded(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not set. {hint}")]
    MissingCredential { var: String, hint: &'static str },
}

#[derive(Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Invalid {axis} '{raw}'. Please enter a number.")]
    InvalidNumber { axis: &'static str, raw: String },

    #[error("Latitude must be between -90 and 90 degrees, got {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude must be between -180 and 180 degrees, got {0}")]
    LongitudeOutOfRange(f64),
}
