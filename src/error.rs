//! Error types and handling for the forecast-delta application

use thiserror::Error;

/// Main error type for the forecast-delta application
#[derive(Error, Debug)]
pub enum ForecastDeltaError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// API communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl ForecastDeltaError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ForecastDeltaError::Config { .. } => {
                "Configuration error. Please check your config file and service key.".to_string()
            }
            ForecastDeltaError::Api { .. } => {
                "Unable to connect to external services. Please check your internet connection."
                    .to_string()
            }
            ForecastDeltaError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            ForecastDeltaError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            ForecastDeltaError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            ForecastDeltaError::General { message } => message.clone(),
        }
    }
}

/// Typed failure of a single forecast fetch attempt.
///
/// The variant decides what the orchestrator does next: `Timeout` retries the
/// same query, `Malformed` retries with an earlier issuance, `Fatal` stops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Network slow or unresponsive
    #[error("forecast request timed out")]
    Timeout,

    /// Response arrived but could not be used
    #[error("malformed forecast response: {0}")]
    Malformed(String),

    /// Cancellation or an unrecoverable error
    #[error("fatal forecast error: {0}")]
    Fatal(String),
}

impl FetchFailure {
    /// Create a malformed-response failure
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::Malformed(message.into())
    }

    /// Create a fatal failure
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal(message.into())
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchFailure::Fatal(_))
    }
}

/// Geocoding collaborator errors
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Geocoding API error: {0}")]
    Api(String),
}

impl From<GeocodeError> for ForecastDeltaError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NotFound(place) => {
                ForecastDeltaError::validation(format!("Location not found: {place}"))
            }
            GeocodeError::Api(message) => ForecastDeltaError::api(message),
        }
    }
}
