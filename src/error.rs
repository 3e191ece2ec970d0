//! Error types and handling for `TravelPack`
//!
//! Two layers live here: [`TravelPackError`] covers infrastructure failures
//! (configuration, HTTP, cache, I/O), while [`PipelineError`] is the typed
//! outcome of a single query as it moves through the orchestrator.

use std::collections::HashMap;

use chrono::NaiveDate;
use thiserror::Error;

/// Machine-readable codes attached to API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ApiNetworkError,
    ApiInvalidResponse,
    ApiLocationNotFound,
    ApiUnauthorized,
    ApiRateLimit,
}

/// Main error type for the `TravelPack` application
#[derive(Error, Debug)]
pub enum TravelPackError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// API communication errors
    #[error("API error: {message}")]
    Api {
        message: String,
        code: ErrorCode,
        context: HashMap<String, String>,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl TravelPackError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error with a network error code and no context
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::api_with_context(message, ErrorCode::ApiNetworkError, HashMap::new())
    }

    /// Create a new API error carrying a code and request context
    pub fn api_with_context<S: Into<String>>(
        message: S,
        code: ErrorCode,
        context: HashMap<String, String>,
    ) -> Self {
        Self::Api {
            message: message.into(),
            code,
            context,
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// API error code, if this is an API error
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TravelPackError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TravelPackError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            TravelPackError::Api { .. } => {
                "Unable to connect to external services. Please check your internet connection."
                    .to_string()
            }
            TravelPackError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            TravelPackError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

/// Discriminant of [`PipelineError`], stable across message wording changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AmbiguousDate,
    AmbiguousLocation,
    UnsupportedRegion,
    ForecastUnavailable,
    ReasoningFailure,
}

impl ErrorKind {
    /// Ambiguous input is answered with a clarification request, not an error
    #[must_use]
    pub fn needs_clarification(self) -> bool {
        matches!(self, ErrorKind::AmbiguousDate | ErrorKind::AmbiguousLocation)
    }
}

/// Why a query stopped before producing a recommendation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("no interpretable date in {expression:?}")]
    AmbiguousDate { expression: Option<String> },

    #[error("no identifiable location in the request")]
    AmbiguousLocation { candidate: Option<String> },

    #[error("{location} is outside the supported region")]
    UnsupportedRegion { location: String },

    #[error("forecast unavailable for {location} on {date}: {reason}")]
    ForecastUnavailable {
        location: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("reasoning failed: {reason}")]
    ReasoningFailure { reason: String },
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::AmbiguousDate { .. } => ErrorKind::AmbiguousDate,
            PipelineError::AmbiguousLocation { .. } => ErrorKind::AmbiguousLocation,
            PipelineError::UnsupportedRegion { .. } => ErrorKind::UnsupportedRegion,
            PipelineError::ForecastUnavailable { .. } => ErrorKind::ForecastUnavailable,
            PipelineError::ReasoningFailure { .. } => ErrorKind::ReasoningFailure,
        }
    }

    pub fn reasoning<S: Into<String>>(reason: S) -> Self {
        PipelineError::ReasoningFailure {
            reason: reason.into(),
        }
    }

    /// The fixed text shown to the user for this condition
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::AmbiguousDate { .. } => {
                "I'm not sure about the dates you mentioned. Could you give a specific date \
                 (for example 2025-10-20) or a number of days from now, like \"in 5 days\"?"
                    .to_string()
            }
            PipelineError::AmbiguousLocation { .. } => {
                "I need a bit more information to help you pack. Where are you travelling to, \
                 and when? For example: \"What should I pack for Chicago in 7 days?\""
                    .to_string()
            }
            PipelineError::UnsupportedRegion { location } => format!(
                "I'm sorry, but I can only provide weather-based packing advice for locations \
                 within the United States, because my forecasts come from the US National \
                 Weather Service. {location} appears to be outside the US. If you'd like, \
                 tell me a US destination instead and I'll put together a packing list for it."
            ),
            PipelineError::ForecastUnavailable { location, date, .. } => format!(
                "I couldn't retrieve a weather forecast for {location} on {date}. The National \
                 Weather Service only forecasts about a week ahead and may be temporarily \
                 unavailable. Please try a date within the next 7 days, or try again later."
            ),
            PipelineError::ReasoningFailure { .. } => {
                "I'm sorry, something went wrong while preparing your recommendation. \
                 Please try again in a moment."
                    .to_string()
            }
        }
    }
}
