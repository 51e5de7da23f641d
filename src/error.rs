//! Error types for bpresolve.
//!
//! All errors are strongly typed using thiserror. Predictors report
//! [`PredictorError`] without knowing which round they serve; the resolver
//! lifts those into [`ResolveError`] with the endpoint and round attached.

use thiserror::Error;

use crate::prediction::Target;

/// Validation errors raised before any predictor is called.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' is not numeric: {value}")]
    NotNumeric {
        field: String,
        value: String,
    },

    #[error("Field '{field}' must be a boolean")]
    NotBoolean {
        field: String,
    },

    #[error("Field '{field}' must be a finite number")]
    NotFinite {
        field: String,
    },

    #[error("Field '{field}' value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Exactly one '{group}' flag must be set, found {set}")]
    InvalidOneHot {
        group: String,
        set: usize,
    },

    #[error("Field '{field}' is produced by the resolver and cannot be supplied")]
    ReservedField {
        field: String,
    },

    #[error("Round count must be between 1 and {}, got {rounds}", crate::resolver::MAX_ROUNDS)]
    InvalidRounds {
        rounds: u32,
    },
}

/// Failure of a single predictor call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("Transport failure: {message}")]
    Transport {
        message: String,
    },

    #[error("Endpoint returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },

    #[error("Failed to encode request: {message}")]
    Encode {
        message: String,
    },

    #[error("Malformed response: {message}")]
    MalformedResponse {
        message: String,
    },
}

impl PredictorError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a malformed-response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

fn round_suffix(round: &Option<u32>) -> String {
    match round {
        Some(r) => format!(" at round {r}"),
        None => String::new(),
    }
}

/// Top-level error of a resolution run.
///
/// Every variant is terminal for the run. No estimate from a completed
/// round is ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{endpoint} predictor unavailable{}: {message}", round_suffix(.round))]
    PredictorUnavailable {
        endpoint: Target,
        round: Option<u32>,
        status: Option<u16>,
        message: String,
    },

    #[error("{endpoint} predictor returned a malformed response{}: {message}", round_suffix(.round))]
    MalformedResponse {
        endpoint: Target,
        round: Option<u32>,
        message: String,
    },

    #[error("Both predictors failed: {systolic}; {diastolic}")]
    BothFailed {
        systolic: Box<ResolveError>,
        diastolic: Box<ResolveError>,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ResolveError {
    /// Attributes a predictor failure to an endpoint and (iterative mode) a round.
    #[must_use]
    pub fn from_predictor(endpoint: Target, round: Option<u32>, err: PredictorError) -> Self {
        match err {
            PredictorError::Transport { message } | PredictorError::Encode { message } => {
                Self::PredictorUnavailable {
                    endpoint,
                    round,
                    status: None,
                    message,
                }
            }
            PredictorError::Status { status, message } => Self::PredictorUnavailable {
                endpoint,
                round,
                status: Some(status),
                message,
            },
            PredictorError::MalformedResponse { message } => Self::MalformedResponse {
                endpoint,
                round,
                message,
            },
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The endpoint that failed, if a single one did.
    #[must_use]
    pub const fn endpoint(&self) -> Option<Target> {
        match self {
            Self::PredictorUnavailable { endpoint, .. } | Self::MalformedResponse { endpoint, .. } => {
                Some(*endpoint)
            }
            _ => None,
        }
    }

    /// The 1-indexed round at which the failure happened (iterative mode only).
    #[must_use]
    pub const fn round(&self) -> Option<u32> {
        match self {
            Self::PredictorUnavailable { round, .. } | Self::MalformedResponse { round, .. } => *round,
            _ => None,
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if a predictor could not be reached or refused the call.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::PredictorUnavailable { .. })
    }

    /// Returns true if a predictor answered with an unusable body.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }

    /// Returns true if re-running the whole resolution may succeed.
    ///
    /// The resolver never retries on its own; this is a hint for callers.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::MalformedResponse { .. } | Self::Internal { .. } => false,
            Self::PredictorUnavailable { status, .. } => match status {
                Some(code) => *code >= 500,
                None => true,
            },
            Self::BothFailed {
                systolic,
                diastolic,
            } => systolic.is_retryable() && diastolic.is_retryable(),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound {
        path: String,
    },

    #[error("Failed to read config {path}: {message}")]
    ReadFailed {
        path: String,
        message: String,
    },

    #[error("Failed to parse config {path}: {message}")]
    ParseError {
        path: String,
        message: String,
    },

    #[error("Invalid config value for '{field}': {message}")]
    ValidationFailed {
        field: String,
        message: String,
    },
}

/// Result type alias for resolution runs.
pub type ResolveResult<T> = Result<T, ResolveError>;
