//! Error types for identifier rotation.
//!
//! This module provides structured error types for the rotation core,
//! with stable numeric codes for FFI and mobile integration.

use std::fmt;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum IdRotorErrorCode {
    /// The entropy source could not supply randomness
    EntropyUnavailable = 1000,
    /// Store or facade used before setup
    NotInitialized = 2000,
    /// A native entry point could not be redirected
    RedirectionUnavailable = 3000,
    /// A value failed the identifier format validator
    FormatInvariantViolation = 4000,
    /// Persistence collaborator failed
    Storage = 5000,
    /// Configuration could not be parsed
    Config = 6000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for rotation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdRotorError {
    /// The entropy source is exhausted or unavailable.
    EntropyUnavailable {
        /// What the entropy source reported
        reason: String,
    },

    /// An operation ran before the store was initialized.
    NotInitialized,

    /// A native entry point could not be redirected.
    RedirectionUnavailable {
        /// Entry point name (e.g. `UIDevice.identifierForVendor`)
        entry_point: String,
        /// Why the redirection failed
        reason: String,
    },

    /// A generated or stored value does not have the canonical identifier shape.
    FormatInvariantViolation {
        /// The offending value
        value: String,
    },

    /// Persistence collaborator error.
    Storage(String),

    /// Configuration could not be parsed.
    Config(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl IdRotorError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> IdRotorErrorCode {
        match self {
            Self::EntropyUnavailable { .. } => IdRotorErrorCode::EntropyUnavailable,
            Self::NotInitialized => IdRotorErrorCode::NotInitialized,
            Self::RedirectionUnavailable { .. } => IdRotorErrorCode::RedirectionUnavailable,
            Self::FormatInvariantViolation { .. } => IdRotorErrorCode::FormatInvariantViolation,
            Self::Storage(_) => IdRotorErrorCode::Storage,
            Self::Config(_) => IdRotorErrorCode::Config,
            Self::Internal(_) => IdRotorErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// Entropy failures are degraded-mode conditions and are surfaced, not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Create an entropy error from any error type.
    pub fn entropy<E: fmt::Display>(err: E) -> Self {
        Self::EntropyUnavailable {
            reason: err.to_string(),
        }
    }

    /// Create a redirection error for an entry point.
    pub fn redirection(entry_point: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RedirectionUnavailable {
            entry_point: entry_point.into(),
            reason: reason.into(),
        }
    }

    /// Create a format violation error.
    pub fn format_violation(value: impl Into<String>) -> Self {
        Self::FormatInvariantViolation {
            value: value.into(),
        }
    }
}

impl fmt::Display for IdRotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntropyUnavailable { reason } => {
                write!(f, "entropy unavailable, rotation refused: {}", reason)
            }
            Self::NotInitialized => write!(f, "identifier store not initialized, call setup first"),
            Self::RedirectionUnavailable {
                entry_point,
                reason,
            } => {
                write!(f, "cannot redirect {}: {}", entry_point, reason)
            }
            Self::FormatInvariantViolation { value } => {
                write!(f, "malformed identifier {:?}", value)
            }
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::Config(msg) => write!(f, "config error: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for IdRotorError {}

impl From<serde_json::Error> for IdRotorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
