//! Error taxonomy for the decorator engine
//!
//! Decorators distinguish two kinds of failure:
//!
//! 1. **Decorator errors** ([`DecoratorError`]): conditions raised by a
//!    decorator itself, without (or instead of) running the wrapped callable.
//!    A circuit breaker rejecting a call, a throttle window refusing a call,
//!    a timed-out call, an aggregate of failed parallel calls.
//!
//! 2. **Pass-through errors**: whatever the wrapped callable returned. These
//!    flow through memoize, retry (final attempt), lock, semaphore and batch
//!    untouched.
//!
//! Callables are generic over their own error type `E`. Decorators inject
//! their errors through an `E: From<DecoratorError>` bound, so a caller's
//! error enum only needs one extra variant:
//!
//! ```rust
//! use decorum_common::error::DecoratorError;
//! use thiserror::Error;
//!
//! #[derive(Debug, Clone, Error)]
//! pub enum FetchError {
//!     #[error("upstream returned {0}")]
//!     Upstream(u16),
//!
//!     #[error(transparent)]
//!     Decorator(#[from] DecoratorError),
//! }
//! ```
//!
//! `DecoratorError` itself satisfies the bound, which is convenient for tests
//! and for callables that never fail on their own.
//!
//! ## Severity
//!
//! | Variant | Retryable | Severity |
//! |---------|-----------|----------|
//! | `CircuitOpen` | no | Warning |
//! | `Throttled` | yes | Warning |
//! | `Timeout` | yes | Warning |
//! | `Cancelled` | no | Info |
//! | `StateViolation` | no | Error |
//! | `ValidationFailed` | no | Error |
//! | `SwitchNoMatch` | no | Error |
//! | `Aggregate` | no | Error |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result alias for builder validation and settings parsing
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by decorators themselves
///
/// Every variant is cheap to clone so that a single outcome can be shared by
/// all callers collapsed into one execution (debounce, throttle, batch).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoratorError {
    /// Circuit breaker rejected the call without running it
    #[error("circuit breaker is open, rejecting call")]
    CircuitOpen,

    /// A leading-edge throttle refused the call inside an active window
    #[error("call throttled, window closes in {remaining:?}")]
    Throttled { remaining: Duration },

    /// The decorator was asked to do something its state does not permit
    #[error("state violation: {message}")]
    StateViolation { message: String },

    /// One or more argument validators rejected the call
    #[error("validation failed: {}", messages.join("; "))]
    ValidationFailed { messages: Vec<String> },

    /// No switch branch matched and no default branch was configured
    #[error("no branch matches selector '{selector}'")]
    SwitchNoMatch { selector: String },

    /// The wrapped call did not settle within the allotted time
    #[error("call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Some of a group of parallel calls failed
    #[error("{} of {total} calls failed", failures.len())]
    Aggregate {
        /// Number of calls launched
        total: usize,
        /// Index and rendered error of every failed call, in input order
        failures: Vec<(usize, String)>,
    },

    /// A pending call was dropped before it settled (cancel, reset, shutdown)
    #[error("pending call was cancelled before it settled")]
    Cancelled,
}

impl DecoratorError {
    /// Create a state violation error
    pub fn state_violation<S: Into<String>>(message: S) -> Self {
        Self::StateViolation { message: message.into() }
    }

    /// Create a validation error from collected messages
    pub fn validation<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ValidationFailed { messages: messages.into_iter().map(Into::into).collect() }
    }

    /// Create a switch no-match error
    pub fn no_match<S: Into<String>>(selector: S) -> Self {
        Self::SwitchNoMatch { selector: selector.into() }
    }

    /// Whether the error means "the decorator refused in its current state"
    ///
    /// Throttle rejections are a state violation in this sense: the call
    /// was refused because of the window, not because anything failed.
    pub fn is_state_violation(&self) -> bool {
        matches!(self, Self::StateViolation { .. } | Self::Throttled { .. })
    }
}

impl ErrorClassification for DecoratorError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitOpen | Self::Throttled { .. } | Self::Timeout { .. } => {
                ErrorSeverity::Warning
            }
            Self::Cancelled => ErrorSeverity::Info,
            Self::StateViolation { .. }
            | Self::ValidationFailed { .. }
            | Self::SwitchNoMatch { .. }
            | Self::Aggregate { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

/// Invalid decorator configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to parse {format} settings: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Failed to read settings file '{path}': {message}")]
    Io { path: String, message: String },
}

impl ConfigError {
    /// Create an invalid-configuration error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid { message: message.into() }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse { format: "JSON", message: err.to_string() }
    }
}

/// Error classification trait for consistent error handling across modules
///
/// Implemented by [`DecoratorError`]; callers' error types may implement it
/// too so retry predicates can be written once:
///
/// ```rust
/// use decorum_common::error::{DecoratorError, ErrorClassification};
///
/// let retryable = |err: &DecoratorError| err.is_retryable();
/// assert!(!retryable(&DecoratorError::CircuitOpen));
/// ```
pub trait ErrorClassification {
    /// Check if this error is retryable
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error types
    //!
    //! Tests cover display formatting, classification and
    //! configuration error conversions.

    use super::*;

    #[test]
    fn test_decorator_error_display() {
        assert_eq!(DecoratorError::CircuitOpen.to_string(), "circuit breaker is open, rejecting call");
        assert_eq!(
            DecoratorError::validation(["name is empty", "age is negative"]).to_string(),
            "validation failed: name is empty; age is negative"
        );
        assert_eq!(
            DecoratorError::no_match("purple").to_string(),
            "no branch matches selector 'purple'"
        );

        let aggregate = DecoratorError::Aggregate {
            total: 3,
            failures: vec![(0, "boom".to_string()), (2, "bang".to_string())],
        };
        assert_eq!(aggregate.to_string(), "2 of 3 calls failed");
    }

    #[test]
    fn test_state_violation_classification() {
        assert!(DecoratorError::state_violation("zero iterations").is_state_violation());
        assert!(DecoratorError::Throttled { remaining: Duration::from_millis(5) }
            .is_state_violation());
        assert!(!DecoratorError::CircuitOpen.is_state_violation());
    }

    #[test]
    fn test_error_classification() {
        let throttled = DecoratorError::Throttled { remaining: Duration::from_millis(40) };
        assert!(throttled.is_retryable());
        assert_eq!(throttled.retry_after(), Some(Duration::from_millis(40)));
        assert_eq!(throttled.severity(), ErrorSeverity::Warning);

        assert!(!DecoratorError::CircuitOpen.is_retryable());
        assert_eq!(DecoratorError::Cancelled.severity(), ErrorSeverity::Info);
        assert_eq!(
            DecoratorError::Aggregate { total: 1, failures: vec![] }.severity(),
            ErrorSeverity::Error
        );
        assert!(!DecoratorError::CircuitOpen.is_critical());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }

    #[test]
    fn test_config_error_from_json() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let config_err = ConfigError::from(err);
        assert!(matches!(config_err, ConfigError::Parse { format: "JSON", .. }));
    }
}
