//! Shared test helpers for `decorum-core` integration tests.
//!
//! Provides an error type shaped like a caller's own, and scripted callables
//! that count invocations so tests can assert on exactly how often the
//! wrapped function ran.

#![allow(dead_code)]

pub mod callables;

use std::time::Duration;

use decorum_common::error::{ErrorClassification, ErrorSeverity};
use decorum_core::DecoratorError;
use thiserror::Error;

/// Caller-side error with one extra variant for decorator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Failure raised by the wrapped callable itself
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Failure raised by a decorator
    #[error(transparent)]
    Decorator(#[from] DecoratorError),
}

impl ServiceError {
    /// Shorthand for an upstream failure
    pub fn upstream(message: &str) -> Self {
        Self::Upstream(message.to_string())
    }
}

impl ErrorClassification for ServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream(_) => true,
            Self::Decorator(err) => err.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Upstream(_) => ErrorSeverity::Error,
            Self::Decorator(err) => err.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Upstream(_) => None,
            Self::Decorator(err) => err.retry_after(),
        }
    }
}

/// Install the test subscriber (honours `RUST_LOG`)
pub fn init_tracing() {
    decorum_common::testing::init_test_tracing();
}
