//! Backoff strategies and jitter for retry delays
//!
//! Strategies are pure: the delay depends only on the attempt number, which
//! starts at 1 for the delay that follows the first failed attempt.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::utils::serde::{duration_millis, option_duration_millis};

/// Backoff strategy for calculating retry delays
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Constant {
        #[serde(with = "duration_millis")]
        delay: Duration,
    },
    /// `initial_delay + increment * (attempt - 1)`
    Linear {
        #[serde(with = "duration_millis")]
        initial_delay: Duration,
        #[serde(with = "duration_millis")]
        increment: Duration,
    },
    /// `initial_delay * multiplier^(attempt - 1)`, optionally capped
    Exponential {
        #[serde(with = "duration_millis")]
        initial_delay: Duration,
        multiplier: f64,
        #[serde(default, with = "option_duration_millis")]
        max_delay: Option<Duration>,
    },
    /// Custom backoff function of the attempt number
    #[serde(skip)]
    Custom(fn(u32) -> Duration),
}

impl BackoffStrategy {
    /// Fixed delay
    pub fn constant(delay: Duration) -> Self {
        Self::Constant { delay }
    }

    /// Linearly growing delay
    pub fn linear(initial_delay: Duration, increment: Duration) -> Self {
        Self::Linear { initial_delay, increment }
    }

    /// Uncapped exponential delay
    pub fn exponential(initial_delay: Duration, multiplier: f64) -> Self {
        Self::Exponential { initial_delay, multiplier, max_delay: None }
    }

    /// Exponential delay that never exceeds `max_delay`
    pub fn exponential_capped(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self::Exponential { initial_delay, multiplier, max_delay: Some(max_delay) }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// An attempt of 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let step = attempt.max(1) - 1;
        match self {
            Self::Constant { delay } => *delay,
            Self::Linear { initial_delay, increment } => {
                initial_delay.saturating_add(increment.saturating_mul(step))
            }
            Self::Exponential { initial_delay, .. } if initial_delay.is_zero() => Duration::ZERO,
            Self::Exponential { initial_delay, multiplier, max_delay } => {
                let exponent = i32::try_from(step).unwrap_or(i32::MAX);
                let secs = initial_delay.as_secs_f64() * multiplier.powi(exponent);
                let cap = max_delay.unwrap_or(Duration::MAX);
                // Non-finite or out-of-range products saturate at the cap
                Duration::try_from_secs_f64(secs).map_or(cap, |delay| delay.min(cap))
            }
            Self::Custom(f) => f(attempt),
        }
    }

    /// Validate strategy parameters
    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            Self::Exponential { multiplier, .. } if !(multiplier.is_finite() && *multiplier > 0.0) => {
                Err(ConfigError::invalid("exponential multiplier must be a positive number"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Constant { delay: Duration::from_millis(100) }
    }
}

impl fmt::Debug for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant { delay } => f.debug_struct("Constant").field("delay", delay).finish(),
            Self::Linear { initial_delay, increment } => f
                .debug_struct("Linear")
                .field("initial_delay", initial_delay)
                .field("increment", increment)
                .finish(),
            Self::Exponential { initial_delay, multiplier, max_delay } => f
                .debug_struct("Exponential")
                .field("initial_delay", initial_delay)
                .field("multiplier", multiplier)
                .field("max_delay", max_delay)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Randomization applied on top of a backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Use the computed delay as is
    #[default]
    None,
    /// Uniform in `0..=delay`
    Full,
    /// Uniform in `delay/2..=delay`
    Equal,
}

impl Jitter {
    /// Apply jitter to a computed delay
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        match self {
            Self::None => delay,
            Self::Full if millis == 0 => delay,
            Self::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=millis)),
            Self::Equal => {
                let half = millis / 2;
                let spread = millis - half;
                Duration::from_millis(half + rand::thread_rng().gen_range(0..=spread))
            }
        }
    }
}
