//! Testing utilities and helpers
//!
//! - **[`async_utils`]**: timeouts, polling and task-settling helpers that
//!   behave under `tokio::time::pause()`
//! - **[`tracing`](mod@self::tracing)**: one-shot test subscriber setup
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use decorum_common::testing::{init_test_tracing, settle, timeout_ok};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_timer_fires() {
//!     init_test_tracing();
//!     let value = timeout_ok(Duration::from_secs(1), async { 42 }).await.unwrap();
//!     settle().await;
//!     assert_eq!(value, 42);
//! }
//! ```

pub mod async_utils;
pub mod tracing;

pub use async_utils::{poll_until, settle, timeout_ok};
pub use self::tracing::init_test_tracing;
