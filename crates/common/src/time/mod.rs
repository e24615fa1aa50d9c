//! Time abstractions used by decorators
//!
//! - **[`clock`]**: monotonic clocks (system, mock, tokio-driven) so that
//!   time-based state machines can be tested deterministically
//! - **[`timer`]**: cancellable one-shot timers on the tokio runtime, the
//!   "schedule after / cancel" service behind debounce, throttle and batch
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use decorum_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! ```

pub mod clock;
#[cfg(feature = "runtime")]
pub mod timer;

#[cfg(feature = "runtime")]
pub use clock::TokioClock;
pub use clock::{Clock, MockClock, SystemClock};
#[cfg(feature = "runtime")]
pub use timer::TimerHandle;
