//! Common utility functions and helper macros
//!
//! - **[`macros`]**: `impl_mode_conversions!` for mode enums
//! - **[`serde`]**: serde helpers for durations expressed in milliseconds

pub mod macros;
pub mod serde;

pub use self::serde::{duration_millis, option_duration_millis};
