//! Macros for reducing boilerplate code
//!
//! Mode enums (eviction policies, debounce and throttle edges, breaker
//! states) all need the same lowercase string form for logging and settings
//! files.

/// Implements `Display` and `FromStr` for a fieldless mode enum
///
/// Parsing is case-insensitive and also accepts `-` in place of `_`, so
/// `"Half-Open"` and `"half_open"` both parse.
///
/// ```rust
/// use decorum_common::impl_mode_conversions;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Edge {
///     Leading,
///     Trailing,
/// }
///
/// impl_mode_conversions!(Edge {
///     Leading => "leading",
///     Trailing => "trailing",
/// });
///
/// assert_eq!("LEADING".parse::<Edge>(), Ok(Edge::Leading));
/// assert_eq!(Edge::Trailing.to_string(), "trailing");
/// ```
#[macro_export]
macro_rules! impl_mode_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Lowercase name used in logs and settings files
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().replace('-', "_").as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
