//! Cache key derivation from call arguments
//!
//! Arguments are serialized to a `serde_json::Value` first and rendered from
//! there. Object keys in a `Value` are kept sorted, so two maps holding the
//! same entries always produce the same key regardless of insertion order.

use serde::Serialize;

/// Derive a stable cache key from call arguments
///
/// Identical argument values always yield identical keys. Fails only when
/// the arguments cannot be represented as JSON (for example a map with
/// non-string keys).
///
/// ```
/// use decorum_common::cache::derive_key;
///
/// assert_eq!(derive_key(&(1, "a")).unwrap(), r#"[1,"a"]"#);
/// assert_eq!(derive_key(&()).unwrap(), "null");
/// ```
pub fn derive_key<A>(args: &A) -> Result<String, serde_json::Error>
where
    A: Serialize + ?Sized,
{
    let value = serde_json::to_value(args)?;
    serde_json::to_string(&value)
}
