//! Cache Key Module
//!
//! Deterministic cache keys from a namespace and request filters.

use std::collections::BTreeMap;

// == Build Key ==
/// Builds the cache key for `namespace` and a set of request filters.
///
/// Filters whose value is `None` or empty are dropped, the rest are sorted
/// by name and serialized as a JSON object, so equivalent requests share a
/// key regardless of parameter order.
///
/// # Example
/// ```
/// use catalog_cache::cache::build_key;
///
/// let a = build_key("courses", [("city", Some("paris")), ("level", Some("1"))]);
/// let b = build_key("courses", [("level", Some("1")), ("city", Some("paris")), ("q", Some(""))]);
/// assert_eq!(a, b);
/// assert_eq!(a, r#"courses_{"city":"paris","level":"1"}"#);
/// ```
pub fn build_key<I, K, V>(namespace: &str, filters: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = filters
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value?;
            let value = value.as_ref();
            if value.is_empty() {
                None
            } else {
                Some((name.as_ref().to_string(), value.to_string()))
            }
        })
        .collect();

    // A map of strings always serializes
    let serialized = serde_json::to_string(&sorted).unwrap_or_else(|_| "{}".to_string());
    format!("{}_{}", namespace, serialized)
}

/// Builds the key for a namespace with no filters.
pub fn namespace_key(namespace: &str) -> String {
    build_key::<_, &str, &str>(namespace, std::iter::empty())
}
