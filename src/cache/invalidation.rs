//! Invalidation Module
//!
//! Describes which cache entries an invalidation request targets.

use regex::Regex;

use crate::cache::store::key_in_endpoint;

// == Invalidation ==
/// A set of cache keys to drop.
#[derive(Debug, Clone)]
pub enum Invalidation {
    /// Exactly these keys
    Keys(Vec<String>),
    /// Every key matching the expression
    Pattern(Regex),
    /// Every key built for one of these endpoint namespaces
    Endpoints(Vec<String>),
    /// Everything, including hit/miss counters
    All,
}

impl Invalidation {
    /// Invalidates the given keys.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invalidation::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Invalidates every key built for the given endpoints.
    pub fn endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invalidation::Endpoints(endpoints.into_iter().map(Into::into).collect())
    }

    /// Compiles `pattern` into a pattern invalidation.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Invalidation::Pattern)
    }

    // == Matches ==
    /// Whether `key` is targeted by this invalidation.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Invalidation::Keys(keys) => keys.iter().any(|k| k == key),
            Invalidation::Pattern(pattern) => pattern.is_match(key),
            Invalidation::Endpoints(endpoints) => {
                endpoints.iter().any(|ep| key_in_endpoint(key, ep))
            }
            Invalidation::All => true,
        }
    }
}
