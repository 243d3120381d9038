//! Request DTOs for the cache API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::Invalidation;
use crate::error::FetchError;

/// Request body for bulk invalidation (POST /cache/invalidate)
///
/// Exactly one of the fields must be set.
///
/// # Fields
/// - `keys`: Exact cache keys to remove
/// - `pattern`: Regular expression matched against keys
/// - `endpoints`: Endpoint namespaces whose keys are removed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub endpoints: Option<Vec<String>>,
}

impl InvalidateRequest {
    /// Converts the request into an invalidation, validating it on the way.
    pub fn into_invalidation(self) -> Result<Invalidation, FetchError> {
        match (self.keys, self.pattern, self.endpoints) {
            (Some(keys), None, None) => Ok(Invalidation::Keys(keys)),
            (None, Some(pattern), None) => Invalidation::pattern(&pattern)
                .map_err(|e| FetchError::InvalidRequest(format!("Invalid pattern: {}", e))),
            (None, None, Some(endpoints)) => Ok(Invalidation::Endpoints(endpoints)),
            _ => Err(FetchError::InvalidRequest(
                "Exactly one of keys, pattern or endpoints is required".to_string(),
            )),
        }
    }
}
