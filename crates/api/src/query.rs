//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// `?retry=<secs>` on batch submission. Kept as a string so that invalid
/// values fall back to the default window instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct RetryParams {
    pub retry: Option<String>,
}
