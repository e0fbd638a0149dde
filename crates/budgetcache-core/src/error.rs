use thiserror::Error;

/// Failures surfaced by the cache layer.
///
/// Cache misses are not errors: every store reports them as `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cannot reach {dependency}: {reason}")]
    NetworkUnavailable { dependency: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Could not fetch exchange rates: {0}")]
    FeedUnavailable(String),

    #[error("Install failed for {path}: {reason}")]
    InstallFailed { path: String, reason: String },

    #[error("Version {0} has not been installed")]
    NotInstalled(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl CacheError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            500..=599 => CacheError::Backend(format!("Status {}: {}", status, truncated)),
            _ => CacheError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn network(dependency: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CacheError::NetworkUnavailable {
            dependency: dependency.into(),
            reason: err.to_string(),
        }
    }

    /// True when the failure happened before any response was received.
    pub fn is_network(&self) -> bool {
        matches!(self, CacheError::NetworkUnavailable { .. })
    }
}
