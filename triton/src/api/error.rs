use thiserror::Error;

/// CloudAPI error codes the provider makes decisions on
const CODE_RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
const CODE_RESOURCE_FOUND: &str = "ResourceFound";
const CODE_INVALID_ARGUMENT: &str = "InvalidArgument";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CloudAPI error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed")]
    Auth,

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Rate limited by CloudAPI")]
    RateLimited,

    #[error("CloudAPI unavailable")]
    ServiceUnavailable,
}

impl ApiError {
    /// 404 and 410 both mean the object is gone; reads map this to
    /// "remove from state" rather than failing
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Api { status, code, .. } => {
                *status == 404 || *status == 410 || code == CODE_RESOURCE_NOT_FOUND
            }
            _ => false,
        }
    }

    /// CloudAPI answers ResourceFound while an instance is still settling
    /// and cannot take NIC changes yet; transient, worth retrying
    pub fn is_resource_found(&self) -> bool {
        matches!(self, ApiError::Api { code, .. } if code == CODE_RESOURCE_FOUND)
    }

    /// InvalidArgument covers deletes refused while dependents drain
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ApiError::Api { code, .. } if code == CODE_INVALID_ARGUMENT)
    }

    /// Throttling, 5xx responses, and transport failures are safe to retry
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited | ApiError::ServiceUnavailable | ApiError::Timeout(_) => true,
            ApiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Api { status, .. } => *status == 429 || *status >= 500,
            ApiError::Parse(_) | ApiError::Auth => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: &str) -> ApiError {
        ApiError::Api {
            status,
            code: code.to_string(),
            message: "test".to_string(),
        }
    }

    #[test]
    fn not_found_matches_404_and_410() {
        assert!(api_error(404, "ResourceNotFound").is_not_found());
        assert!(api_error(410, "Gone").is_not_found());
        assert!(!api_error(500, "InternalError").is_not_found());
    }

    #[test]
    fn resource_found_matches_code_only() {
        assert!(api_error(409, "ResourceFound").is_resource_found());
        assert!(!api_error(409, "InvalidArgument").is_resource_found());
    }

    #[test]
    fn invalid_argument_matches_code() {
        assert!(api_error(409, "InvalidArgument").is_invalid_argument());
        assert!(!ApiError::ServiceUnavailable.is_invalid_argument());
    }

    #[test]
    fn retryable_covers_throttling_and_server_faults() {
        assert!(ApiError::RateLimited.is_retryable());
        assert!(ApiError::ServiceUnavailable.is_retryable());
        assert!(ApiError::Timeout(30).is_retryable());
        assert!(api_error(429, "TooManyRequests").is_retryable());
        assert!(api_error(503, "InternalError").is_retryable());
        assert!(!api_error(404, "ResourceNotFound").is_retryable());
        assert!(!ApiError::Auth.is_retryable());
    }
}
