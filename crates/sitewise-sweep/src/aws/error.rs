//! SiteWise error classification
//!
//! Maps SDK error codes (via `ProvideErrorMetadata::code()`) onto
//! [`ApiError`] instead of string matching on Debug output.

use crate::error::ApiError;
use aws_sdk_iotsitewise::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Known SiteWise error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException"];

/// Known error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["ThrottlingException", "TooManyRequestsException"];

/// Known error codes for operations racing another in-flight change
const CONFLICT_CODES: &[&str] = &["ConflictingOperationException"];

/// Credential and permission codes; treated like transport failures
const ACCESS_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnauthorizedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
];

/// Classify a SiteWise error using its code.
///
/// A missing code means the request never got a service response
/// (dispatch failure, timeout, unparseable response): a transport error.
pub fn classify_sitewise_error(code: Option<&str>, message: Option<&str>, resource: &str) -> ApiError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ApiError::not_found(resource),
        Some(c) if THROTTLING_CODES.contains(&c) => ApiError::Throttled,
        Some(c) if CONFLICT_CODES.contains(&c) => ApiError::Conflict { message },
        Some(c) if ACCESS_CODES.contains(&c) => ApiError::Transport {
            message: format!("{c}: {message}"),
        },
        Some(c) => ApiError::Service {
            code: c.to_string(),
            message,
        },
        None => ApiError::Transport { message },
    }
}

/// Convert an SDK error into an [`ApiError`] for `resource`.
pub fn from_sdk_error<E, R>(err: SdkError<E, R>, resource: &str) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    classify_sitewise_error(code.as_deref(), Some(&message), resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_sitewise_error(Some(code), Some("gone"), "Asset a-1");
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
            assert_eq!(err, ApiError::not_found("Asset a-1"));
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_sitewise_error(Some(code), Some("slow down"), "x");
            assert!(matches!(err, ApiError::Throttled), "code: {code}");
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn quota_errors_are_not_retried() {
        let err = classify_sitewise_error(
            Some("LimitExceededException"),
            Some("too many asset models"),
            "x",
        );
        assert!(matches!(err, ApiError::Service { ref code, .. } if code == "LimitExceededException"));
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn conflicting_operation_is_retryable() {
        let err = classify_sitewise_error(
            Some("ConflictingOperationException"),
            Some("model is being updated"),
            "x",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn access_codes_are_fatal() {
        for code in ACCESS_CODES {
            let err = classify_sitewise_error(Some(code), Some("denied"), "x");
            assert!(err.is_fatal(), "Expected fatal for code: {code}");
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_sitewise_error(Some("ValidationException"), Some("bad id"), "x");
        assert!(matches!(err, ApiError::Service { ref code, .. } if code == "ValidationException"));
        assert!(!err.is_fatal());

        let err = classify_sitewise_error(None, Some("dispatch failure"), "x");
        assert!(err.is_fatal());
    }
}
