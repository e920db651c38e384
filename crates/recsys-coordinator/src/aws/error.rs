//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_personalize::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Error categories the retry policy and cleanup logic reason about
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Resource was not found (safe to skip in cleanup)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Resource is busy or still referenced by another resource (retryable)
    #[error("Resource in use: {message}")]
    ResourceInUse { message: String },

    /// Resource already exists
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl ServiceError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Check if this is a "resource in use" error
    pub fn is_in_use(&self) -> bool {
        matches!(self, ServiceError::ResourceInUse { .. })
    }

    /// Check if this is a throttling error
    pub fn is_throttled(&self) -> bool {
        matches!(self, ServiceError::Throttled { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ServiceError::AlreadyExists { .. })
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchBucketPolicy",
    "NoSuchEntity",
    "NoSuchEntityException",
];

/// Known AWS error codes for "in use" conditions
const IN_USE_CODES: &[&str] = &["ResourceInUseException", "DeleteConflict", "BucketNotEmpty"];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "ResourceAlreadyExistsException",
    "EntityAlreadyExists",
    "BucketAlreadyOwnedByYou",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_service_error(code: Option<&str>, message: Option<&str>) -> ServiceError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => ServiceError::NotFound { message },
        Some(c) if IN_USE_CODES.contains(&c) => ServiceError::ResourceInUse { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => ServiceError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => ServiceError::Throttled { message },
        _ => ServiceError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Convert an SDK error into a classified [`ServiceError`].
///
/// Works for every service client in the workspace since they share the
/// smithy error types. Errors without a service code (dispatch failures,
/// timeouts) keep the full error context as their message.
pub fn from_sdk_error<E, R>(error: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&error).to_string());
    classify_service_error(error.code(), Some(&message))
}

/// Classify an error from an anyhow::Error.
///
/// Errors raised by this crate's clients carry a [`ServiceError`] somewhere in
/// their context chain. Falls back to extracting a known code from the Debug
/// representation for anything else.
pub fn classify_anyhow_error(error: &anyhow::Error) -> ServiceError {
    if let Some(service) = error.downcast_ref::<ServiceError>() {
        return service.clone();
    }

    for cause in error.chain() {
        if let Some(service) = cause.downcast_ref::<ServiceError>() {
            return service.clone();
        }
    }

    // Fallback: extract error code from debug string representation
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_service_error(Some(&code), Some(&error.to_string()));
    }

    ServiceError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    let known = NOT_FOUND_CODES
        .iter()
        .chain(IN_USE_CODES)
        .chain(ALREADY_EXISTS_CODES)
        .chain(THROTTLING_CODES);
    for code in known {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_service_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn in_use_codes() {
        for code in IN_USE_CODES {
            let err = classify_service_error(Some(code), Some("msg"));
            assert!(err.is_in_use(), "Expected ResourceInUse for code: {code}");
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_service_error(Some(code), Some("msg"));
            assert!(err.is_throttled(), "Expected Throttled for code: {code}");
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_service_error(Some(code), Some("msg"));
            assert!(err.is_already_exists(), "Expected AlreadyExists for code: {code}");
            assert!(!err.is_throttled() && !err.is_in_use());
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_service_error(Some("InvalidInputException"), Some("details"));
        assert!(matches!(err, ServiceError::Sdk { code: Some(_), .. }));

        let err2 = classify_service_error(None, Some("something failed"));
        assert!(matches!(err2, ServiceError::Sdk { code: None, .. }));
    }

    #[test]
    fn classify_through_context_layers() {
        let err: anyhow::Error = Err::<(), _>(ServiceError::ResourceInUse {
            message: "campaign still references solution".to_string(),
        })
        .context("Failed to delete solution")
        .context("teardown")
        .unwrap_err();

        assert!(classify_anyhow_error(&err).is_in_use());
    }

    #[test]
    fn classify_from_debug_string() {
        let err = anyhow::anyhow!("service error: code: Some(\"ResourceNotFoundException\")");
        assert!(classify_anyhow_error(&err).is_not_found());
    }

    #[test]
    fn extract_code_from_code_field() {
        let debug_str = r#"SdkError { code: Some("SomeRandomCode"), message: "fail" }"#;
        assert_eq!(
            extract_error_code(debug_str).as_deref(),
            Some("SomeRandomCode")
        );
    }

    #[test]
    fn extract_none_from_unrelated_string() {
        assert!(extract_error_code("connection refused").is_none());
    }

    #[test]
    fn sdk_display_includes_code() {
        let err = classify_service_error(Some("InvalidInputException"), Some("bad name"));
        assert_eq!(err.to_string(), "AWS error (InvalidInputException): bad name");
    }
}
