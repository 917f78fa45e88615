//! Error handling for Pinion
//!
//! The error system is built around a single tagged error type:
//! - [`PinionError`] - enumerated error kinds for all failure cases, each
//!   variant carrying the context needed to diagnose it
//! - [`ErrorContext`] - wrapper that adds user-friendly suggestions for CLI
//!   display
//!
//! # Taxonomy
//!
//! - **Classification** errors are always fatal for the single reference that
//!   produced them.
//! - **Resolution** errors subdivide into rate-limited ([`PinionError::RateLimited`],
//!   retried with backoff before surfacing), not-found
//!   ([`PinionError::NotFound`], upstream 404), and malformed-response
//!   ([`PinionError::MalformedResponse`], a contract violation that is never
//!   retried).
//! - **Rewrite** errors (I/O writing the target file) are fatal for that file.
//!
//! Per-reference failures are logged and skipped by default, or abort the
//! whole file when continue-on-error is disabled. Per-file failures never
//! abort a directory batch.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for Pinion operations.
///
/// Each variant represents one failure kind from the error taxonomy and
/// carries structured context (URLs, file paths, status codes) instead of
/// pre-formatted strings, so callers can match on the kind.
#[derive(Error, Debug)]
pub enum PinionError {
    /// A reference matched no classification rule and is not a local path.
    #[error("cannot classify reference '{reference}': {reason}")]
    Classification {
        /// The raw reference string that failed classification
        reference: String,
        /// Why no rule accepted it
        reason: String,
    },

    /// A reference classified as a local path that does not exist on disk.
    #[error("local path not found: {path}")]
    LocalPathNotFound {
        /// The path-shaped reference that could not be found
        path: String,
    },

    /// Upstream rejected the request due to rate limiting, after retry
    /// exhaustion.
    #[error("rate limited by {host} after {attempts} attempts")]
    RateLimited {
        /// Host that rejected the request
        host: String,
        /// Total attempts made, including the initial call
        attempts: u32,
    },

    /// Upstream returned 404 for the named object (tag, release, digest).
    #[error("{object} not found upstream at {url}")]
    NotFound {
        /// What was being looked up (e.g. "tag v1.2", "release")
        object: String,
        /// The request URL that returned 404
        url: String,
    },

    /// Upstream responded with JSON that does not match the endpoint
    /// contract. Treated as a programming/contract error, never retried.
    #[error("unexpected response shape from {url}: {reason}")]
    MalformedResponse {
        /// The request URL whose payload failed validation
        url: String,
        /// What was missing or of the wrong shape
        reason: String,
    },

    /// Upstream responded with a non-200 status.
    #[error("api request to {url} failed with status {status}: {body}")]
    ApiStatus {
        /// The request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// A registry requires authentication we cannot supply anonymously.
    #[error("authentication required for registry {registry}")]
    RegistryAuthRequired {
        /// The registry host that returned 401
        registry: String,
    },

    /// The HTTP request itself failed (connect, timeout, TLS).
    #[error("request to {url} failed: {reason}")]
    Network {
        /// The request URL
        url: String,
        /// Transport-level failure description
        reason: String,
    },

    /// An explicit constraint is neither a valid version nor a commit hash.
    #[error("constraint '{constraint}' is not a version tag or a 40/7 character hash")]
    InvalidConstraint {
        /// The offending constraint string
        constraint: String,
    },

    /// Failed to parse a host file into its structured form.
    #[error("failed to parse {file}: {reason}")]
    ParseFile {
        /// Path of the file being parsed
        file: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Writing the rewritten candidate back to disk failed.
    #[error("failed to rewrite {file}: {reason}")]
    Rewrite {
        /// Path of the target file
        file: String,
        /// Underlying failure description
        reason: String,
    },

    /// Cache storage failure. Reads never produce this (a bad read is a
    /// miss); only writes surface it.
    #[error("cache write failed for {url}: {reason}")]
    CacheWrite {
        /// The request URL being cached
        url: String,
        /// Underlying failure description
        reason: String,
    },

    /// Configuration problem (e.g. no target file or directory supplied).
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// I/O error from standard library operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PinionError {
    /// Whether this error indicates upstream rate limiting.
    ///
    /// An error is classified rate-limited when it carries status 403 or 429,
    /// or when its message contains a rate-limit marker. Only these errors
    /// are retried by the resilience policy.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        if let Self::ApiStatus { status, .. } = self {
            if *status == 403 || *status == 429 {
                return true;
            }
        }
        let message = self.to_string();
        message.contains("403")
            || message.contains("429")
            || message.contains("rate limit")
            || message.contains("API rate limit exceeded")
    }

    /// Whether this error is an upstream 404 for the requested object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// User-friendly error wrapper with suggestions and details.
///
/// Wraps any error for terminal display, optionally adding an actionable
/// suggestion (shown in green) and background details (shown in yellow).
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details about the error.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into a user-friendly format with contextual suggestions.
///
/// Inspects the error chain for known [`PinionError`] variants and attaches
/// suggestions appropriate to the failure kind.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(pinion_error) = error.downcast_ref::<PinionError>() {
        return match pinion_error {
            PinionError::RateLimited { host, .. } => {
                let host = host.clone();
                ErrorContext::new(error)
                    .with_suggestion("Supply a GitHub token with --token or GITHUB_TOKEN to raise the rate limit")
                    .with_details(format!(
                        "Anonymous requests to {host} are rate-limited far more aggressively than authenticated ones"
                    ))
            }
            PinionError::NotFound { .. } => ErrorContext::new(error)
                .with_suggestion("Check that the referenced repository, tag, or image exists upstream"),
            PinionError::RegistryAuthRequired { .. } => ErrorContext::new(error)
                .with_suggestion("This registry does not allow anonymous manifest reads; log in or skip it"),
            PinionError::Config { .. } => ErrorContext::new(error)
                .with_suggestion("Run with --help to see the expected flags"),
            PinionError::Rewrite { .. } => ErrorContext::new(error)
                .with_details("The original file was left untouched on disk"),
            _ => ErrorContext::new(error),
        };
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(error)
                .with_suggestion("Check file ownership or run with elevated permissions");
        }
    }

    ErrorContext::new(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_variant_detected() {
        let err = PinionError::RateLimited {
            host: "api.github.com".to_string(),
            attempts: 4,
        };
        assert!(err.is_rate_limited());
    }

    #[test]
    fn status_403_and_429_are_rate_limited() {
        for status in [403u16, 429] {
            let err = PinionError::ApiStatus {
                url: "https://api.github.com/repos/a/b/releases".to_string(),
                status,
                body: String::new(),
            };
            assert!(err.is_rate_limited(), "status {status} should be rate limited");
        }
    }

    #[test]
    fn rate_limit_message_substring_detected() {
        let err = PinionError::ApiStatus {
            url: "https://api.github.com/repos/a/b/tags".to_string(),
            status: 200,
            body: "API rate limit exceeded for 1.2.3.4".to_string(),
        };
        assert!(err.is_rate_limited());
    }

    #[test]
    fn not_found_is_not_rate_limited() {
        let err = PinionError::NotFound {
            object: "tag v1.0.0".to_string(),
            url: "https://api.github.com/repos/a/b/git/ref/tags/v1.0.0".to_string(),
        };
        assert!(!err.is_rate_limited());
        assert!(err.is_not_found());
    }

    #[test]
    fn error_context_display_includes_suggestion() {
        let ctx = ErrorContext::new(anyhow::anyhow!("boom"))
            .with_suggestion("try again")
            .with_details("it broke");
        let rendered = format!("{ctx}");
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("Suggestion: try again"));
        assert!(rendered.contains("Details: it broke"));
    }
}
