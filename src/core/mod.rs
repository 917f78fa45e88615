//! Core types for Pinion
//!
//! This module provides the error handling foundation used throughout the
//! codebase:
//! - [`PinionError`] - one tagged error type whose variants cover every
//!   failure mode (classification, resolution, rewrite, I/O)
//! - [`ErrorContext`] - user-friendly wrapper with suggestions and details
//! - [`user_friendly_error`] - conversion from any error for CLI display
//!
//! Resolution failures are further split into rate-limited (retried before
//! surfacing), not-found (upstream 404), and malformed-response (contract
//! violation, never retried) so that the retry policy and the orchestrators
//! can make decisions by matching on the variant rather than parsing
//! messages.

pub mod error;

pub use error::{ErrorContext, PinionError, user_friendly_error};

/// Standard result type used across Pinion components.
pub type Result<T> = std::result::Result<T, PinionError>;
