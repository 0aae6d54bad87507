//! # Error Hierarchy
//!
//! Validation errors shared across the workspace, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Errors carry the offending input so operators can diagnose bad requests
//! from logs alone. Client-facing layers decide how much of that context is
//! echoed back.

use thiserror::Error;

/// Validation errors for domain primitives and declared upload metadata.
///
/// Never retried. The API layer surfaces these as client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// String is neither a CIDv0 nor a CIDv1 shape.
    #[error("invalid CID format: \"{0}\" (expected Qm + 44 base58 chars, or bafy + 54+ lowercase alphanumerics)")]
    InvalidCid(String),

    /// Content identifier returned by the content store was empty.
    #[error("content store returned an empty content identifier")]
    EmptyContentId,

    /// Permlink is empty, too long, or contains characters outside `[a-z0-9-]`.
    #[error("invalid permlink: \"{0}\" (expected 1-64 chars of [a-z0-9-])")]
    InvalidPermlink(String),

    /// Owner identity is absent or blank.
    #[error("username required")]
    MissingUsername,

    /// Owner identity is the anonymous sentinel.
    #[error("anonymous uploads are not accepted")]
    AnonymousUser,

    /// Owner identity is malformed.
    #[error("invalid username: \"{0}\"")]
    InvalidUsername(String),

    /// Required declared metadata is missing.
    #[error("missing required metadata: {}", .0.join(", "))]
    MissingMetadata(Vec<&'static str>),

    /// Declared metadata is present but unparseable.
    #[error("invalid metadata field {field}: {reason}")]
    InvalidMetadata {
        /// Field name as declared by the client.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Timestamp string is not valid RFC 3339.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
