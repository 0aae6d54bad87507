//! # Content Identifiers
//!
//! Shape validation for IPFS content identifiers and the [`ContentId`]
//! newtype that records carry.
//!
//! ## Accepted shapes
//!
//! - **CIDv0**: `Qm` followed by exactly 44 base58btc characters
//!   (alphabet excludes `0`, `O`, `I`, `l`).
//! - **CIDv1**: `bafy` followed by at least 54 characters of `[a-z0-9]`.
//!
//! The CIDv1 rule is an approximation of base32 multibase and accepts a
//! superset of genuine CIDv1 strings (it allows `0`, `1`, `8`, `9`, which
//! base32 does not). This is kept deliberately: identifiers already stored
//! and shared in that shape must keep resolving, and the content store
//! rejects truly invalid identifiers on fetch.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const CIDV0_PREFIX: &str = "Qm";
const CIDV0_BODY_LEN: usize = 44;
const CIDV1_PREFIX: &str = "bafy";
const CIDV1_MIN_BODY_LEN: usize = 54;

/// CID version recognised by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CidVersion {
    V0,
    V1,
}

impl std::fmt::Display for CidVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V0 => f.write_str("v0"),
            Self::V1 => f.write_str("v1"),
        }
    }
}

fn is_base58_char(c: char) -> bool {
    // 1-9, A-H, J-N, P-Z, a-k, m-z
    matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
}

fn is_v1_body_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// Classify a string as CIDv0, CIDv1, or neither. Pure, no I/O.
pub fn classify(s: &str) -> Option<CidVersion> {
    if let Some(body) = s.strip_prefix(CIDV0_PREFIX) {
        // All base58 chars are ASCII, so byte length equals char count here.
        if body.len() == CIDV0_BODY_LEN && body.chars().all(is_base58_char) {
            return Some(CidVersion::V0);
        }
    }
    if let Some(body) = s.strip_prefix(CIDV1_PREFIX) {
        if body.len() >= CIDV1_MIN_BODY_LEN && body.chars().all(is_v1_body_char) {
            return Some(CidVersion::V1);
        }
    }
    None
}

/// Whether `s` has a CIDv0 or CIDv1 shape.
pub fn is_valid_cid(s: &str) -> bool {
    classify(s).is_some()
}

/// A content identifier as returned by the content store.
///
/// Two constructors with different trust levels:
/// - [`ContentId::parse`] validates the shape and gates client-supplied
///   identifiers (direct-CID reads).
/// - [`ContentId::from_content_store`] accepts whatever the content store
///   returned from a pin, requiring only that it is non-empty. The store may
///   legitimately mint shapes (e.g. raw-leaf `bafk…`) that the read-path
///   validator does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Parse a client-supplied identifier, rejecting unknown shapes.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if is_valid_cid(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidCid(value))
        }
    }

    /// Wrap an identifier minted by the content store.
    pub fn from_content_store(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyContentId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The CID version, when the identifier has a recognised shape.
    pub fn version(&self) -> Option<CidVersion> {
        classify(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::from_content_store(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
