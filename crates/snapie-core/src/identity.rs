//! # Identity Newtypes
//!
//! [`Permlink`] names a logical record; [`Username`] names its owner. Both
//! validate at construction, and deserialization goes through the same
//! validation so a malformed value can never be smuggled in from a request
//! body or a database row.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Length of generated permlinks.
pub const PERMLINK_LEN: usize = 8;

/// Upper bound for permlinks accepted from clients or storage.
const PERMLINK_MAX_LEN: usize = 64;

/// Upper bound for usernames.
const USERNAME_MAX_LEN: usize = 64;

/// Alphabet for generated permlinks.
const PERMLINK_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Sentinel identity sent by clients that are not signed in.
pub const ANONYMOUS_USER: &str = "anonymous";

macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Permlink
// ---------------------------------------------------------------------------

/// Short opaque identifier for a record, distinct from its content address.
///
/// Generated values are [`PERMLINK_LEN`] characters drawn uniformly from
/// `[a-z0-9]`. Values read back from clients or storage are accepted if they
/// are 1-64 characters of `[a-z0-9-]`, which covers permlinks minted by
/// older frontends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Permlink(String);

impl_validating_deserialize!(Permlink);

impl Permlink {
    /// Validate an existing permlink.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let ok = !value.is_empty()
            && value.len() <= PERMLINK_MAX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if ok {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidPermlink(value))
        }
    }

    /// Draw a fresh random permlink.
    ///
    /// Uniqueness is not checked here; the record store's unique constraint
    /// decides, and the caller regenerates on collision.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let s: String = (0..PERMLINK_LEN)
            .map(|_| PERMLINK_ALPHABET[rng.gen_range(0..PERMLINK_ALPHABET.len())] as char)
            .collect();
        Self(s)
    }

    /// The permlink as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Permlink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Username
// ---------------------------------------------------------------------------

/// Owner identity of an upload. Never empty, never [`ANONYMOUS_USER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl_validating_deserialize!(Username);

impl Username {
    /// Validate an owner identity. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingUsername);
        }
        if trimmed.eq_ignore_ascii_case(ANONYMOUS_USER) {
            return Err(ValidationError::AnonymousUser);
        }
        if trimmed.len() > USERNAME_MAX_LEN
            || trimmed.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ValidationError::InvalidUsername(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Validate an optional header value; `None` is [`ValidationError::MissingUsername`].
    pub fn from_optional(value: Option<&str>) -> Result<Self, ValidationError> {
        match value {
            Some(v) => Self::new(v),
            None => Err(ValidationError::MissingUsername),
        }
    }

    /// The username as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
