//! # Authentication
//!
//! Two independent credentials:
//!
//! ```text
//! X-API-Key: {key}              uploads (also `?api_key=`)
//! Authorization: Bearer {token} /api/admin/*
//! ```
//!
//! Upload keys come from `API_KEYS`; `DEMO_API_KEY` is accepted too and marks
//! the upload ephemeral. A successful check injects an [`ApiKeyGrant`] into
//! request extensions for the handler.
//!
//! All comparisons are constant-time.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AppError;

/// Characters of the key recorded on the record as `api_key_used`.
pub const KEY_ID_LEN: usize = 8;

const API_KEY_HEADER: &str = "x-api-key";
const API_KEY_QUERY: &str = "api_key";

// ── Secrets ─────────────────────────────────────────────────────────────────

/// A credential held in memory. Wiped on drop, redacted in `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Constant-time equality with a presented value.
    pub fn matches(&self, provided: &str) -> bool {
        constant_time_token_eq(provided, &self.0)
    }

    /// First [`KEY_ID_LEN`] characters, for attribution in stored records.
    fn key_id(&self) -> String {
        self.0.chars().take(KEY_ID_LEN).collect()
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        // Keep timing independent of where the lengths diverge.
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

// ── Upload API keys ─────────────────────────────────────────────────────────

/// Accepted upload credentials.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub keys: Vec<SecretToken>,
    /// Privileged key whose uploads are ephemeral.
    pub demo: Option<SecretToken>,
}

/// What an accepted API key entitles the request to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyGrant {
    /// First characters of the key, stored as `api_key_used`.
    pub key_id: String,
    /// Uploads under this key skip migration and expire.
    pub ephemeral: bool,
}

impl ApiKeys {
    /// Check a presented key. Every configured key is compared so the time
    /// taken does not reveal which one matched.
    pub fn authorize(&self, provided: &str) -> Option<ApiKeyGrant> {
        let demo = self.demo.as_ref().filter(|d| d.matches(provided));
        let regular = self
            .keys
            .iter()
            .fold(None, |found, key| match (found, key.matches(provided)) {
                (None, true) => Some(key),
                (found, _) => found,
            });

        match (demo, regular) {
            (Some(d), _) => Some(ApiKeyGrant {
                key_id: d.key_id(),
                ephemeral: true,
            }),
            (None, Some(k)) => Some(ApiKeyGrant {
                key_id: k.key_id(),
                ephemeral: false,
            }),
            (None, None) => None,
        }
    }
}

/// Key from the `X-API-Key` header, falling back to the `api_key` query
/// parameter.
pub fn presented_api_key(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(v) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == API_KEY_QUERY)
        .map(|(_, v)| v.into_owned())
}

/// Require a valid upload API key.
pub async fn api_key_middleware(request: Request, next: Next) -> Response {
    let keys = request.extensions().get::<ApiKeys>().cloned().unwrap_or_default();
    let (mut parts, body) = request.into_parts();

    let Some(provided) = presented_api_key(&parts.headers, &parts.uri).filter(|k| !k.is_empty())
    else {
        tracing::warn!("upload rejected: missing API key");
        return AppError::Unauthorized(
            "API key required in X-API-Key header or api_key query parameter".into(),
        )
        .into_response();
    };

    match keys.authorize(&provided) {
        Some(grant) => {
            tracing::debug!(key_id = %grant.key_id, ephemeral = grant.ephemeral, "API key accepted");
            parts.extensions.insert(grant);
            next.run(Request::from_parts(parts, body)).await
        }
        None => {
            tracing::warn!("upload rejected: invalid API key");
            AppError::Unauthorized("invalid API key".into()).into_response()
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for ApiKeyGrant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiKeyGrant>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no API key in request context".into()))
    }
}

// ── Admin bearer token ──────────────────────────────────────────────────────

/// Admin credential. `None` disables the admin console.
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    pub token: Option<SecretToken>,
}

/// Require `Authorization: Bearer {ADMIN_TOKEN}`.
pub async fn admin_middleware(request: Request, next: Next) -> Response {
    let auth = request.extensions().get::<AdminAuth>().cloned().unwrap_or_default();
    let Some(expected) = auth.token else {
        return AppError::ServiceUnavailable("admin console disabled: ADMIN_TOKEN not set".into())
            .into_response();
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match header_value {
        Some(v) if v.starts_with("Bearer ") => {
            if expected.matches(&v[7..]) {
                next.run(request).await
            } else {
                tracing::warn!("admin request rejected: invalid bearer token");
                AppError::Unauthorized("invalid bearer token".into()).into_response()
            }
        }
        Some(_) => {
            tracing::warn!("admin request rejected: non-Bearer authorization scheme");
            AppError::Unauthorized("authorization header must use Bearer scheme".into())
                .into_response()
        }
        None => {
            tracing::warn!("admin request rejected: missing authorization header");
            AppError::Unauthorized("missing authorization header".into()).into_response()
        }
    }
}
