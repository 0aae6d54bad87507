//! # Extraction Helpers
//!
//! Handlers take `Result<Json<T>, JsonRejection>` / `Result<Query<T>, _>` and
//! pass it through these helpers, so malformed bodies and query strings get
//! the same JSON error shape as every other failure.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use snapie_core::{Permlink, Username};

use crate::error::AppError;

/// Unwrap a JSON body, mapping rejections to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Unwrap a query string, mapping rejections to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// A permlink from a path or query value. Malformed values cannot name any
/// record, so they are reported as not found.
pub fn permlink_param(raw: &str) -> Result<Permlink, AppError> {
    Permlink::new(raw).map_err(|_| AppError::NotFound(format!("audio {raw}")))
}

/// A username from a path segment.
pub fn username_param(raw: &str) -> Result<Username, AppError> {
    Username::new(raw).map_err(|_| AppError::NotFound(format!("user {raw}")))
}
