//! # Admin Console API
//!
//! Bearer-protected (`ADMIN_TOKEN`) storage and moderation endpoints.
//!
//! Deleting a file is logical: the record flips to `removed`, stops
//! resolving by permlink, and shows up in the removed-records query that the
//! unpin job polls.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use snapie_core::Timestamp;
use snapie_store::{
    AudioRecord, CreatorAccount, CreatorPage, CreatorQuery, OwnerStats, RecordFilter,
    StorageStats,
};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, permlink_param, username_param};
use crate::state::AppState;

/// Records returned by the file listing.
pub const FILE_LIST_LIMIT: i64 = 100;

/// Upper bound on the user listing page size.
pub const MAX_USER_PAGE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    pub filter: RecordFilter,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub banned: Option<bool>,
}

impl UsersQuery {
    fn into_query(self) -> CreatorQuery {
        let defaults = CreatorQuery::default();
        CreatorQuery {
            page: self.page.unwrap_or(defaults.page).max(1),
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_USER_PAGE),
            search: self.search.filter(|s| !s.trim().is_empty()),
            banned: self.banned,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub banned: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserDetails {
    #[serde(flatten)]
    pub account: CreatorAccount,
    pub stats: OwnerStats,
}

#[derive(Debug, Serialize)]
pub struct BanResponse {
    pub success: bool,
    pub user: CreatorAccount,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(stats))
        .route("/api/admin/files", get(list_files))
        .route("/api/admin/files/:permlink", delete(delete_file))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:username", get(user_details))
        .route("/api/admin/users/:username/ban", put(set_ban))
}

/// GET /api/admin/stats
async fn stats(State(state): State<AppState>) -> Result<Json<StorageStats>, AppError> {
    Ok(Json(state.records.stats().await?))
}

/// GET /api/admin/files?filter=all|demo|pending|skip
async fn list_files(
    State(state): State<AppState>,
    query: Result<Query<FilesQuery>, QueryRejection>,
) -> Result<Json<Vec<AudioRecord>>, AppError> {
    let q = extract_query(query)?;
    Ok(Json(state.records.list_recent(q.filter, FILE_LIST_LIMIT).await?))
}

/// DELETE /api/admin/files/{permlink}
async fn delete_file(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let permlink = permlink_param(&raw)?;
    if !state.records.mark_removed(&permlink, Timestamp::now()).await? {
        return Err(AppError::NotFound(format!("file {permlink}")));
    }
    tracing::info!(permlink = %permlink, "record removed by admin");
    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted",
    }))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<UsersQuery>, QueryRejection>,
) -> Result<Json<CreatorPage>, AppError> {
    let q = extract_query(query)?.into_query();
    Ok(Json(state.creators.list(&q).await?))
}

/// GET /api/admin/users/{username}
async fn user_details(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<UserDetails>, AppError> {
    let username = username_param(&raw)?;
    let account = state
        .creators
        .find(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {username}")))?;
    let stats = state.records.owner_stats(&username).await?;
    Ok(Json(UserDetails { account, stats }))
}

/// PUT /api/admin/users/{username}/ban
async fn set_ban(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Result<Json<BanRequest>, JsonRejection>,
) -> Result<Json<BanResponse>, AppError> {
    let username = username_param(&raw)?;
    let req = extract_json(body)?;
    let user = state
        .creators
        .set_banned(&username, req.banned)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {username}")))?;
    tracing::info!(username = %username, banned = req.banned, "creator ban updated");
    Ok(Json(BanResponse {
        success: true,
        user,
    }))
}
