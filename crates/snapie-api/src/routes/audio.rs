//! # Audio Read API
//!
//! | Method | Path                 | Purpose                                  |
//! |--------|----------------------|------------------------------------------|
//! | GET    | `/api/audio`         | record view by `?a=`, or direct `?cid=`  |
//! | GET    | `/api/audio/stream`  | bytes via fetch-with-fallback            |
//! | POST   | `/api/audio/play`    | count one play (rate limited)            |
//!
//! Direct-CID requests never touch the record store and only ever use the
//! public gateways.

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use url::Url;

use snapie_core::{ContentId, Timestamp};
use snapie_ipfs::{fetch_with_fallback, resolve_gateways, GatewayError};
use snapie_state::IpfsStatus;
use snapie_store::AudioRecord;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, permlink_param};
use crate::state::AppState;

/// Header carrying the index of the gateway that served a stream.
pub const GATEWAY_INDEX_HEADER: &str = "x-gateway-index";

/// `?a=<permlink>` or `?cid=<cid>`. `cid` wins when both are given.
#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    pub a: Option<String>,
    pub cid: Option<String>,
}

/// Published record as served to players.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioView {
    pub permlink: String,
    pub owner: String,
    pub cid: String,
    pub duration: f64,
    pub format: String,
    pub codec: Option<String>,
    pub bitrate: Option<i32>,
    pub sample_rate: Option<i32>,
    pub channels: Option<i16>,
    pub waveform: Option<serde_json::Value>,
    pub audio_url: Option<String>,
    pub audio_url_fallback: Option<String>,
    pub gateways: Vec<String>,
    pub ipfs_status: IpfsStatus,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub plays: i64,
    pub likes: i64,
    pub created_at: Timestamp,
    pub context_type: String,
    pub context_id: Option<String>,
}

/// Direct-CID answer; no record behind it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectView {
    pub cid: String,
    pub audio_url: Option<String>,
    pub audio_url_fallback: Option<String>,
    pub gateways: Vec<String>,
    pub format: &'static str,
    pub mode: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub permlink: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub success: bool,
    pub plays: i64,
}

/// Read routes. Play tracking is mounted separately behind its limiter.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/audio", get(get_audio))
        .route("/api/audio/stream", get(stream_audio))
}

pub fn play_router() -> Router<AppState> {
    Router::new().route("/api/audio/play", post(record_play))
}

/// What a read request points at.
enum Target {
    Record(AudioRecord),
    Direct(ContentId),
}

impl Target {
    async fn resolve(state: &AppState, query: AudioQuery) -> Result<Self, AppError> {
        if let Some(cid) = query.cid.filter(|c| !c.is_empty()) {
            return Ok(Self::Direct(ContentId::parse(cid)?));
        }
        let Some(raw) = query.a.filter(|a| !a.is_empty()) else {
            return Err(AppError::Validation(
                "missing permlink (a) or cid parameter".into(),
            ));
        };
        let permlink = permlink_param(&raw)?;
        state
            .records
            .find_published(&permlink)
            .await?
            .map(Self::Record)
            .ok_or_else(|| AppError::NotFound(format!("audio {permlink}")))
    }

    fn candidates(&self, state: &AppState) -> Vec<Url> {
        match self {
            Self::Record(r) => resolve_gateways(
                &state.config.gateways,
                r.content_id(),
                Some(r.lifecycle.ipfs_status),
            ),
            Self::Direct(cid) => resolve_gateways(&state.config.gateways, cid, None),
        }
    }
}

fn url_strings(urls: &[Url]) -> (Option<String>, Option<String>, Vec<String>) {
    let all: Vec<String> = urls.iter().map(Url::to_string).collect();
    (all.first().cloned(), all.get(1).cloned(), all)
}

/// GET /api/audio
async fn get_audio(
    State(state): State<AppState>,
    query: Result<Query<AudioQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let target = Target::resolve(&state, extract_query(query)?).await?;
    let (audio_url, audio_url_fallback, gateways) = url_strings(&target.candidates(&state));

    let response = match target {
        Target::Direct(cid) => Json(DirectView {
            cid: cid.to_string(),
            audio_url,
            audio_url_fallback,
            gateways,
            format: "unknown",
            mode: "direct",
        })
        .into_response(),
        Target::Record(r) => Json(AudioView {
            permlink: r.permlink().to_string(),
            owner: r.owner.to_string(),
            cid: r.content_id().to_string(),
            duration: r.metadata.duration,
            format: r.metadata.format,
            codec: r.metadata.codec,
            bitrate: r.metadata.bitrate,
            sample_rate: r.metadata.sample_rate,
            channels: r.metadata.channels,
            waveform: r.metadata.waveform,
            audio_url,
            audio_url_fallback,
            gateways,
            ipfs_status: r.lifecycle.ipfs_status,
            title: r.metadata.title,
            description: r.metadata.description,
            tags: r.metadata.tags,
            plays: r.plays,
            likes: r.likes,
            created_at: r.created_at,
            context_type: r.context_type,
            context_id: r.context_id,
        })
        .into_response(),
    };
    Ok(response)
}

/// GET /api/audio/stream
async fn stream_audio(
    State(state): State<AppState>,
    query: Result<Query<AudioQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let target = Target::resolve(&state, extract_query(query)?).await?;
    let candidates = target.candidates(&state);

    let fetched = match fetch_with_fallback(
        state.fetcher.as_ref(),
        &candidates,
        state.config.gateways.fetch_timeout(),
    )
    .await
    {
        Ok(f) => f,
        Err(e) => {
            if matches!(e, GatewayError::ContentUnavailable { .. }) {
                state.metrics.record_gateway_exhausted();
            }
            return Err(e.into());
        }
    };
    state.metrics.record_gateway_hit(fetched.source_index);

    let content_type = match &target {
        Target::Record(r) => mime_for_format(&r.metadata.format).map(str::to_string),
        Target::Direct(_) => fetched.content_type.clone(),
    }
    .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = (StatusCode::OK, Body::from(fetched.bytes)).into_response();
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, v);
    }
    headers.insert(GATEWAY_INDEX_HEADER, HeaderValue::from(fetched.source_index));
    Ok(response)
}

/// POST /api/audio/play
async fn record_play(
    State(state): State<AppState>,
    body: Result<Json<PlayRequest>, JsonRejection>,
) -> Result<Json<PlayResponse>, AppError> {
    let req = extract_json(body)?;
    let Some(raw) = req.permlink.filter(|p| !p.is_empty()) else {
        return Err(AppError::Validation("missing permlink".into()));
    };
    let permlink = permlink_param(&raw)?;

    let plays = state
        .records
        .increment_plays(&permlink, Timestamp::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("audio {permlink}")))?;

    Ok(Json(PlayResponse {
        success: true,
        plays,
    }))
}

/// MIME type for a declared audio format.
pub fn mime_for_format(format: &str) -> Option<&'static str> {
    match format.to_ascii_lowercase().as_str() {
        "mp3" | "mpeg" => Some("audio/mpeg"),
        "m4a" | "mp4" | "aac" => Some("audio/mp4"),
        "ogg" | "opus" => Some("audio/ogg"),
        "webm" => Some("audio/webm"),
        "wav" => Some("audio/wav"),
        _ => None,
    }
}
