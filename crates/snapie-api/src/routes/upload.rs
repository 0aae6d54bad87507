//! # Upload API
//!
//! `POST /api/audio/upload`, multipart with the file in `audio` and the
//! declared metadata as text fields. Mounted behind the upload rate limiter
//! and the API key middleware; the owner comes from `X-User`.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;

use snapie_core::Timestamp;

use crate::auth::ApiKeyGrant;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::orchestration::{DeclaredMetadata, UploadPipeline, UploadRequest};
use crate::state::AppState;

const FILE_FIELD: &str = "audio";
const USER_HEADER: &str = "x-user";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub permlink: String,
    pub cid: String,
    pub play_url: String,
    pub api_url: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/audio/upload", post(upload_audio))
}

/// The parsed multipart body.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(Bytes, Option<String>)>,
    declared: DeclaredMetadata,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            form.file = Some((bytes, filename));
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        let d = &mut form.declared;
        let slot = match name.as_str() {
            "duration" => &mut d.duration,
            "format" => &mut d.format,
            "codec" => &mut d.codec,
            "bitrate" => &mut d.bitrate,
            "sampleRate" => &mut d.sample_rate,
            "channels" => &mut d.channels,
            "waveform" => &mut d.waveform,
            "title" => &mut d.title,
            "description" => &mut d.description,
            "tags" => &mut d.tags,
            "context_type" => &mut d.context_type,
            "context_id" => &mut d.context_id,
            "reply_to" => &mut d.reply_to,
            other => {
                tracing::debug!(field = other, "ignoring unknown upload field");
                continue;
            }
        };
        *slot = Some(value);
    }
    Ok(form)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// `{proto}://{host}` for links in the response.
fn public_base(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_base_url {
        return base.as_str().trim_end_matches('/').to_string();
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or("http");
    match header("host") {
        Some(host) => format!("{proto}://{host}"),
        None => format!("{proto}://localhost:{}", config.port),
    }
}

/// POST /api/audio/upload
async fn upload_audio(
    State(state): State<AppState>,
    grant: ApiKeyGrant,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = read_form(multipart).await?;

    let Some((bytes, filename)) = form.file.filter(|(b, _)| !b.is_empty()) else {
        return Err(AppError::Validation("no audio file provided".into()));
    };
    // No filename means no extension to vouch for the content.
    if !filename
        .as_deref()
        .is_some_and(|name| state.config.accepts_extension(name))
    {
        return Err(AppError::Validation(format!(
            "invalid file format, allowed: {}",
            state.config.allowed_formats.join(", ")
        )));
    }

    let owner = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = UploadRequest {
        owner,
        bytes,
        filename,
        declared: form.declared,
        grant,
    };
    let record = UploadPipeline::from_state(&state)
        .upload(request, Timestamp::now())
        .await?;

    let base = public_base(&state.config, &headers);
    let permlink = record.permlink().to_string();
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            play_url: format!("{base}/play?a={permlink}"),
            api_url: format!("{base}/api/audio?a={permlink}"),
            cid: record.content_id().to_string(),
            permlink,
        }),
    ))
}
