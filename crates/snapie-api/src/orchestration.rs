//! # Upload Orchestration
//!
//! Turns an authenticated upload into a stored record. Steps run in this
//! order and stop at the first failure:
//!
//! 1. **Owner**: present, well-formed, not `anonymous`.
//! 2. **Permission**: banned or upload-disabled creators are refused; unknown
//!    creators get an account created with default permissions.
//! 3. **Metadata**: `duration` and `format` are required, numeric fields
//!    must parse. Everything else is passed through as declared.
//! 4. **Pin**: the bytes go to the content store. A failure here aborts the
//!    upload, so no record ever exists without a confirmed content id.
//! 5. **Record**: built with the creation-time lifecycle (ephemeral for the
//!    demo key) under a fresh random permlink, and inserted. A permlink
//!    collision regenerates and retries, up to [`PERMLINK_ATTEMPTS`].
//!
//! Steps 1-3 never touch the content store.

use std::sync::Arc;

use bytes::Bytes;

use snapie_core::{Permlink, Timestamp, Username, ValidationError};
use snapie_ipfs::{ContentStore, PinError};
use snapie_store::{
    AudioMetadata, AudioRecord, CreatorStore, RecordDraft, RecordStore, StoreError,
    UploadPermission,
};

use crate::auth::ApiKeyGrant;
use crate::error::AppError;
use crate::state::AppState;

/// Permlinks tried before an upload fails on collisions.
pub const PERMLINK_ATTEMPTS: usize = 5;

/// Metadata fields as sent by the client, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredMetadata {
    pub duration: Option<String>,
    pub format: Option<String>,
    pub codec: Option<String>,
    pub bitrate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<String>,
    /// JSON text.
    pub waveform: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// JSON array of strings.
    pub tags: Option<String>,
    pub context_type: Option<String>,
    pub context_id: Option<String>,
    pub reply_to: Option<String>,
}

/// One upload, as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Raw `X-User` value.
    pub owner: Option<String>,
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub declared: DeclaredMetadata,
    pub grant: ApiKeyGrant,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Creator may not upload; carries the reason shown to the client.
    #[error("{0}")]
    Permission(&'static str),

    #[error("pinning failed: {0}")]
    Pin(#[from] PinError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no free permlink after {attempts} attempts")]
    PermlinkExhausted { attempts: usize },
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(e) => e.into(),
            UploadError::Permission(reason) => AppError::Forbidden(reason.to_string()),
            UploadError::Pin(e) => e.into(),
            UploadError::Store(e) => e.into(),
            e @ UploadError::PermlinkExhausted { .. } => AppError::Internal(e.to_string()),
        }
    }
}

/// The collaborators an upload touches.
#[derive(Clone)]
pub struct UploadPipeline {
    records: Arc<dyn RecordStore>,
    creators: Arc<dyn CreatorStore>,
    content: Arc<dyn ContentStore>,
}

impl UploadPipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        creators: Arc<dyn CreatorStore>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            records,
            creators,
            content,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.records.clone(),
            state.creators.clone(),
            state.content.clone(),
        )
    }

    /// Run the whole pipeline.
    pub async fn upload(
        &self,
        request: UploadRequest,
        now: Timestamp,
    ) -> Result<AudioRecord, UploadError> {
        let owner = Username::from_optional(request.owner.as_deref())?;
        self.ensure_permission(&owner, now).await?;
        let metadata = validate_metadata(&request.declared)?;

        let content_id = self
            .content
            .pin(request.bytes.clone(), request.filename.as_deref())
            .await?;
        tracing::info!(owner = %owner, cid = %content_id, bytes = request.bytes.len(), "content pinned");

        let declared = request.declared;
        let draft = RecordDraft {
            owner,
            content_id,
            metadata,
            original_filename: request.filename,
            size: i64::try_from(request.bytes.len()).unwrap_or(i64::MAX),
            context_type: non_blank(declared.context_type),
            context_id: non_blank(declared.context_id),
            reply_to: non_blank(declared.reply_to),
            api_key_used: Some(request.grant.key_id),
            ephemeral: request.grant.ephemeral,
        };

        self.insert_with_fresh_permlink(&draft, now).await
    }

    async fn ensure_permission(&self, owner: &Username, now: Timestamp) -> Result<(), UploadError> {
        let account = self.creators.find(owner).await?;
        match UploadPermission::for_account(account.as_ref()) {
            UploadPermission::Allowed => Ok(()),
            UploadPermission::Denied(reason) => {
                tracing::warn!(owner = %owner, reason, "upload refused");
                Err(UploadError::Permission(reason))
            }
            UploadPermission::NewUser => {
                let created = self.creators.create_default(owner, now).await?;
                // A concurrent request may have created the account first.
                if let UploadPermission::Denied(reason) = UploadPermission::for_account(Some(&created)) {
                    tracing::warn!(owner = %owner, reason, "upload refused");
                    return Err(UploadError::Permission(reason));
                }
                tracing::info!(owner = %owner, "created creator account");
                Ok(())
            }
        }
    }

    async fn insert_with_fresh_permlink(
        &self,
        draft: &RecordDraft,
        now: Timestamp,
    ) -> Result<AudioRecord, UploadError> {
        for attempt in 1..=PERMLINK_ATTEMPTS {
            let permlink = Permlink::generate(&mut rand::thread_rng());
            let record = AudioRecord::new(draft, permlink, now);
            match self.records.insert(&record).await {
                Ok(()) => {
                    tracing::info!(
                        permlink = %record.permlink(),
                        owner = %record.owner,
                        ephemeral = draft.ephemeral,
                        "audio record created"
                    );
                    return Ok(record);
                }
                Err(StoreError::DuplicatePermlink(p)) => {
                    tracing::warn!(permlink = %p, attempt, "permlink collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::error!(
            cid = %draft.content_id,
            attempts = PERMLINK_ATTEMPTS,
            "permlink space exhausted; content stays pinned without a record"
        );
        Err(UploadError::PermlinkExhausted {
            attempts: PERMLINK_ATTEMPTS,
        })
    }
}

/// Presence and type checks on declared metadata.
///
/// Waveform and tags that fail to parse are dropped with a warning rather
/// than failing the upload.
pub fn validate_metadata(declared: &DeclaredMetadata) -> Result<AudioMetadata, ValidationError> {
    let duration = non_blank(declared.duration.clone());
    let format = non_blank(declared.format.clone());

    let missing: Vec<&'static str> = [("duration", &duration), ("format", &format)]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect();
    let (Some(duration), Some(format)) = (duration, format) else {
        return Err(ValidationError::MissingMetadata(missing));
    };

    let duration: f64 = duration
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ValidationError::InvalidMetadata {
            field: "duration",
            reason: format!("{duration:?} is not a non-negative number of seconds"),
        })?;

    Ok(AudioMetadata {
        format,
        codec: non_blank(declared.codec.clone()),
        duration,
        bitrate: parse_int("bitrate", &declared.bitrate)?,
        sample_rate: parse_int("sampleRate", &declared.sample_rate)?,
        channels: parse_int("channels", &declared.channels)?,
        waveform: parse_waveform(&declared.waveform),
        title: non_blank(declared.title.clone()),
        description: non_blank(declared.description.clone()),
        tags: parse_tags(&declared.tags),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_int<T: std::str::FromStr>(
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<T>, ValidationError> {
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::InvalidMetadata {
                field,
                reason: format!("{v:?} is not an integer"),
            }),
    }
}

fn parse_waveform(raw: &Option<String>) -> Option<serde_json::Value> {
    let raw = raw.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable waveform");
            None
        }
    }
}

fn parse_tags(raw: &Option<String>) -> Vec<String> {
    let Some(raw) = raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => tags,
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable tags");
            Vec::new()
        }
    }
}
