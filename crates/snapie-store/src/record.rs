//! # Audio Records
//!
//! One stored clip: identity, content reference, lifecycle, descriptive
//! metadata, engagement counters and bookkeeping.
//!
//! `permlink` and `content_id` are read-only outside this crate: both are
//! set once in [`AudioRecord::new`] and never change afterwards.

use serde::{Deserialize, Serialize};

use snapie_core::{ContentId, Permlink, Timestamp, Username};
use snapie_state::Lifecycle;

/// Frontend that created records through this service.
pub const DEFAULT_FRONTEND_APP: &str = "snapie";

/// Context assigned when the client does not name one.
pub const DEFAULT_CONTEXT_TYPE: &str = "voice_message";

/// Node label for the pin made at upload time.
pub const LOCAL_NODE: &str = "local";

/// Whether a record resolves by permlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Published,
    /// Logically deleted; the unpin job picks these up.
    Removed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Removed => "removed",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Audience of a published record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "unlisted" => Some(Self::Unlisted),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Client-declared descriptive metadata. Passed through, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    pub format: String,
    pub codec: Option<String>,
    /// Seconds.
    pub duration: f64,
    pub bitrate: Option<i32>,
    pub sample_rate: Option<i32>,
    pub channels: Option<i16>,
    /// Peak summary for rendering, as sent by the recorder.
    pub waveform: Option<serde_json::Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Everything an upload contributes to a record before a permlink exists.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub owner: Username,
    pub content_id: ContentId,
    pub metadata: AudioMetadata,
    pub original_filename: Option<String>,
    pub size: i64,
    pub context_type: Option<String>,
    pub context_id: Option<String>,
    pub reply_to: Option<String>,
    /// First characters of the API key that authorised the upload.
    pub api_key_used: Option<String>,
    pub ephemeral: bool,
}

/// A stored audio clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRecord {
    pub(crate) permlink: Permlink,
    pub owner: Username,
    pub frontend_app: String,

    #[serde(rename = "audio_cid")]
    pub(crate) content_id: ContentId,
    pub pinned_nodes: Vec<String>,

    #[serde(flatten)]
    pub lifecycle: Lifecycle,

    #[serde(flatten)]
    pub metadata: AudioMetadata,
    pub original_filename: Option<String>,
    pub size: i64,

    pub context_type: String,
    pub context_id: Option<String>,
    pub reply_to: Option<String>,

    pub status: RecordStatus,
    pub visibility: Visibility,

    pub plays: i64,
    pub likes: i64,
    pub last_played: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    pub api_key_used: Option<String>,
    pub last_gc_check: Option<Timestamp>,
}

impl AudioRecord {
    /// Build a fresh, published record with the creation-time lifecycle.
    pub fn new(draft: &RecordDraft, permlink: Permlink, now: Timestamp) -> Self {
        Self {
            permlink,
            owner: draft.owner.clone(),
            frontend_app: DEFAULT_FRONTEND_APP.to_string(),
            content_id: draft.content_id.clone(),
            pinned_nodes: vec![LOCAL_NODE.to_string()],
            lifecycle: Lifecycle::for_upload(now, draft.ephemeral),
            metadata: draft.metadata.clone(),
            original_filename: draft.original_filename.clone(),
            size: draft.size,
            context_type: draft
                .context_type
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTEXT_TYPE.to_string()),
            context_id: draft.context_id.clone(),
            reply_to: draft.reply_to.clone(),
            status: RecordStatus::Published,
            visibility: Visibility::Public,
            plays: 0,
            likes: 0,
            last_played: None,
            created_at: now,
            updated_at: now,
            api_key_used: draft.api_key_used.clone(),
            last_gc_check: None,
        }
    }

    pub fn permlink(&self) -> &Permlink {
        &self.permlink
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn is_published(&self) -> bool {
        self.status == RecordStatus::Published
    }
}

/// Admin listing filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFilter {
    #[default]
    All,
    /// Ephemeral uploads (`migration_status = skip`).
    Demo,
    /// Waiting for migration (`migration_status = pending`).
    Pending,
    /// Same set as [`RecordFilter::Demo`].
    Skip,
}

impl RecordFilter {
    pub fn matches(&self, record: &AudioRecord) -> bool {
        use snapie_state::MigrationStatus;
        match self {
            Self::All => true,
            Self::Demo | Self::Skip => record.lifecycle.migration_status == MigrationStatus::Skip,
            Self::Pending => record.lifecycle.migration_status == MigrationStatus::Pending,
        }
    }
}

/// Totals for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_files: i64,
    pub demo_files: i64,
    pub pending_migration: i64,
    /// Bytes.
    pub total_size: i64,
}

/// Per-owner upload totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStats {
    pub total_uploads: i64,
    pub total_plays: i64,
    pub last_upload: Option<Timestamp>,
}
