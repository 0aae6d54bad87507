//! PostgreSQL store.
//!
//! Uniqueness of permlinks comes from the primary key, play increments are a
//! single `UPDATE ... SET plays = plays + 1 ... RETURNING`, and lifecycle
//! updates are compare-and-set on the current status pair and deadlines.
//! No application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::PgPool;

use snapie_core::{ContentId, Permlink, Timestamp, Username};
use snapie_state::{IpfsStatus, Lifecycle, MigrationStatus};

use crate::creator::{CreatorAccount, CreatorPage, CreatorQuery, Pagination};
use crate::record::{
    AudioMetadata, AudioRecord, OwnerStats, RecordFilter, RecordStatus, StorageStats, Visibility,
};
use crate::store::{CreatorStore, RecordStore, StoreError};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const RECORD_COLUMNS: &str = "permlink, owner, frontend_app, audio_cid, pinned_nodes, \
     ipfs_status, migration_status, migration_queued_at, migration_completed_at, pin_until, \
     original_filename, format, codec, size, duration, bitrate, sample_rate, channels, waveform, \
     title, description, tags, context_type, context_id, reply_to, status, visibility, \
     plays, likes, last_played, created_at, updated_at, api_key_used, last_gc_check";

const CREATOR_COLUMNS: &str = "username, banned, can_upload, verified, joined";

/// Compare-and-set over every lifecycle column: the row changes only if it
/// still holds the whole expected lifecycle.
const UPDATE_LIFECYCLE: &str = "UPDATE audio_records SET
        ipfs_status = $2, migration_status = $3, migration_queued_at = $4,
        migration_completed_at = $5, pin_until = $6, updated_at = $7
     WHERE permlink = $1
       AND ipfs_status = $8 AND migration_status = $9
       AND migration_queued_at IS NOT DISTINCT FROM $10
       AND pin_until IS NOT DISTINCT FROM $11
       AND migration_completed_at IS NOT DISTINCT FROM $12";

/// Postgres-backed [`RecordStore`] and [`CreatorStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn select_records(tail: &str) -> String {
    format!("SELECT {RECORD_COLUMNS} FROM audio_records {tail}")
}

fn into_records(rows: Vec<RecordRow>) -> Result<Vec<AudioRecord>, StoreError> {
    rows.into_iter().map(RecordRow::into_record).collect()
}

fn ts(value: Option<Timestamp>) -> Option<DateTime<Utc>> {
    value.map(Timestamp::into_datetime)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert(&self, record: &AudioRecord) -> Result<(), StoreError> {
        let lc = &record.lifecycle;
        let md = &record.metadata;
        let result = sqlx::query(
            "INSERT INTO audio_records (
                permlink, owner, frontend_app, audio_cid, pinned_nodes,
                ipfs_status, migration_status, migration_queued_at, migration_completed_at, pin_until,
                original_filename, format, codec, size, duration, bitrate, sample_rate, channels,
                waveform, title, description, tags, context_type, context_id, reply_to,
                status, visibility, plays, likes, last_played, created_at, updated_at,
                api_key_used, last_gc_check
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32,
                $33, $34
            )",
        )
        .bind(record.permlink().as_str())
        .bind(record.owner.as_str())
        .bind(&record.frontend_app)
        .bind(record.content_id().as_str())
        .bind(&record.pinned_nodes)
        .bind(lc.ipfs_status.as_str())
        .bind(lc.migration_status.as_str())
        .bind(ts(lc.migration_queued_at))
        .bind(ts(lc.migration_completed_at))
        .bind(ts(lc.pin_until))
        .bind(&record.original_filename)
        .bind(&md.format)
        .bind(&md.codec)
        .bind(record.size)
        .bind(md.duration)
        .bind(md.bitrate)
        .bind(md.sample_rate)
        .bind(md.channels)
        .bind(&md.waveform)
        .bind(&md.title)
        .bind(&md.description)
        .bind(&md.tags)
        .bind(&record.context_type)
        .bind(&record.context_id)
        .bind(&record.reply_to)
        .bind(record.status.as_str())
        .bind(record.visibility.as_str())
        .bind(record.plays)
        .bind(record.likes)
        .bind(ts(record.last_played))
        .bind(record.created_at.into_datetime())
        .bind(record.updated_at.into_datetime())
        .bind(&record.api_key_used)
        .bind(ts(record.last_gc_check))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::DuplicatePermlink(record.permlink().clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_published(&self, permlink: &Permlink) -> Result<Option<AudioRecord>, StoreError> {
        let sql = select_records("WHERE permlink = $1 AND status = 'published'");
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(permlink.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(RecordRow::into_record)
            .transpose()
    }

    async fn find(&self, permlink: &Permlink) -> Result<Option<AudioRecord>, StoreError> {
        let sql = select_records("WHERE permlink = $1");
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(permlink.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(RecordRow::into_record)
            .transpose()
    }

    async fn find_by_content_id(&self, cid: &ContentId) -> Result<Vec<AudioRecord>, StoreError> {
        let sql = select_records("WHERE audio_cid = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(cid.as_str())
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn increment_plays(
        &self,
        permlink: &Permlink,
        now: Timestamp,
    ) -> Result<Option<i64>, StoreError> {
        let plays: Option<i64> = sqlx::query_scalar(
            "UPDATE audio_records SET plays = plays + 1, last_played = $2
             WHERE permlink = $1 AND status = 'published'
             RETURNING plays",
        )
        .bind(permlink.as_str())
        .bind(now.into_datetime())
        .fetch_optional(&self.pool)
        .await?;
        Ok(plays)
    }

    async fn update_lifecycle(
        &self,
        permlink: &Permlink,
        expected: &Lifecycle,
        next: &Lifecycle,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(UPDATE_LIFECYCLE)
        .bind(permlink.as_str())
        .bind(next.ipfs_status.as_str())
        .bind(next.migration_status.as_str())
        .bind(ts(next.migration_queued_at))
        .bind(ts(next.migration_completed_at))
        .bind(ts(next.pin_until))
        .bind(now.into_datetime())
        .bind(expected.ipfs_status.as_str())
        .bind(expected.migration_status.as_str())
        .bind(ts(expected.migration_queued_at))
        .bind(ts(expected.pin_until))
        .bind(ts(expected.migration_completed_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM audio_records WHERE permlink = $1)")
                .bind(permlink.as_str())
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Err(StoreError::LifecycleConflict(permlink.clone()))
        } else {
            Err(StoreError::NotFound(format!("record {permlink}")))
        }
    }

    async fn migration_queue(
        &self,
        due_by: Timestamp,
        limit: i64,
    ) -> Result<Vec<AudioRecord>, StoreError> {
        let sql = select_records(
            "WHERE migration_status IN ('pending', 'queued') AND migration_queued_at <= $1
             ORDER BY migration_queued_at ASC LIMIT $2",
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(due_by.into_datetime())
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn expired_pins(&self, now: Timestamp, limit: i64) -> Result<Vec<AudioRecord>, StoreError> {
        let sql = select_records(
            "WHERE pin_until IS NOT NULL AND pin_until < $1 ORDER BY pin_until ASC LIMIT $2",
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(now.into_datetime())
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn removed(&self, limit: i64) -> Result<Vec<AudioRecord>, StoreError> {
        let sql = select_records("WHERE status = 'removed' ORDER BY updated_at ASC LIMIT $1");
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn mark_removed(&self, permlink: &Permlink, now: Timestamp) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE audio_records SET status = 'removed', updated_at = $2 WHERE permlink = $1",
        )
        .bind(permlink.as_str())
        .bind(now.into_datetime())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_recent(
        &self,
        filter: RecordFilter,
        limit: i64,
    ) -> Result<Vec<AudioRecord>, StoreError> {
        let clause = match filter {
            RecordFilter::All => "",
            RecordFilter::Demo | RecordFilter::Skip => "WHERE migration_status = 'skip'",
            RecordFilter::Pending => "WHERE migration_status = 'pending'",
        };
        let sql = select_records(&format!("{clause} ORDER BY created_at DESC LIMIT $1"));
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(limit.max(0))
            .fetch_all(&self.pool)
            .await?;
        into_records(rows)
    }

    async fn stats(&self) -> Result<StorageStats, StoreError> {
        let (total_files, demo_files, pending_migration, total_size): (i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE migration_status = 'skip'),
                    COUNT(*) FILTER (WHERE migration_status = 'pending'),
                    COALESCE(SUM(size), 0)::BIGINT
                 FROM audio_records",
            )
            .fetch_one(&self.pool)
            .await?;
        Ok(StorageStats {
            total_files,
            demo_files,
            pending_migration,
            total_size,
        })
    }

    async fn owner_stats(&self, owner: &Username) -> Result<OwnerStats, StoreError> {
        let (total_uploads, total_plays, last_upload): (i64, i64, Option<DateTime<Utc>>) =
            sqlx::query_as(
                "SELECT COUNT(*), COALESCE(SUM(plays), 0)::BIGINT, MAX(created_at)
                 FROM audio_records WHERE owner = $1",
            )
            .bind(owner.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(OwnerStats {
            total_uploads,
            total_plays,
            last_upload: last_upload.map(Timestamp::from_utc),
        })
    }
}

#[async_trait]
impl CreatorStore for PgStore {
    async fn find(&self, username: &Username) -> Result<Option<CreatorAccount>, StoreError> {
        let sql = format!("SELECT {CREATOR_COLUMNS} FROM content_creators WHERE username = $1");
        sqlx::query_as::<_, CreatorRow>(&sql)
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(CreatorRow::into_account)
            .transpose()
    }

    async fn create_default(
        &self,
        username: &Username,
        now: Timestamp,
    ) -> Result<CreatorAccount, StoreError> {
        let fresh = CreatorAccount::new_default(username.clone(), now);
        sqlx::query(
            "INSERT INTO content_creators (username, banned, can_upload, verified, joined)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username.as_str())
        .bind(fresh.banned)
        .bind(fresh.can_upload)
        .bind(fresh.verified)
        .bind(now.into_datetime())
        .execute(&self.pool)
        .await?;

        CreatorStore::find(self, username)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("creator {username}")))
    }

    async fn set_banned(
        &self,
        username: &Username,
        banned: bool,
    ) -> Result<Option<CreatorAccount>, StoreError> {
        let sql = format!(
            "UPDATE content_creators SET banned = $2, can_upload = NOT $2
             WHERE username = $1 RETURNING {CREATOR_COLUMNS}"
        );
        sqlx::query_as::<_, CreatorRow>(&sql)
            .bind(username.as_str())
            .bind(banned)
            .fetch_optional(&self.pool)
            .await?
            .map(CreatorRow::into_account)
            .transpose()
    }

    async fn list(&self, query: &CreatorQuery) -> Result<CreatorPage, StoreError> {
        let search = query.search.as_deref().filter(|s| !s.is_empty());
        // strpos avoids treating user input as a LIKE pattern.
        let filter = "WHERE ($1::TEXT IS NULL OR strpos(lower(username), lower($1)) > 0)
                        AND ($2::BOOLEAN IS NULL OR banned = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM content_creators {filter}"))
            .bind(search)
            .bind(query.banned)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {CREATOR_COLUMNS} FROM content_creators {filter}
             ORDER BY joined DESC, username ASC LIMIT $3 OFFSET $4"
        );
        let users = sqlx::query_as::<_, CreatorRow>(&sql)
            .bind(search)
            .bind(query.banned)
            .bind(query.limit.max(1))
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CreatorRow::into_account)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CreatorPage {
            users,
            pagination: Pagination::new(query, total),
        })
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct RecordRow {
    permlink: String,
    owner: String,
    frontend_app: String,
    audio_cid: String,
    pinned_nodes: Vec<String>,
    ipfs_status: String,
    migration_status: String,
    migration_queued_at: Option<DateTime<Utc>>,
    migration_completed_at: Option<DateTime<Utc>>,
    pin_until: Option<DateTime<Utc>>,
    original_filename: Option<String>,
    format: String,
    codec: Option<String>,
    size: i64,
    duration: f64,
    bitrate: Option<i32>,
    sample_rate: Option<i32>,
    channels: Option<i16>,
    waveform: Option<serde_json::Value>,
    title: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    context_type: String,
    context_id: Option<String>,
    reply_to: Option<String>,
    status: String,
    visibility: String,
    plays: i64,
    likes: i64,
    last_played: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    api_key_used: Option<String>,
    last_gc_check: Option<DateTime<Utc>>,
}

fn corrupt(column: &'static str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization {
        column,
        detail: detail.to_string(),
    }
}

impl RecordRow {
    fn into_record(self) -> Result<AudioRecord, StoreError> {
        let permlink = Permlink::new(self.permlink).map_err(|e| corrupt("permlink", e))?;
        let ipfs_status: IpfsStatus = self
            .ipfs_status
            .parse()
            .map_err(|e| corrupt("ipfs_status", e))?;
        let migration_status: MigrationStatus = self
            .migration_status
            .parse()
            .map_err(|e| corrupt("migration_status", e))?;
        let status = RecordStatus::parse(&self.status)
            .ok_or_else(|| corrupt("status", &self.status))?;
        let visibility = Visibility::parse(&self.visibility).unwrap_or_else(|| {
            tracing::warn!(permlink = %permlink, visibility = %self.visibility, "unknown visibility, treating as public");
            Visibility::Public
        });

        Ok(AudioRecord {
            owner: Username::new(self.owner).map_err(|e| corrupt("owner", e))?,
            content_id: ContentId::from_content_store(self.audio_cid)
                .map_err(|e| corrupt("audio_cid", e))?,
            frontend_app: self.frontend_app,
            pinned_nodes: self.pinned_nodes,
            lifecycle: Lifecycle {
                ipfs_status,
                migration_status,
                migration_queued_at: self.migration_queued_at.map(Timestamp::from_utc),
                migration_completed_at: self.migration_completed_at.map(Timestamp::from_utc),
                pin_until: self.pin_until.map(Timestamp::from_utc),
            },
            metadata: AudioMetadata {
                format: self.format,
                codec: self.codec,
                duration: self.duration,
                bitrate: self.bitrate,
                sample_rate: self.sample_rate,
                channels: self.channels,
                waveform: self.waveform,
                title: self.title,
                description: self.description,
                tags: self.tags,
            },
            original_filename: self.original_filename,
            size: self.size,
            context_type: self.context_type,
            context_id: self.context_id,
            reply_to: self.reply_to,
            status,
            visibility,
            plays: self.plays,
            likes: self.likes,
            last_played: self.last_played.map(Timestamp::from_utc),
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
            api_key_used: self.api_key_used,
            last_gc_check: self.last_gc_check.map(Timestamp::from_utc),
            permlink,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CreatorRow {
    username: String,
    banned: bool,
    can_upload: bool,
    verified: bool,
    joined: DateTime<Utc>,
}

impl CreatorRow {
    fn into_account(self) -> Result<CreatorAccount, StoreError> {
        Ok(CreatorAccount {
            username: Username::new(self.username).map_err(|e| corrupt("username", e))?,
            banned: self.banned,
            can_upload: self.can_upload,
            verified: self.verified,
            joined: Timestamp::from_utc(self.joined),
        })
    }
}
