//! Store traits and errors.
//!
//! Both traits are object-safe (`async-trait`) so the API holds them as
//! `Arc<dyn RecordStore>` / `Arc<dyn CreatorStore>` and picks the backend at
//! startup.

use async_trait::async_trait;

use snapie_core::{ContentId, Permlink, Timestamp, Username};
use snapie_state::Lifecycle;

use crate::creator::{CreatorAccount, CreatorPage, CreatorQuery};
use crate::record::{AudioRecord, OwnerStats, RecordFilter, StorageStats};

/// Errors from either store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The permlink is already taken. The caller regenerates and retries.
    #[error("permlink {0} already exists")]
    DuplicatePermlink(Permlink),

    #[error("{0} not found")]
    NotFound(String),

    /// A compare-and-set on the lifecycle lost against a concurrent writer.
    #[error("lifecycle of {0} changed concurrently")]
    LifecycleConflict(Permlink),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be mapped back to a domain type.
    #[error("corrupt stored value in {column}: {detail}")]
    Serialization {
        column: &'static str,
        detail: String,
    },
}

/// Persistent audio records, keyed by permlink.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::DuplicatePermlink`]
    /// instead of overwriting.
    async fn insert(&self, record: &AudioRecord) -> Result<(), StoreError>;

    /// A published record by permlink.
    async fn find_published(&self, permlink: &Permlink) -> Result<Option<AudioRecord>, StoreError>;

    /// A record by permlink regardless of status.
    async fn find(&self, permlink: &Permlink) -> Result<Option<AudioRecord>, StoreError>;

    /// All records pointing at `cid`, newest first.
    async fn find_by_content_id(&self, cid: &ContentId) -> Result<Vec<AudioRecord>, StoreError>;

    /// Atomically add one play to a published record. Returns the new count,
    /// or `None` when no published record has that permlink.
    async fn increment_plays(
        &self,
        permlink: &Permlink,
        now: Timestamp,
    ) -> Result<Option<i64>, StoreError>;

    /// Replace the lifecycle fields only if they still equal `expected`.
    async fn update_lifecycle(
        &self,
        permlink: &Permlink,
        expected: &Lifecycle,
        next: &Lifecycle,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Records awaiting migration (`pending`/`queued`) whose
    /// `migration_queued_at <= due_by`, oldest first.
    async fn migration_queue(
        &self,
        due_by: Timestamp,
        limit: i64,
    ) -> Result<Vec<AudioRecord>, StoreError>;

    /// Records whose `pin_until` is strictly before `now`, oldest first.
    async fn expired_pins(&self, now: Timestamp, limit: i64) -> Result<Vec<AudioRecord>, StoreError>;

    /// Logically deleted records, for the unpin job.
    async fn removed(&self, limit: i64) -> Result<Vec<AudioRecord>, StoreError>;

    /// Set `status = removed`. Returns `false` when the permlink is unknown.
    async fn mark_removed(&self, permlink: &Permlink, now: Timestamp) -> Result<bool, StoreError>;

    /// Newest records matching `filter`.
    async fn list_recent(
        &self,
        filter: RecordFilter,
        limit: i64,
    ) -> Result<Vec<AudioRecord>, StoreError>;

    async fn stats(&self) -> Result<StorageStats, StoreError>;

    async fn owner_stats(&self, owner: &Username) -> Result<OwnerStats, StoreError>;
}

/// Creator accounts and their upload permissions.
#[async_trait]
pub trait CreatorStore: Send + Sync {
    async fn find(&self, username: &Username) -> Result<Option<CreatorAccount>, StoreError>;

    /// Create an account with default permissions. If a concurrent request
    /// created it first, the existing account is returned unchanged.
    async fn create_default(
        &self,
        username: &Username,
        now: Timestamp,
    ) -> Result<CreatorAccount, StoreError>;

    /// Ban or unban. `None` when the account does not exist.
    async fn set_banned(
        &self,
        username: &Username,
        banned: bool,
    ) -> Result<Option<CreatorAccount>, StoreError>;

    /// Newest-joined first.
    async fn list(&self, query: &CreatorQuery) -> Result<CreatorPage, StoreError>;
}
