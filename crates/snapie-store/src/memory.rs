//! In-memory store.
//!
//! Used when `DATABASE_URL` is unset and in tests. Every mutation runs under
//! a single write lock, which makes play increments and lifecycle
//! compare-and-set atomic. No lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use snapie_core::{ContentId, Permlink, Timestamp, Username};
use snapie_state::Lifecycle;

use crate::creator::{CreatorAccount, CreatorPage, CreatorQuery, Pagination};
use crate::record::{AudioRecord, OwnerStats, RecordFilter, RecordStatus, StorageStats};
use crate::store::{CreatorStore, RecordStore, StoreError};
use snapie_state::MigrationStatus;

/// Records and creators held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Permlink, AudioRecord>>>,
    creators: Arc<RwLock<HashMap<Username, CreatorAccount>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, in any status.
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    fn collect_sorted<K: Ord>(
        &self,
        filter: impl Fn(&AudioRecord) -> bool,
        key: impl Fn(&AudioRecord) -> K,
        limit: i64,
    ) -> Vec<AudioRecord> {
        let mut out: Vec<AudioRecord> = self
            .records
            .read()
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        out.sort_by_key(|r| key(r));
        out.truncate(clamp_limit(limit));
        out
    }
}

fn clamp_limit(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &AudioRecord) -> Result<(), StoreError> {
        let mut guard = self.records.write();
        if guard.contains_key(record.permlink()) {
            return Err(StoreError::DuplicatePermlink(record.permlink().clone()));
        }
        guard.insert(record.permlink().clone(), record.clone());
        Ok(())
    }

    async fn find_published(&self, permlink: &Permlink) -> Result<Option<AudioRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .get(permlink)
            .filter(|r| r.is_published())
            .cloned())
    }

    async fn find(&self, permlink: &Permlink) -> Result<Option<AudioRecord>, StoreError> {
        Ok(self.records.read().get(permlink).cloned())
    }

    async fn find_by_content_id(&self, cid: &ContentId) -> Result<Vec<AudioRecord>, StoreError> {
        Ok(self.collect_sorted(
            |r| r.content_id() == cid,
            |r| std::cmp::Reverse(r.created_at),
            i64::MAX,
        ))
    }

    async fn increment_plays(
        &self,
        permlink: &Permlink,
        now: Timestamp,
    ) -> Result<Option<i64>, StoreError> {
        let mut guard = self.records.write();
        Ok(guard
            .get_mut(permlink)
            .filter(|r| r.is_published())
            .map(|r| {
                r.plays += 1;
                r.last_played = Some(now);
                r.plays
            }))
    }

    async fn update_lifecycle(
        &self,
        permlink: &Permlink,
        expected: &Lifecycle,
        next: &Lifecycle,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut guard = self.records.write();
        let record = guard
            .get_mut(permlink)
            .ok_or_else(|| StoreError::NotFound(format!("record {permlink}")))?;
        if &record.lifecycle != expected {
            return Err(StoreError::LifecycleConflict(permlink.clone()));
        }
        record.lifecycle = next.clone();
        record.updated_at = now;
        Ok(())
    }

    async fn migration_queue(
        &self,
        due_by: Timestamp,
        limit: i64,
    ) -> Result<Vec<AudioRecord>, StoreError> {
        Ok(self.collect_sorted(
            |r| {
                r.lifecycle.migration_status.is_awaiting_migration()
                    && r.lifecycle.migration_queued_at.is_some_and(|at| at <= due_by)
            },
            |r| r.lifecycle.migration_queued_at,
            limit,
        ))
    }

    async fn expired_pins(&self, now: Timestamp, limit: i64) -> Result<Vec<AudioRecord>, StoreError> {
        Ok(self.collect_sorted(
            |r| r.lifecycle.is_pin_expired(now),
            |r| r.lifecycle.pin_until,
            limit,
        ))
    }

    async fn removed(&self, limit: i64) -> Result<Vec<AudioRecord>, StoreError> {
        Ok(self.collect_sorted(
            |r| r.status == RecordStatus::Removed,
            |r| r.updated_at,
            limit,
        ))
    }

    async fn mark_removed(&self, permlink: &Permlink, now: Timestamp) -> Result<bool, StoreError> {
        let mut guard = self.records.write();
        Ok(match guard.get_mut(permlink) {
            Some(record) => {
                record.status = RecordStatus::Removed;
                record.updated_at = now;
                true
            }
            None => false,
        })
    }

    async fn list_recent(
        &self,
        filter: RecordFilter,
        limit: i64,
    ) -> Result<Vec<AudioRecord>, StoreError> {
        Ok(self.collect_sorted(
            |r| filter.matches(r),
            |r| std::cmp::Reverse(r.created_at),
            limit,
        ))
    }

    async fn stats(&self) -> Result<StorageStats, StoreError> {
        let guard = self.records.read();
        let mut stats = StorageStats::default();
        for r in guard.values() {
            stats.total_files += 1;
            stats.total_size += r.size;
            match r.lifecycle.migration_status {
                MigrationStatus::Skip => stats.demo_files += 1,
                MigrationStatus::Pending => stats.pending_migration += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn owner_stats(&self, owner: &Username) -> Result<OwnerStats, StoreError> {
        let guard = self.records.read();
        let mut stats = OwnerStats::default();
        for r in guard.values().filter(|r| &r.owner == owner) {
            stats.total_uploads += 1;
            stats.total_plays += r.plays;
            stats.last_upload = stats.last_upload.max(Some(r.created_at));
        }
        Ok(stats)
    }
}

#[async_trait]
impl CreatorStore for MemoryStore {
    async fn find(&self, username: &Username) -> Result<Option<CreatorAccount>, StoreError> {
        Ok(self.creators.read().get(username).cloned())
    }

    async fn create_default(
        &self,
        username: &Username,
        now: Timestamp,
    ) -> Result<CreatorAccount, StoreError> {
        let mut guard = self.creators.write();
        Ok(guard
            .entry(username.clone())
            .or_insert_with(|| CreatorAccount::new_default(username.clone(), now))
            .clone())
    }

    async fn set_banned(
        &self,
        username: &Username,
        banned: bool,
    ) -> Result<Option<CreatorAccount>, StoreError> {
        let mut guard = self.creators.write();
        Ok(guard.get_mut(username).map(|a| {
            a.set_banned(banned);
            a.clone()
        }))
    }

    async fn list(&self, query: &CreatorQuery) -> Result<CreatorPage, StoreError> {
        let mut matching: Vec<CreatorAccount> = self
            .creators
            .read()
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.joined.cmp(&a.joined).then_with(|| a.username.cmp(&b.username)));
        let total = matching.len() as i64;
        let users = matching
            .into_iter()
            .skip(clamp_limit(query.offset()))
            .take(clamp_limit(query.limit.max(1)))
            .collect();
        Ok(CreatorPage {
            users,
            pagination: Pagination::new(query, total),
        })
    }
}
