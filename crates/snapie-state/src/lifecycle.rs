//! # Record Lifecycle
//!
//! Creation rules and guarded transitions for the pin/migration axes of an
//! audio record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use snapie_core::Timestamp;

/// Cool-down before a standard upload becomes eligible for migration.
pub const MIGRATION_COOLDOWN_HOURS: i64 = 24;

/// How long an ephemeral upload stays pinned before it may be collected.
pub const EPHEMERAL_PIN_HOURS: i64 = 24;

// ── IPFS Status ──────────────────────────────────────────────────────

/// Where the record's content is currently expected to be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpfsStatus {
    /// Pinned on the local node only.
    PinnedLocal,
    /// Being copied to public pinning infrastructure.
    Migrating,
    /// Held by public infrastructure; the local pin may be gone.
    Migrated,
    /// Ephemeral pin has lapsed. Terminal state.
    Expired,
}

impl IpfsStatus {
    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// The stored string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PinnedLocal => "pinned_local",
            Self::Migrating => "migrating",
            Self::Migrated => "migrated",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for IpfsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IpfsStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pinned_local" => Ok(Self::PinnedLocal),
            "migrating" => Ok(Self::Migrating),
            "migrated" => Ok(Self::Migrated),
            "expired" => Ok(Self::Expired),
            other => Err(LifecycleError::UnknownStatus {
                axis: "ipfs_status",
                value: other.to_string(),
            }),
        }
    }
}

// ── Migration Status ─────────────────────────────────────────────────

/// Progress of moving a record's content to public infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Waiting for the cool-down to pass.
    Pending,
    /// Claimed for migration, not started.
    Queued,
    /// A worker is copying the content.
    InProgress,
    /// Migration finished. Terminal state.
    Completed,
    /// Ephemeral record, never migrated. Terminal state.
    Skip,
}

impl MigrationStatus {
    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skip)
    }

    /// Whether a worker may pick this record up.
    pub fn is_awaiting_migration(&self) -> bool {
        matches!(self, Self::Pending | Self::Queued)
    }

    /// The stored string name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MigrationStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skip" => Ok(Self::Skip),
            other => Err(LifecycleError::UnknownStatus {
                axis: "migration_status",
                value: other.to_string(),
            }),
        }
    }
}

// ── Error Types ──────────────────────────────────────────────────────

/// Rejected lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The current state does not allow the requested move.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        /// Current state, as `ipfs_status/migration_status`.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The record is in a terminal state on the axis being changed.
    #[error("record is in terminal state {state}")]
    TerminalState {
        /// The terminal state name.
        state: &'static str,
    },

    /// Ephemeral records are never migrated.
    #[error("ephemeral record (pin_until {pin_until}) cannot be migrated")]
    EphemeralRecord {
        /// When the ephemeral pin lapses.
        pin_until: Timestamp,
    },

    /// Expiry requested before the pin lapsed, or on a non-ephemeral record.
    #[error("pin has not expired (pin_until: {pin_until:?}, now: {now})")]
    PinNotExpired {
        /// The record's pin deadline, if any.
        pin_until: Option<Timestamp>,
        /// The instant expiry was evaluated at.
        now: Timestamp,
    },

    /// A stored status string is not recognised.
    #[error("unknown {axis} value \"{value}\"")]
    UnknownStatus {
        /// Which status column was being parsed.
        axis: &'static str,
        /// The unrecognised value.
        value: String,
    },
}

// ── Lifecycle ────────────────────────────────────────────────────────

/// The mutable lifecycle fields of an audio record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub ipfs_status: IpfsStatus,
    pub migration_status: MigrationStatus,
    /// Earliest instant a worker may migrate the record.
    pub migration_queued_at: Option<Timestamp>,
    pub migration_completed_at: Option<Timestamp>,
    /// Set only for ephemeral records.
    pub pin_until: Option<Timestamp>,
}

impl Lifecycle {
    /// Initial state for a standard upload: pinned locally, migration
    /// pending after the cool-down.
    pub fn new_standard(now: Timestamp) -> Self {
        Self {
            ipfs_status: IpfsStatus::PinnedLocal,
            migration_status: MigrationStatus::Pending,
            migration_queued_at: Some(now.plus_hours(MIGRATION_COOLDOWN_HOURS)),
            migration_completed_at: None,
            pin_until: None,
        }
    }

    /// Initial state for an ephemeral upload: pinned locally until
    /// `now + 24h`, never migrated.
    pub fn new_ephemeral(now: Timestamp) -> Self {
        Self {
            ipfs_status: IpfsStatus::PinnedLocal,
            migration_status: MigrationStatus::Skip,
            migration_queued_at: None,
            migration_completed_at: None,
            pin_until: Some(now.plus_hours(EPHEMERAL_PIN_HOURS)),
        }
    }

    /// Pick the creation rule for an upload.
    pub fn for_upload(now: Timestamp, ephemeral: bool) -> Self {
        if ephemeral {
            Self::new_ephemeral(now)
        } else {
            Self::new_standard(now)
        }
    }

    /// Whether the record was created through the ephemeral path.
    pub fn is_ephemeral(&self) -> bool {
        self.pin_until.is_some() || self.migration_status == MigrationStatus::Skip
    }

    /// Whether a migration worker may claim the record at `now`.
    pub fn is_due_for_migration(&self, now: Timestamp) -> bool {
        self.migration_status.is_awaiting_migration()
            && !self.is_ephemeral()
            && self.migration_queued_at.is_some_and(|at| at <= now)
    }

    /// Whether the ephemeral pin lapsed strictly before `now`.
    pub fn is_pin_expired(&self, now: Timestamp) -> bool {
        self.pin_until.is_some_and(|until| until < now)
    }

    /// Whether the local gateway is still expected to hold the content.
    pub fn served_locally(&self) -> bool {
        self.ipfs_status == IpfsStatus::PinnedLocal
    }

    /// `pending → queued`.
    pub fn queue(&mut self) -> Result<(), LifecycleError> {
        self.require_migratable()?;
        if self.migration_status != MigrationStatus::Pending {
            return Err(self.invalid(IpfsStatus::PinnedLocal, MigrationStatus::Queued));
        }
        self.migration_status = MigrationStatus::Queued;
        Ok(())
    }

    /// `pending|queued → in_progress`, `pinned_local → migrating`.
    pub fn start_migration(&mut self) -> Result<(), LifecycleError> {
        self.require_migratable()?;
        if !self.migration_status.is_awaiting_migration()
            || self.ipfs_status != IpfsStatus::PinnedLocal
        {
            return Err(self.invalid(IpfsStatus::Migrating, MigrationStatus::InProgress));
        }
        self.migration_status = MigrationStatus::InProgress;
        self.ipfs_status = IpfsStatus::Migrating;
        Ok(())
    }

    /// `in_progress → completed`, `migrating → migrated`.
    pub fn complete_migration(&mut self, now: Timestamp) -> Result<(), LifecycleError> {
        self.require_migratable()?;
        if self.migration_status != MigrationStatus::InProgress
            || self.ipfs_status != IpfsStatus::Migrating
        {
            return Err(self.invalid(IpfsStatus::Migrated, MigrationStatus::Completed));
        }
        self.migration_status = MigrationStatus::Completed;
        self.ipfs_status = IpfsStatus::Migrated;
        self.migration_completed_at = Some(now);
        Ok(())
    }

    /// Hand a failed migration back to the queue: `in_progress → queued`,
    /// `migrating → pinned_local`, eligible again at `retry_at`.
    pub fn requeue(&mut self, retry_at: Timestamp) -> Result<(), LifecycleError> {
        self.require_migratable()?;
        if self.migration_status != MigrationStatus::InProgress
            || self.ipfs_status != IpfsStatus::Migrating
        {
            return Err(self.invalid(IpfsStatus::PinnedLocal, MigrationStatus::Queued));
        }
        self.migration_status = MigrationStatus::Queued;
        self.ipfs_status = IpfsStatus::PinnedLocal;
        self.migration_queued_at = Some(retry_at);
        Ok(())
    }

    /// `pinned_local → expired` for an ephemeral record whose pin lapsed.
    pub fn expire(&mut self, now: Timestamp) -> Result<(), LifecycleError> {
        if self.ipfs_status.is_terminal() {
            return Err(LifecycleError::TerminalState {
                state: self.ipfs_status.as_str(),
            });
        }
        if !self.is_ephemeral() || !self.is_pin_expired(now) {
            return Err(LifecycleError::PinNotExpired {
                pin_until: self.pin_until,
                now,
            });
        }
        if self.ipfs_status != IpfsStatus::PinnedLocal {
            return Err(self.invalid(IpfsStatus::Expired, self.migration_status));
        }
        self.ipfs_status = IpfsStatus::Expired;
        Ok(())
    }

    fn require_migratable(&self) -> Result<(), LifecycleError> {
        if let Some(pin_until) = self.pin_until {
            return Err(LifecycleError::EphemeralRecord { pin_until });
        }
        if self.migration_status.is_terminal() {
            return Err(LifecycleError::TerminalState {
                state: self.migration_status.as_str(),
            });
        }
        if self.ipfs_status.is_terminal() {
            return Err(LifecycleError::TerminalState {
                state: self.ipfs_status.as_str(),
            });
        }
        Ok(())
    }

    fn invalid(&self, ipfs: IpfsStatus, migration: MigrationStatus) -> LifecycleError {
        LifecycleError::InvalidTransition {
            from: format!("{}/{}", self.ipfs_status, self.migration_status),
            to: format!("{ipfs}/{migration}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-05-01T10:00:00Z").unwrap()
    }

    // ── Creation ────────────────────────────────────────────────────

    #[test]
    fn standard_upload_waits_a_day() {
        let lc = Lifecycle::for_upload(t0(), false);
        assert_eq!(lc.ipfs_status, IpfsStatus::PinnedLocal);
        assert_eq!(lc.migration_status, MigrationStatus::Pending);
        assert_eq!(lc.migration_queued_at, Some(t0().plus_hours(24)));
        assert_eq!(lc.pin_until, None);
        assert!(!lc.is_ephemeral());
    }

    #[test]
    fn ephemeral_upload_is_skip_with_expiry() {
        let lc = Lifecycle::for_upload(t0(), true);
        assert_eq!(lc.ipfs_status, IpfsStatus::PinnedLocal);
        assert_eq!(lc.migration_status, MigrationStatus::Skip);
        assert_eq!(lc.pin_until, Some(t0().plus_hours(24)));
        assert_eq!(lc.migration_queued_at, None);
        assert!(lc.is_ephemeral());
    }

    // ── Migration path ──────────────────────────────────────────────

    #[test]
    fn full_migration_path() {
        let mut lc = Lifecycle::new_standard(t0());
        lc.queue().unwrap();
        assert_eq!(lc.migration_status, MigrationStatus::Queued);
        lc.start_migration().unwrap();
        assert_eq!(lc.ipfs_status, IpfsStatus::Migrating);
        let done = t0().plus_hours(30);
        lc.complete_migration(done).unwrap();
        assert_eq!(lc.ipfs_status, IpfsStatus::Migrated);
        assert_eq!(lc.migration_status, MigrationStatus::Completed);
        assert_eq!(lc.migration_completed_at, Some(done));
    }

    #[test]
    fn worker_may_start_straight_from_pending() {
        let mut lc = Lifecycle::new_standard(t0());
        lc.start_migration().unwrap();
        assert_eq!(lc.migration_status, MigrationStatus::InProgress);
    }

    #[test]
    fn completed_is_terminal() {
        let mut lc = Lifecycle::new_standard(t0());
        lc.start_migration().unwrap();
        lc.complete_migration(t0()).unwrap();
        assert_eq!(
            lc.queue(),
            Err(LifecycleError::TerminalState { state: "completed" })
        );
        assert!(lc.start_migration().is_err());
        assert!(lc.requeue(t0()).is_err());
        assert!(lc.complete_migration(t0()).is_err());
    }

    #[test]
    fn complete_requires_in_progress() {
        let mut lc = Lifecycle::new_standard(t0());
        let err = lc.complete_migration(t0()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert_eq!(lc, Lifecycle::new_standard(t0()));
    }

    #[test]
    fn queue_twice_is_rejected() {
        let mut lc = Lifecycle::new_standard(t0());
        lc.queue().unwrap();
        assert!(matches!(
            lc.queue(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn requeue_returns_to_local_pin() {
        let mut lc = Lifecycle::new_standard(t0());
        lc.start_migration().unwrap();
        let retry = t0().plus_hours(48);
        lc.requeue(retry).unwrap();
        assert_eq!(lc.ipfs_status, IpfsStatus::PinnedLocal);
        assert_eq!(lc.migration_status, MigrationStatus::Queued);
        assert_eq!(lc.migration_queued_at, Some(retry));
    }

    // ── Ephemeral carve-out ─────────────────────────────────────────

    #[test]
    fn ephemeral_never_migrates() {
        let mut lc = Lifecycle::new_ephemeral(t0());
        let pin_until = t0().plus_hours(24);
        assert_eq!(lc.queue(), Err(LifecycleError::EphemeralRecord { pin_until }));
        assert_eq!(
            lc.start_migration(),
            Err(LifecycleError::EphemeralRecord { pin_until })
        );
        assert_eq!(lc.ipfs_status, IpfsStatus::PinnedLocal);
        assert!(!lc.is_due_for_migration(t0().plus_hours(1000)));
    }

    #[test]
    fn ephemeral_expires_only_after_deadline() {
        let mut lc = Lifecycle::new_ephemeral(t0());
        let deadline = t0().plus_hours(24);
        assert!(matches!(
            lc.expire(deadline),
            Err(LifecycleError::PinNotExpired { .. })
        ));
        lc.expire(deadline.plus_hours(1)).unwrap();
        assert_eq!(lc.ipfs_status, IpfsStatus::Expired);
        assert_eq!(
            lc.expire(deadline.plus_hours(2)),
            Err(LifecycleError::TerminalState { state: "expired" })
        );
    }

    #[test]
    fn standard_record_cannot_expire() {
        let mut lc = Lifecycle::new_standard(t0());
        assert!(matches!(
            lc.expire(t0().plus_hours(10_000)),
            Err(LifecycleError::PinNotExpired { pin_until: None, .. })
        ));
    }

    // ── Queries ─────────────────────────────────────────────────────

    #[test]
    fn due_for_migration_honours_cooldown() {
        let lc = Lifecycle::new_standard(t0());
        assert!(!lc.is_due_for_migration(t0()));
        assert!(lc.is_due_for_migration(t0().plus_hours(24)));
    }

    #[test]
    fn status_strings_roundtrip() {
        for s in [
            IpfsStatus::PinnedLocal,
            IpfsStatus::Migrating,
            IpfsStatus::Migrated,
            IpfsStatus::Expired,
        ] {
            assert_eq!(s.as_str().parse::<IpfsStatus>().unwrap(), s);
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{s}\""));
        }
        for s in [
            MigrationStatus::Pending,
            MigrationStatus::Queued,
            MigrationStatus::InProgress,
            MigrationStatus::Completed,
            MigrationStatus::Skip,
        ] {
            assert_eq!(s.as_str().parse::<MigrationStatus>().unwrap(), s);
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{s}\""));
        }
        assert!("archived".parse::<IpfsStatus>().is_err());
    }
}
