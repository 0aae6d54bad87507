//! # snapie-state: Record Lifecycle State Machine
//!
//! An audio record tracks two orthogonal status axes that are constrained
//! jointly:
//!
//! ```text
//! ipfs_status:       pinned_local ──► migrating ──► migrated
//!                         │
//!                         └──► expired            (ephemeral only)
//!
//! migration_status:  pending ──► queued ──► in_progress ──► completed
//!                    skip                         (ephemeral, set at creation)
//! ```
//!
//! [`Lifecycle`] owns both axes plus the deadlines that drive them
//! (`migration_queued_at`, `pin_until`). Every mutation goes through a
//! method that checks the current state and returns a [`LifecycleError`]
//! instead of silently moving a record somewhere it cannot go.
//!
//! ## Invariants
//!
//! - Terminal states (`skip`, `completed`, `expired`) are never left.
//! - A record with `pin_until` set is ephemeral and never migrates.
//! - The migration axis only advances in lock-step with the pin axis:
//!   `in_progress` ⇔ `migrating`, `completed` ⇔ `migrated`.
//!
//! Only the external migration worker and record creation drive these
//! transitions; the API never calls them on a request path.

pub mod lifecycle;

pub use lifecycle::{
    IpfsStatus, Lifecycle, LifecycleError, MigrationStatus, EPHEMERAL_PIN_HOURS,
    MIGRATION_COOLDOWN_HOURS,
};
