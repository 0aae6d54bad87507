//! # snapie-core: Foundational Types for Snapie Audio
//!
//! This crate is the leaf of the workspace. It defines the identifier
//! newtypes and primitives every other crate shares; it depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `Permlink`, `Username` and
//!    `ContentId` validate at construction. No bare strings cross crate
//!    boundaries as identifiers.
//!
//! 2. **One CID validator.** [`cid::is_valid_cid`] is the only place the
//!    accepted CID shapes are defined. The direct-CID read path and the CLI
//!    both go through it.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is UTC with seconds precision so
//!    that lifecycle deadlines (`pin_until`, `migration_queued_at`) compare
//!    exactly across the in-memory and Postgres stores.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `snapie-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod cid;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use cid::{is_valid_cid, CidVersion, ContentId};
pub use error::ValidationError;
pub use identity::{Permlink, Username, ANONYMOUS_USER, PERMLINK_LEN};
pub use temporal::Timestamp;
