//! # snapie-store
//!
//! Persistence for audio records and creator accounts.
//!
//! - [`record`]: the stored clip, its metadata and admin listing filters.
//! - [`creator`]: creator accounts and the upload permission check.
//! - [`store`]: the [`RecordStore`] and [`CreatorStore`] traits.
//! - [`memory`]: process-local implementation.
//! - [`postgres`]: PostgreSQL implementation with embedded migrations.
//!
//! Records are never hard-deleted. Removal sets `status = removed`, and the
//! record stops resolving by permlink.

pub mod creator;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use creator::{CreatorAccount, CreatorPage, CreatorQuery, Pagination, UploadPermission};
pub use memory::MemoryStore;
pub use postgres::{PgStore, MIGRATOR};
pub use record::{
    AudioMetadata, AudioRecord, OwnerStats, RecordDraft, RecordFilter, RecordStatus,
    StorageStats, Visibility, DEFAULT_CONTEXT_TYPE, DEFAULT_FRONTEND_APP, LOCAL_NODE,
};
pub use store::{CreatorStore, RecordStore, StoreError};
