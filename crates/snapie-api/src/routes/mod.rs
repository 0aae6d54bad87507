//! # API Route Modules
//!
//! - `audio`: record and direct-CID reads, gateway-fallback streaming, play
//!   tracking.
//! - `upload`: multipart upload through the upload pipeline.
//! - `admin`: storage stats, file listing and removal, creator moderation.

pub mod admin;
pub mod audio;
pub mod upload;
