//! # snapie-cli: Operator Command-Line Interface
//!
//! Thin wrappers over the domain crates for checking identifiers and
//! gateways by hand and for inspecting the background-job queues.
//!
//! ## Subcommands
//!
//! - `cid`: classify a CID as v0/v1, exit 1 when invalid
//! - `gateways`: ordered candidate URLs for a CID
//! - `fetch`: fetch-with-fallback over the public gateways into a file
//! - `queue`: records due for migration
//! - `expired`: ephemeral records whose pin has lapsed
//!
//! ## Crate Policy
//!
//! - Argument parsing lives next to each handler; `main` only dispatches.
//! - Handlers return `anyhow::Result<u8>`, the process exit code on success.
//! - Gateway configuration is read from the same environment variables as
//!   the API service.

pub mod cid;
pub mod fetch;
pub mod records;
