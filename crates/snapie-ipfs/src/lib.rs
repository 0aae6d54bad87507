//! # snapie-ipfs: Gateways and Pinning
//!
//! Everything that talks to IPFS lives here:
//!
//! - [`config`]: gateway and pin configuration from the environment.
//! - [`gateway`]: pure ordering of candidate gateway URLs by record status.
//! - [`fetch`]: sequential fetch-with-fallback over those candidates.
//! - [`pin`]: adding and pinning uploaded bytes through the IPFS HTTP API.
//! - [`retry`]: when a failed add is worth repeating.
//!
//! ## Seams
//!
//! [`GatewayFetcher`] and [`ContentStore`] are object-safe traits so the API
//! crate can hold them as `Arc<dyn _>` and tests can swap in fakes that
//! record calls.

pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod pin;
pub mod retry;

pub use config::{ConfigError, GatewayConfig, PinConfig};
pub use error::{FetchError, GatewayError, PinError};
pub use fetch::{fetch_with_fallback, Fetched, GatewayFetcher, GatewayResponse, HttpGatewayFetcher};
pub use gateway::{content_url, resolve_gateways};
pub use pin::{ContentStore, IpfsPinClient};
pub use retry::AddRetry;
