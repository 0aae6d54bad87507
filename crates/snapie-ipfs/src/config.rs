//! Gateway and pinning configuration.
//!
//! Read once from the environment at process start and passed down
//! explicitly. Defaults point at public gateways and a local Kubo node.

use std::time::Duration;

use url::Url;

/// Gateways used to resolve content, in policy order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Gateway of the node that pins fresh uploads. Tried first only for
    /// records still pinned locally.
    pub local_gateway: Option<Url>,
    /// First public gateway.
    pub primary_gateway: Url,
    /// Remaining public gateways, tried in order after the primary.
    pub fallback_gateways: Vec<Url>,
    /// Per-gateway fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `IPFS_LOCAL_GATEWAY` (optional)
    /// - `IPFS_PRIMARY_GATEWAY` (default: `https://ipfs.io`)
    /// - `IPFS_FALLBACK_GATEWAYS` comma-separated
    ///   (default: `https://dweb.link,https://cloudflare-ipfs.com`)
    /// - `IPFS_FALLBACK_GATEWAY_1`, `_2`, ... appended in order
    /// - `GATEWAY_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let local_gateway = match std::env::var("IPFS_LOCAL_GATEWAY") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_gateway("IPFS_LOCAL_GATEWAY", &raw)?),
            _ => None,
        };

        let mut fallback_gateways = Vec::new();
        let list = std::env::var("IPFS_FALLBACK_GATEWAYS")
            .unwrap_or_else(|_| "https://dweb.link,https://cloudflare-ipfs.com".to_string());
        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            fallback_gateways.push(parse_gateway("IPFS_FALLBACK_GATEWAYS", raw)?);
        }
        for n in 1.. {
            let var = format!("IPFS_FALLBACK_GATEWAY_{n}");
            let Ok(raw) = std::env::var(&var) else { break };
            let url = parse_gateway(&var, &raw)?;
            if !fallback_gateways.contains(&url) {
                fallback_gateways.push(url);
            }
        }

        Ok(Self {
            local_gateway,
            primary_gateway: env_url("IPFS_PRIMARY_GATEWAY", "https://ipfs.io")?,
            fallback_gateways,
            fetch_timeout_secs: env_secs("GATEWAY_TIMEOUT_SECS", 10),
        })
    }

    /// Gateways on localhost ports (for testing). The first port is the
    /// local gateway, the second the primary, the rest fallbacks.
    pub fn local_mock(ports: &[u16]) -> Result<Self, ConfigError> {
        let make_url = |port: u16| -> Result<Url, ConfigError> {
            Url::parse(&format!("http://127.0.0.1:{port}"))
                .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))
        };
        let (local, rest) = ports.split_first().ok_or(ConfigError::NoGateways)?;
        let (primary, fallbacks) = rest.split_first().ok_or(ConfigError::NoGateways)?;
        Ok(Self {
            local_gateway: Some(make_url(*local)?),
            primary_gateway: make_url(*primary)?,
            fallback_gateways: fallbacks
                .iter()
                .map(|p| make_url(*p))
                .collect::<Result<_, _>>()?,
            fetch_timeout_secs: 2,
        })
    }

    /// Per-gateway fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Public gateways in order: primary, then fallbacks.
    pub fn public_gateways(&self) -> impl Iterator<Item = &Url> {
        std::iter::once(&self.primary_gateway).chain(self.fallback_gateways.iter())
    }
}

/// Where uploads are pinned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    /// Base URL of the IPFS HTTP API (Kubo RPC).
    pub api_url: Url,
    /// Timeout for a single add+pin request in seconds.
    pub timeout_secs: u64,
}

impl PinConfig {
    /// Variables:
    /// - `IPFS_API_URL` (default: `http://127.0.0.1:5001`)
    /// - `PIN_TIMEOUT_SECS` (default: 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: env_url("IPFS_API_URL", "http://127.0.0.1:5001")?,
            timeout_secs: env_secs("PIN_TIMEOUT_SECS", 120),
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    parse_gateway(var, &raw)
}

fn env_secs(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}

/// Parse a base URL that paths can be appended to.
fn parse_gateway(var: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(
            var.to_string(),
            format!("{raw} is not an http(s) base URL"),
        ));
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("at least a local and a primary gateway are required")]
    NoGateways,
}
