//! # Service Configuration
//!
//! Read once at startup from the environment and carried in [`AppState`]
//! behind an `Arc`. Secrets are [`SecretToken`]s, so deriving `Debug` here
//! never prints them.
//!
//! [`AppState`]: crate::state::AppState

use url::Url;

use snapie_ipfs::GatewayConfig;

use crate::auth::{AdminAuth, ApiKeys, SecretToken};
use crate::middleware::rate_limit::RateLimitConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_ALLOWED_FORMATS: &[&str] = &["mp3", "m4a", "ogg", "webm", "wav"];

/// Uploads per minute per API key.
pub const DEFAULT_UPLOAD_RATE_MAX: u64 = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gateways: GatewayConfig,
    pub api_keys: ApiKeys,
    pub admin: AdminAuth,
    pub play_rate: RateLimitConfig,
    pub upload_rate: RateLimitConfig,
    pub max_upload_bytes: usize,
    /// Lowercase file extensions accepted for upload.
    pub allowed_formats: Vec<String>,
    /// Base for `playUrl`/`apiUrl`. When unset, built from the request's
    /// `X-Forwarded-Proto` and `Host`.
    pub public_base_url: Option<Url>,
    pub log_json: bool,
}

impl AppConfig {
    /// Defaults around the given gateways: no keys, no admin token.
    pub fn with_gateways(gateways: GatewayConfig) -> Self {
        Self {
            port: DEFAULT_PORT,
            gateways,
            api_keys: ApiKeys::default(),
            admin: AdminAuth::default(),
            play_rate: RateLimitConfig::per_window(100, 60),
            upload_rate: RateLimitConfig::per_window(DEFAULT_UPLOAD_RATE_MAX, 60),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_formats: DEFAULT_ALLOWED_FORMATS.iter().map(|f| f.to_string()).collect(),
            public_base_url: None,
            log_json: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Gateway variables are documented on [`GatewayConfig::from_env`].
    /// Others: `PORT`, `API_KEYS`, `DEMO_API_KEY`, `ADMIN_TOKEN`,
    /// `RATE_LIMIT_WINDOW_SECS`, `RATE_LIMIT_MAX_REQUESTS`,
    /// `UPLOAD_RATE_LIMIT_MAX`, `MAX_UPLOAD_BYTES`, `UPLOAD_ALLOWED_FORMATS`,
    /// `PUBLIC_BASE_URL`, `LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::with_gateways(GatewayConfig::from_env()?);

        config.port = env_parse("PORT", DEFAULT_PORT)?;

        config.api_keys = ApiKeys {
            keys: split_list(&env_or_empty("API_KEYS"))
                .map(SecretToken::new)
                .collect(),
            demo: non_empty_env("DEMO_API_KEY").map(SecretToken::new),
        };
        if config.api_keys.keys.is_empty() && config.api_keys.demo.is_none() {
            tracing::warn!("API_KEYS not set: all uploads will be rejected");
        }

        config.admin = AdminAuth {
            token: non_empty_env("ADMIN_TOKEN").map(SecretToken::new),
        };

        config.play_rate = RateLimitConfig::per_window(
            env_parse("RATE_LIMIT_MAX_REQUESTS", 100)?,
            env_parse("RATE_LIMIT_WINDOW_SECS", 60)?,
        );
        config.upload_rate =
            RateLimitConfig::per_window(env_parse("UPLOAD_RATE_LIMIT_MAX", DEFAULT_UPLOAD_RATE_MAX)?, 60);
        config.max_upload_bytes = env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        if let Some(formats) = non_empty_env("UPLOAD_ALLOWED_FORMATS") {
            config.allowed_formats = split_list(&formats).map(|f| f.to_lowercase()).collect();
        }

        config.public_base_url = non_empty_env("PUBLIC_BASE_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    var: "PUBLIC_BASE_URL",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        config.log_json = is_json_format(non_empty_env("LOG_FORMAT").as_deref());

        Ok(config)
    }

    /// Whether `filename` has an accepted extension.
    pub fn accepts_extension(&self, filename: &str) -> bool {
        file_extension(filename).is_some_and(|ext| self.allowed_formats.iter().any(|f| *f == ext))
    }
}

/// Lowercased extension after the last dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_lowercase())
}

fn env_or_empty(var: &str) -> String {
    std::env::var(var).unwrap_or_default()
}

/// `LOG_FORMAT=json` selects JSON lines; anything else is plain text.
fn is_json_format(value: Option<&str>) -> bool {
    value.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Gateway(#[from] snapie_ipfs::ConfigError),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::with_gateways(GatewayConfig::local_mock(&[9000, 9001]).unwrap())
    }

    #[test]
    fn defaults() {
        let c = config();
        assert_eq!(c.port, 3000);
        assert_eq!(c.max_upload_bytes, 52_428_800);
        assert_eq!(c.play_rate.max_requests, 100);
        assert_eq!(c.upload_rate.max_requests, 10);
        assert!(c.admin.token.is_none());
        assert!(!c.log_json);
    }

    #[test]
    fn log_format_selects_json_only_for_json() {
        assert!(is_json_format(Some("json")));
        assert!(is_json_format(Some(" JSON ")));
        assert!(!is_json_format(Some("text")));
        assert!(!is_json_format(None));
    }

    #[test]
    fn extension_filter() {
        let c = config();
        assert!(c.accepts_extension("clip.webm"));
        assert!(c.accepts_extension("Voice.MP3"));
        assert!(!c.accepts_extension("notes.txt"));
        assert!(!c.accepts_extension("noextension"));
        assert!(!c.accepts_extension("trailingdot."));
    }

    #[test]
    fn debug_never_prints_secrets() {
        let mut c = config();
        c.api_keys.keys.push(SecretToken::new("super-secret-key"));
        c.admin.token = Some(SecretToken::new("admin-secret"));
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret-key"));
        assert!(!dbg.contains("admin-secret"));
    }
}
