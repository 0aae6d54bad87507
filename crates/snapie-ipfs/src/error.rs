//! IPFS error types.

/// Why a single gateway attempt failed. Logged, never returned to clients.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The attempt exceeded its per-gateway timeout.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The gateway answered with a non-2xx status.
    #[error("gateway returned HTTP {0}")]
    Status(u16),
    /// Connection, TLS or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outcome of a whole fallback resolution.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No candidate URLs were configured or resolved.
    #[error("no gateway candidates to try")]
    NoCandidates,
    /// Every candidate failed. Individual reasons are in the logs only.
    #[error("content unavailable after trying {attempts} gateway(s)")]
    ContentUnavailable {
        /// Number of candidates tried.
        attempts: usize,
    },
}

/// Errors from the IPFS HTTP API when adding and pinning content.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The IPFS API returned a non-2xx status.
    #[error("IPFS API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response did not contain a usable content identifier.
    #[error("unexpected response from {endpoint}: {detail}")]
    Response { endpoint: String, detail: String },
    /// The request URL could not be built.
    #[error("invalid IPFS API URL: {0}")]
    Url(String),
}
