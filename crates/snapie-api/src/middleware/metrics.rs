//! # Request Metrics
//!
//! In-process atomic counters, rendered as plain text at `GET /metrics`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Gateway source indexes tracked individually; later ones share the last slot.
const GATEWAY_SLOTS: usize = 8;

/// Shared metrics state.
#[derive(Debug, Clone)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    /// Successful stream fetches by the index of the gateway that served them.
    gateway_hits: Arc<[AtomicU64; GATEWAY_SLOTS]>,
    /// Stream requests where every gateway failed.
    gateway_exhausted: Arc<AtomicU64>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            gateway_hits: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
            gateway_exhausted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn record_gateway_hit(&self, source_index: usize) {
        let slot = source_index.min(GATEWAY_SLOTS - 1);
        self.gateway_hits[slot].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gateway_exhausted(&self) {
        self.gateway_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gateway_hits(&self, source_index: usize) -> u64 {
        self.gateway_hits[source_index.min(GATEWAY_SLOTS - 1)].load(Ordering::Relaxed)
    }

    /// Plain-text exposition, one `name value` pair per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "snapie_http_requests_total {}", self.requests());
        let _ = writeln!(out, "snapie_http_errors_total {}", self.errors());
        for (i, hits) in self.gateway_hits.iter().enumerate() {
            let _ = writeln!(
                out,
                "snapie_gateway_hits_total{{index=\"{i}\"}} {}",
                hits.load(Ordering::Relaxed)
            );
        }
        let _ = writeln!(
            out,
            "snapie_gateway_exhausted_total {}",
            self.gateway_exhausted.load(Ordering::Relaxed)
        );
        out
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Count requests and 4xx/5xx responses.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        if response.status().is_server_error() || response.status().is_client_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    response
}
