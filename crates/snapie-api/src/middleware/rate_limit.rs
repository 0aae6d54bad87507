//! # Rate Limiting
//!
//! Fixed-window counters keyed per client. Two instances are mounted:
//! play tracking keyed by client address, uploads keyed by API key. The
//! upload limiter sits behind the key check, so only configured keys ever
//! get a bucket. Buckets whose window has lapsed are swept at most once per
//! window.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;

use crate::auth::presented_api_key;
use crate::error::AppError;

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn per_window(max_requests: u64, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u64,
    window_start: Instant,
}

#[derive(Debug)]
struct Buckets {
    by_key: HashMap<String, Bucket>,
    swept_at: Instant,
}

impl Buckets {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.swept_at) < window {
            return;
        }
        self.by_key
            .retain(|_, b| now.duration_since(b.window_start) < window);
        self.swept_at = now;
    }
}

/// What a limiter counts requests against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKey {
    /// First `X-Forwarded-For` hop, else the peer address.
    ClientAddr,
    /// The presented API key, else the client address. Mount behind
    /// `api_key_middleware` so the key is already authorized.
    ApiKey,
}

/// Shared limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    key: RateKey,
    buckets: Arc<Mutex<Buckets>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, key: RateKey) -> Self {
        Self {
            config,
            key,
            buckets: Arc::new(Mutex::new(Buckets {
                by_key: HashMap::new(),
                swept_at: Instant::now(),
            })),
        }
    }

    /// Count one request for `key`; `false` once the window is exhausted.
    pub fn check(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        buckets.sweep(now, self.config.window);
        let bucket = buckets.by_key.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.config.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            false
        } else {
            bucket.count += 1;
            true
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets.lock().by_key.len()
    }

    fn key_for(&self, request: &Request) -> String {
        match self.key {
            RateKey::ApiKey => presented_api_key(request.headers(), request.uri())
                .map(|k| format!("key:{k}"))
                .unwrap_or_else(|| client_addr(request)),
            RateKey::ClientAddr => client_addr(request),
        }
    }
}

fn client_addr(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Reject with 429 once the caller's window is exhausted.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = limiter.key_for(&request);
    if !limiter.check(&key, Instant::now()) {
        tracing::warn!(key = ?limiter.key, "rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(request).await
}
