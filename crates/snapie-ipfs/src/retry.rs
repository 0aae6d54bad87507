//! Backoff for `/api/v0/add`.
//!
//! Kubo reports node-side failures (repo full, malformed multipart) as 500
//! with a text body, and those are final. What is retried is the daemon
//! being unreachable: a refused connection, or the 502/503/504 a reverse
//! proxy answers with while the node restarts. A timed-out add is not
//! retried since the node may still be importing the bytes. Re-adding the
//! same bytes yields the same CID.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

/// Retry policy for add requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRetry {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time.
    pub base_delay: Duration,
}

impl Default for AddRetry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl AddRetry {
    fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Run `send` until it succeeds, fails for good, or retries run out.
    pub(crate) async fn run<F, Fut>(&self, send: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut retry = 0;
        loop {
            let result = send().await;
            if retry >= self.max_retries || !node_unreachable(&result) {
                return result;
            }
            let delay = self.delay(retry);
            retry += 1;
            match &result {
                Ok(resp) => tracing::warn!(
                    status = resp.status().as_u16(),
                    retry,
                    "IPFS node unavailable behind proxy, retrying add in {delay:?}"
                ),
                Err(e) => tracing::warn!(
                    retry,
                    error = %e,
                    "IPFS API unreachable, retrying add in {delay:?}"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }
}

fn node_unreachable(result: &Result<reqwest::Response, reqwest::Error>) -> bool {
    match result {
        Ok(resp) => matches!(
            resp.status(),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ),
        Err(e) => e.is_connect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn refused_connection_exhausts_retries() {
        let policy = AddRetry {
            max_retries: 2,
            base_delay: Duration::ZERO,
        };
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = policy
            .run(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    reqwest::Client::new()
                        .post("http://127.0.0.1:1/api/v0/add")
                        .send()
                        .await
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_doubles_and_saturates() {
        let policy = AddRetry::default();
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_millis(1000));
        assert!(policy.delay(40) > policy.delay(2));
    }
}
