//! Page fetching with bounded retries.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Backoff, FetchConfig};
use crate::utils::http;

/// Source of raw page bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the body of `url` once.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Create a fetcher with a client built from the fetch settings.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(http::create_client(config)?))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        http::fetch_text(&self.client, url).await
    }
}

/// How often and how patiently a page fetch is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_secs(config.retry_delay_secs),
            max_delay: Duration::from_secs(config.max_retry_delay_secs),
            backoff: config.backoff,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Fetch `url`, retrying every failure until the policy is exhausted.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetcher.fetch(url).await {
            Ok(body) => return Ok(body),
            Err(error) if attempt >= policy.max_attempts => {
                log::error!(
                    "All {} attempts to fetch {} failed; check the network connection",
                    policy.max_attempts,
                    url
                );
                return Err(AppError::FetchExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }
            Err(error) => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "Fetching {} failed: {}. Retrying in {:?} ({}/{})",
                    url,
                    error,
                    delay,
                    attempt,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedFetcher;
    use super::*;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    fn transient() -> AppError {
        AppError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(transient()),
            Err(transient()),
            Ok("<p>ok</p>".into()),
        ]);
        let body = fetch_with_retry(&fetcher, "https://example.com/", &instant_policy(16))
            .await
            .unwrap();
        assert_eq!(body, "<p>ok</p>");
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let fetcher = ScriptedFetcher::new((0..5).map(|_| Err(transient())).collect());
        let err = fetch_with_retry(&fetcher, "https://example.com/", &instant_policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FetchExhausted { attempts: 3, .. }));
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 16,
            delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff: Backoff::Exponential,
        };
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(4), Duration::from_secs(40));
        assert_eq!(policy.delay_after(7), Duration::from_secs(300));
        assert_eq!(policy.delay_after(40), Duration::from_secs(300));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy {
            backoff: Backoff::Fixed,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(1), policy.delay_after(10));
    }

    #[test]
    fn test_default_policy_matches_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 16);
        assert_eq!(policy.backoff, Backoff::Exponential);
    }
}
