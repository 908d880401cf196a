//! HTTP client abstraction for forwarding calls to the backend
//!
//! The relay only ever executes backend calls through [`HttpClient`], so tests can swap the
//! pooled reqwest client for a mock that records what would have been sent.
use async_trait::async_trait;
use std::time::Duration;

/// Errors raised by the transport while exchanging a request with the backend.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait HttpClient: std::fmt::Debug + Send + Sync {
    async fn request(&self, req: reqwest::Request) -> Result<reqwest::Response, TransportError>;
}

#[async_trait]
impl HttpClient for reqwest::Client {
    async fn request(&self, req: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        self.execute(req)
            .await
            .map_err(|e| Box::new(e) as TransportError)
    }
}

/// Connection pool settings for the backend client.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 100,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

pub fn create_reqwest_client(pool: PoolConfig) -> Result<reqwest::Client, reqwest::Error> {
    tracing::debug!(
        "HTTP client pool config: idle_timeout={}s, max_idle_per_host={}",
        pool.idle_timeout.as_secs(),
        pool.max_idle_per_host
    );

    reqwest::Client::builder()
        .pool_idle_timeout(pool.idle_timeout)
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build()
}
