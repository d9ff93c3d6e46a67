use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for upstream calls. The retry loop and the services are
/// generic over this, so tests can substitute a canned transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Plain `reqwest::Client` with a per-request timeout.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }

    /// Client with both request and connect timeouts set, for calls that
    /// must not outlive the configured upstream deadline.
    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}
