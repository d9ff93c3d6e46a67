use async_trait::async_trait;
use reqwest::header::HeaderName;

use super::client::HttpClient;

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// `header_name` is the header field to set and `key` is the raw value
/// written into it. PurpleAir authenticates every read with a static
/// `X-API-Key` header.
pub struct ApiKey<C> {
    pub inner: C,
    pub header_name: String,
    pub key: String,
}

impl<C> ApiKey<C> {
    /// Convenience constructor for `X-API-Key: <key>`, the PurpleAir
    /// authentication scheme.
    pub fn x_api_key(inner: C, key: String) -> Self {
        Self {
            inner,
            header_name: "X-API-Key".to_string(),
            key,
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let header_name = HeaderName::from_bytes(self.header_name.as_bytes())
            .expect("ApiKey: invalid header name");
        req.headers_mut()
            .insert(header_name, self.key.parse().unwrap());
        self.inner.execute(req).await
    }
}
