//! Upstream HTTP access with bounded retries.
//!
//! [`HttpClient`] is the transport seam; [`BasicClient`] wraps a
//! `reqwest::Client` and [`auth::ApiKey`] layers header authentication on
//! top of any client. [`fetch_json`] drives the retry loop.

pub mod auth;
mod client;

pub use client::{BasicClient, HttpClient};

use std::fmt;
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{error, warn};

/// Total attempts per fetch, counting the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Statuses worth retrying; everything else fails fast.
const RETRYABLE: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Upstream failure after the retry budget is spent.
///
/// Carries a short diagnostic; this layer never lets a transport fault
/// propagate as anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError(pub String);

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FetchError {}

/// Delay before the next attempt: 0.5 s doubling per attempt already made.
fn backoff_delay(attempts_made: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempts_made.saturating_sub(1)))
}

/// Fetches one JSON snapshot from `base_url`, optionally restricted to a
/// comma-joined `fields` list passed as a query parameter.
///
/// Transport failures and retryable statuses are retried up to
/// [`MAX_ATTEMPTS`] with exponential backoff. 401/403 means a rejected API
/// key: logged distinctly, never retried. Only idempotent GETs go through
/// here.
#[tracing::instrument(skip(client))]
pub async fn fetch_json<C: HttpClient>(
    client: &C,
    base_url: &str,
    fields: Option<&str>,
) -> Result<Value, FetchError> {
    let mut url: Url = base_url
        .parse()
        .map_err(|e| FetchError(format!("invalid upstream url: {e}")))?;
    if let Some(fields) = fields {
        url.query_pairs_mut().append_pair("fields", fields);
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let req = reqwest::Request::new(Method::GET, url.clone());

        match client.execute(req).await {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    return resp
                        .json::<Value>()
                        .await
                        .map_err(|e| FetchError(format!("invalid JSON body: {e}")));
                }

                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    let body: String = resp
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(200)
                        .collect();
                    error!(%status, body, "upstream rejected API key");
                    return Err(FetchError(format!("auth error: {status}")));
                }

                if RETRYABLE.contains(&status) && attempt < MAX_ATTEMPTS {
                    warn!(%status, attempt, "retryable upstream status");
                    sleep(backoff_delay(attempt)).await;
                    continue;
                }

                return Err(FetchError(format!("upstream status {status}")));
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                warn!(error = %e, attempt, "transport error, retrying");
                sleep(backoff_delay(attempt)).await;
            }
            Err(e) => return Err(FetchError(format!("transport error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_half_second() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError("upstream status 503".to_string());
        assert_eq!(err.to_string(), "upstream status 503");
    }
}
