//! Read-through access to the PurpleAir sensor endpoint.
//!
//! One cache entry per requested field-set string; the key is the joined
//! field list verbatim (no reordering), or the `ALL` sentinel when no
//! restriction was asked for.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::error;

use crate::cache::TtlCache;
use crate::fetch::{self, HttpClient};

/// One upstream snapshot: either the sensor payload or a failure marker.
///
/// Failures are cached like payloads, so a down upstream is retried at
/// most once per TTL window instead of on every request.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Payload(Value),
    Unreachable { detail: String },
}

impl Snapshot {
    /// JSON form handed to clients: the payload itself, or the structured
    /// error body.
    pub fn to_json(&self) -> Value {
        match self {
            Snapshot::Payload(payload) => payload.clone(),
            Snapshot::Unreachable { detail } => json!({
                "error": "purpleair_unreachable",
                "detail": detail,
            }),
        }
    }
}

/// Read access to current sensor values. The aggregator is generic over
/// this, so tests can run against canned snapshots.
#[async_trait]
pub trait SensorReader: Send + Sync {
    /// Returns the current snapshot for the given comma-joined field set,
    /// or for all fields when `None`.
    async fn read(&self, fields: Option<&str>) -> Snapshot;
}

fn cache_key(fields: Option<&str>) -> String {
    format!("pa::{}", fields.unwrap_or("ALL"))
}

/// Caching sensor reader backed by the PurpleAir HTTP API.
///
/// Constructed once at startup and shared by reference across requests;
/// all field-set queries funnel through the one cache instance.
pub struct SensorDataService<C> {
    client: C,
    sensor_url: String,
    ttl: Duration,
    cache: TtlCache<Snapshot>,
}

impl<C: HttpClient> SensorDataService<C> {
    pub const CACHE_CAPACITY: usize = 128;

    pub fn new(client: C, sensor_url: String, ttl: Duration) -> Self {
        Self {
            client,
            sensor_url,
            ttl,
            cache: TtlCache::new(Self::CACHE_CAPACITY),
        }
    }
}

#[async_trait]
impl<C: HttpClient> SensorReader for SensorDataService<C> {
    async fn read(&self, fields: Option<&str>) -> Snapshot {
        let key = cache_key(fields);
        self.cache
            .get_or_fetch(&key, self.ttl, || async {
                match fetch::fetch_json(&self.client, &self.sensor_url, fields).await {
                    Ok(payload) => Snapshot::Payload(payload),
                    Err(e) => {
                        error!(error = %e, "PurpleAir fetch failed");
                        Snapshot::Unreachable {
                            detail: e.to_string(),
                        }
                    }
                }
            })
            .await
    }
}
