//! Single- and multi-pollutant AQI aggregation over sensor snapshots.

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::aqi::{self, BreakpointRow, PM10_BREAKPOINTS, PM25_BREAKPOINTS};
use crate::fields::{build_field, extract_field_value};
use crate::sensor::{SensorReader, Snapshot};

/// Tag on the PM1 sub-index: PM1 has no official EPA scale, so it is
/// scored on the PM2.5 table.
const PM1_NOTE: &str = "approx_from_pm25_breakpoints";

/// Particulate sizes the aggregator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pollutant {
    Pm1,
    Pm25,
    Pm10,
}

impl Pollutant {
    /// Upstream field base name.
    pub fn base(self) -> &'static str {
        match self {
            Pollutant::Pm1 => "pm1.0",
            Pollutant::Pm25 => "pm2.5",
            Pollutant::Pm10 => "pm10.0",
        }
    }

    fn table(self) -> &'static [BreakpointRow] {
        match self {
            Pollutant::Pm1 | Pollutant::Pm25 => &PM25_BREAKPOINTS,
            Pollutant::Pm10 => &PM10_BREAKPOINTS,
        }
    }
}

/// Aggregator-level failure. Final for the request that saw it; the next
/// request gets a fresh attempt, subject to the cache TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Upstream could not be reached, possibly replayed from a cached
    /// failure snapshot.
    Unreachable { detail: String },
    /// The requested field was missing or null in the snapshot.
    FieldNotFound { field: String },
}

impl AggregateError {
    /// Structured error body handed to clients.
    pub fn to_json(&self) -> Value {
        match self {
            AggregateError::Unreachable { detail } => json!({
                "error": "purpleair_unreachable",
                "detail": detail,
            }),
            AggregateError::FieldNotFound { field } => json!({
                "error": "field_not_found_or_null",
                "field": field,
            }),
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateError::Unreachable { detail } => {
                write!(f, "PurpleAir unreachable: {detail}")
            }
            AggregateError::FieldNotFound { field } => {
                write!(f, "field not found or null: {field}")
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// AQI reading for one pollutant field.
#[derive(Debug, Serialize)]
pub struct SingleReading {
    pub field: String,
    pub pm: f64,
    pub aqi: u16,
    pub aqi_percent: f64,
    pub category: &'static str,
}

/// Per-pollutant slot of a combined reading; all-null when the value was
/// absent from the snapshot.
#[derive(Debug, Serialize)]
pub struct SubIndex {
    pub pm: Option<f64>,
    pub aqi: Option<u16>,
    pub category: Option<&'static str>,
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

impl SubIndex {
    fn absent() -> Self {
        Self {
            pm: None,
            aqi: None,
            category: None,
            percent: None,
            note: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CombinedFields {
    pub pm1: String,
    pub pm25: String,
    pub pm10: String,
}

#[derive(Debug, Serialize)]
pub struct CombinedValues {
    pub pm1: Option<f64>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub pm_avg: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Subindices {
    pub pm1: SubIndex,
    pub pm25: SubIndex,
    pub pm10: SubIndex,
}

/// The worst available sub-index, or all-null when no pollutant value was
/// available.
#[derive(Debug, Serialize)]
pub struct CombinedVerdict {
    pub aqi: Option<u16>,
    pub percent: Option<f64>,
    pub category: Option<&'static str>,
    pub from: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct CombinedReading {
    pub fields: CombinedFields,
    pub values: CombinedValues,
    pub subindices: Subindices,
    pub combined: CombinedVerdict,
}

/// Computes AQI readings through a [`SensorReader`].
pub struct AqiAggregator<R> {
    reader: R,
}

impl<R: SensorReader> AqiAggregator<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// The underlying reader, for callers that want the raw snapshot.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// AQI for one pollutant: reads the single upstream field and converts
    /// it with the pollutant's breakpoint table.
    pub async fn single_pollutant(
        &self,
        pollutant: Pollutant,
        variant: &str,
        channel: &str,
    ) -> Result<SingleReading, AggregateError> {
        let field = build_field(pollutant.base(), variant, channel);
        let payload = match self.reader.read(Some(&field)).await {
            Snapshot::Payload(payload) => payload,
            Snapshot::Unreachable { detail } => {
                return Err(AggregateError::Unreachable { detail });
            }
        };

        let pm = extract_field_value(&payload, &field)
            .ok_or_else(|| AggregateError::FieldNotFound {
                field: field.clone(),
            })?;
        let (aqi, category) = aqi::concentration_to_aqi(pm, pollutant.table());

        Ok(SingleReading {
            field,
            pm,
            aqi,
            aqi_percent: aqi::aqi_percent(aqi),
            category,
        })
    }

    /// Combined AQI across PM1, PM2.5, and PM10 from one upstream read.
    ///
    /// Any subset of the three may be absent. The verdict is the maximum
    /// available sub-index; ties go to the earlier of PM2.5, PM10, PM1.
    /// With no values at all the verdict is all-null, never zero.
    pub async fn combined(
        &self,
        variant: &str,
        channel: &str,
    ) -> Result<CombinedReading, AggregateError> {
        let f_pm1 = build_field(Pollutant::Pm1.base(), variant, channel);
        let f_pm25 = build_field(Pollutant::Pm25.base(), variant, channel);
        let f_pm10 = build_field(Pollutant::Pm10.base(), variant, channel);
        let field_set = format!("{f_pm1},{f_pm25},{f_pm10}");

        let payload = match self.reader.read(Some(&field_set)).await {
            Snapshot::Payload(payload) => payload,
            Snapshot::Unreachable { detail } => {
                return Err(AggregateError::Unreachable { detail });
            }
        };

        let v_pm1 = extract_field_value(&payload, &f_pm1);
        let v_pm25 = extract_field_value(&payload, &f_pm25);
        let v_pm10 = extract_field_value(&payload, &f_pm10);

        let scored = [
            ("pm25", Pollutant::Pm25, v_pm25),
            ("pm10", Pollutant::Pm10, v_pm10),
            ("pm1", Pollutant::Pm1, v_pm1),
        ]
        .map(|(name, pollutant, value)| {
            (
                name,
                value.map(|pm| (pm, aqi::concentration_to_aqi(pm, pollutant.table()))),
            )
        });

        let mut top: Option<(&'static str, u16, &'static str)> = None;
        for (name, entry) in scored {
            if let Some((_, (aqi, category))) = entry
                && top.is_none_or(|(_, best, _)| aqi > best)
            {
                top = Some((name, aqi, category));
            }
        }

        let combined = match top {
            Some((from, aqi, category)) => CombinedVerdict {
                aqi: Some(aqi),
                percent: Some(aqi::aqi_percent(aqi)),
                category: Some(category),
                from: Some(from),
            },
            None => CombinedVerdict {
                aqi: None,
                percent: None,
                category: None,
                from: None,
            },
        };

        let [sub_pm25, sub_pm10, sub_pm1] =
            [scored[0].1, scored[1].1, scored[2].1].map(|entry| match entry {
                Some((pm, (aqi, category))) => SubIndex {
                    pm: Some(pm),
                    aqi: Some(aqi),
                    category: Some(category),
                    percent: Some(aqi::aqi_percent(aqi)),
                    note: None,
                },
                None => SubIndex::absent(),
            });
        let sub_pm1 = SubIndex {
            note: sub_pm1.pm.is_some().then_some(PM1_NOTE),
            ..sub_pm1
        };

        Ok(CombinedReading {
            fields: CombinedFields {
                pm1: f_pm1,
                pm25: f_pm25,
                pm10: f_pm10,
            },
            values: CombinedValues {
                pm1: v_pm1,
                pm25: v_pm25,
                pm10: v_pm10,
                pm_avg: safe_mean([v_pm1, v_pm25, v_pm10]),
            },
            subindices: Subindices {
                pm1: sub_pm1,
                pm25: sub_pm25,
                pm10: sub_pm10,
            },
            combined,
        })
    }
}

/// Mean of the available values, rounded to two decimals; `None` when
/// nothing was available.
fn safe_mean(values: [Option<f64>; 3]) -> Option<f64> {
    let nums: Vec<f64> = values.into_iter().flatten().collect();
    if nums.is_empty() {
        return None;
    }
    let mean = nums.iter().sum::<f64>() / nums.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedReader(Snapshot);

    #[async_trait]
    impl SensorReader for FixedReader {
        async fn read(&self, _fields: Option<&str>) -> Snapshot {
            self.0.clone()
        }
    }

    fn aggregator_with(payload: Value) -> AqiAggregator<FixedReader> {
        AqiAggregator::new(FixedReader(Snapshot::Payload(payload)))
    }

    #[tokio::test]
    async fn test_single_pollutant_converts() {
        let aggregator = aggregator_with(json!({"sensor": {"pm2.5_atm": 12.0}}));
        let reading = aggregator
            .single_pollutant(Pollutant::Pm25, "atm", "")
            .await
            .unwrap();

        assert_eq!(reading.field, "pm2.5_atm");
        assert_eq!(reading.pm, 12.0);
        assert_eq!(reading.aqi, 50);
        assert_eq!(reading.aqi_percent, 10.0);
        assert_eq!(reading.category, "Good");
    }

    #[tokio::test]
    async fn test_single_pollutant_pm10_uses_its_own_table() {
        let aggregator = aggregator_with(json!({"sensor": {"pm10.0_atm": 60.0}}));
        let reading = aggregator
            .single_pollutant(Pollutant::Pm10, "atm", "")
            .await
            .unwrap();

        assert_eq!(reading.aqi, 53);
        assert_eq!(reading.category, "Moderate");
    }

    #[tokio::test]
    async fn test_single_pollutant_missing_field() {
        let aggregator = aggregator_with(json!({"sensor": {"humidity": 40}}));
        let err = aggregator
            .single_pollutant(Pollutant::Pm25, "cf_1", "_b")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AggregateError::FieldNotFound {
                field: "pm2.5_cf_1_b".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_single_pollutant_unreachable() {
        let aggregator = AqiAggregator::new(FixedReader(Snapshot::Unreachable {
            detail: "transport error: timeout".to_string(),
        }));
        let err = aggregator
            .single_pollutant(Pollutant::Pm25, "atm", "")
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_combined_picks_max_subindex() {
        // PM2.5 14.5 -> AQI 56 "Moderate"; PM10 20 -> AQI 19 "Good".
        let aggregator = aggregator_with(json!({
            "sensor": {"pm2.5_atm": 14.5, "pm10.0_atm": 20.0}
        }));
        let reading = aggregator.combined("atm", "").await.unwrap();

        assert_eq!(reading.combined.from, Some("pm25"));
        assert_eq!(reading.combined.aqi, Some(56));
        assert_eq!(reading.combined.category, Some("Moderate"));
        assert_eq!(reading.combined.percent, Some(11.2));
        assert_eq!(reading.subindices.pm10.aqi, Some(19));
        assert_eq!(reading.values.pm_avg, Some(17.25));
    }

    #[tokio::test]
    async fn test_combined_tie_goes_to_pm25() {
        // Both interpolate to AQI 56.
        let aggregator = aggregator_with(json!({
            "sensor": {"pm2.5_atm": 14.5, "pm10.0_atm": 65.1}
        }));
        let reading = aggregator.combined("atm", "").await.unwrap();

        assert_eq!(reading.subindices.pm25.aqi, Some(56));
        assert_eq!(reading.subindices.pm10.aqi, Some(56));
        assert_eq!(reading.combined.from, Some("pm25"));
    }

    #[tokio::test]
    async fn test_combined_partial_availability() {
        let aggregator = aggregator_with(json!({"sensor": {"pm10.0_atm": 60.0}}));
        let reading = aggregator.combined("atm", "").await.unwrap();

        assert_eq!(reading.combined.from, Some("pm10"));
        assert_eq!(reading.combined.aqi, Some(53));
        assert_eq!(reading.subindices.pm1.aqi, None);
        assert_eq!(reading.subindices.pm1.category, None);
        assert_eq!(reading.subindices.pm1.percent, None);
        assert_eq!(reading.subindices.pm25.aqi, None);
        assert_eq!(reading.values.pm_avg, Some(60.0));
    }

    #[tokio::test]
    async fn test_combined_nothing_available() {
        let aggregator = aggregator_with(json!({"sensor": {}}));
        let reading = aggregator.combined("atm", "").await.unwrap();

        assert_eq!(reading.combined.aqi, None);
        assert_eq!(reading.combined.percent, None);
        assert_eq!(reading.combined.category, None);
        assert_eq!(reading.combined.from, None);
        assert_eq!(reading.values.pm_avg, None);
    }

    #[tokio::test]
    async fn test_combined_pm1_is_tagged_approximation() {
        let aggregator = aggregator_with(json!({"sensor": {"pm1.0_atm": 8.0}}));
        let reading = aggregator.combined("atm", "").await.unwrap();

        // Scored on the PM2.5 table: 8.0 -> 33 "Good".
        assert_eq!(reading.subindices.pm1.aqi, Some(33));
        assert_eq!(reading.subindices.pm1.note, Some(PM1_NOTE));
        assert_eq!(reading.combined.from, Some("pm1"));
    }

    #[tokio::test]
    async fn test_combined_unreachable() {
        let aggregator = AqiAggregator::new(FixedReader(Snapshot::Unreachable {
            detail: "auth error: 403 Forbidden".to_string(),
        }));
        let err = aggregator.combined("atm", "").await.unwrap_err();

        assert_eq!(
            err.to_json(),
            json!({"error": "purpleair_unreachable", "detail": "auth error: 403 Forbidden"})
        );
    }

    #[test]
    fn test_safe_mean() {
        assert_eq!(safe_mean([Some(1.0), Some(2.0), Some(4.0)]), Some(2.33));
        assert_eq!(safe_mean([None, Some(3.0), None]), Some(3.0));
        assert_eq!(safe_mean([None, None, None]), None);
    }
}
