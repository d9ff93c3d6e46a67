//! Output formatting and persistence for AQI readings.
//!
//! Supports pretty-printed JSON on stdout and CSV append for streamed
//! samples.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::debug;

use crate::aggregate::CombinedReading;

/// One flattened streaming sample, CSV-friendly.
#[derive(Debug, Serialize)]
pub struct AqiSample {
    pub timestamp: DateTime<Utc>,
    pub pm1: Option<f64>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub pm_avg: Option<f64>,
    pub aqi: Option<u16>,
    pub aqi_percent: Option<f64>,
    pub category: Option<&'static str>,
    pub from: Option<&'static str>,
}

impl AqiSample {
    pub fn from_reading(reading: &CombinedReading) -> Self {
        Self {
            timestamp: Utc::now(),
            pm1: reading.values.pm1,
            pm25: reading.values.pm25,
            pm10: reading.values.pm10,
            pm_avg: reading.values.pm_avg,
            aqi: reading.combined.aqi,
            aqi_percent: reading.combined.percent,
            category: reading.combined.category,
            from: reading.combined.from,
        }
    }
}

/// Prints a serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends an [`AqiSample`] row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, sample: &AqiSample) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(sample)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn sample() -> AqiSample {
        AqiSample {
            timestamp: Utc::now(),
            pm1: Some(8.0),
            pm25: Some(14.5),
            pm10: None,
            pm_avg: Some(11.25),
            aqi: Some(56),
            aqi_percent: Some(11.2),
            category: Some("Moderate"),
            from: Some("pm25"),
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample()).unwrap();
    }

    #[test]
    fn test_append_record_creates_file() {
        let path = temp_path("purpleair_aqi_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        append_record(&path, &sample()).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.is_empty());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("purpleair_aqi_test_header.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &sample()).unwrap();
        append_record(&path, &sample()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_two_rows() {
        let path = temp_path("purpleair_aqi_test_rows.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &sample()).unwrap();
        append_record(&path, &sample()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // 1 header + 2 data rows = 3 lines (last may be empty due to trailing newline)
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        fs::remove_file(&path).unwrap();
    }
}
