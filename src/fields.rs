//! Upstream field naming and payload extraction.
//!
//! PurpleAir exposes each particulate reading under a composed field name:
//! base (`pm2.5`), calibration variant (`atm` outdoor, `cf_1` indoor), and
//! an optional channel suffix (`_a`/`_b` for the raw halves, none for the
//! average).

use serde_json::Value;

const VARIANTS: [&str; 2] = ["atm", "cf_1"];
const CHANNELS: [&str; 3] = ["", "_a", "_b"];

/// Fields a caller may request through the raw sensor-data path.
const ALLOWED_FIELDS: [&str; 13] = [
    "pm2.5",
    "pm2_5",
    "pm10.0",
    "pm10_0",
    "pm1.0",
    "pm1_0",
    "humidity",
    "temperature",
    "pressure",
    "voc",
    "ozone1",
    "ozone2",
    "aqi",
];

/// Builds an upstream field name from base, variant, and channel suffix.
///
/// Unknown variants normalize to `atm`, unknown channels to the averaged
/// reading. Bad input never errors.
pub fn build_field(base: &str, variant: &str, channel: &str) -> String {
    let variant = if VARIANTS.contains(&variant) {
        variant
    } else {
        "atm"
    };
    let channel = if CHANNELS.contains(&channel) {
        channel
    } else {
        ""
    };
    format!("{base}_{variant}{channel}")
}

/// Filters a comma-separated field request down to the whitelist.
///
/// Returns `None` when nothing survives; callers treat that as "all
/// fields".
pub fn sanitize_fields(raw: Option<&str>) -> Option<String> {
    let kept: Vec<&str> = raw?
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty() && ALLOWED_FIELDS.contains(f))
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(","))
    }
}

/// Pulls `field` out of a sensor payload as a float.
///
/// Two upstream shapes are accepted:
/// 1. object-keyed: `{"sensor": {"<field>": <value>, ...}}`
/// 2. parallel arrays: `{"fields": [...], "data": [[...]]}` where the value
///    sits at the field's position in the first data row
///
/// Absence (unknown field, null, unparseable value) is an ordinary `None`,
/// not an error; the caller decides what it means.
pub fn extract_field_value(payload: &Value, field: &str) -> Option<f64> {
    if let Some(sensor) = payload.get("sensor").and_then(Value::as_object)
        && let Some(value) = sensor.get(field)
    {
        return as_f64(value);
    }

    let fields = payload.get("fields").and_then(Value::as_array)?;
    let first_row = payload.get("data").and_then(Value::as_array)?.first()?;
    let idx = fields.iter().position(|f| f.as_str() == Some(field))?;
    as_f64(first_row.get(idx)?)
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
