//! Concentration → AQI conversion.

use super::breakpoints::BreakpointRow;

/// Converts a concentration to `(aqi, category)` using the given
/// breakpoint table.
///
/// Scans rows in order and linearly interpolates within the first bracket
/// containing the value (inclusive on both ends), rounding to the nearest
/// integer index. A value no row covers (negative, or above the table's
/// ceiling) clamps to `(500, <last category>)`.
pub fn concentration_to_aqi(concentration: f64, table: &[BreakpointRow]) -> (u16, &'static str) {
    for row in table {
        if row.conc_low <= concentration && concentration <= row.conc_high {
            let aqi = f64::from(row.index_high - row.index_low)
                / (row.conc_high - row.conc_low)
                * (concentration - row.conc_low)
                + f64::from(row.index_low);
            return (aqi.round() as u16, row.category);
        }
    }

    (500, table.last().map_or("Hazardous", |r| r.category))
}

/// Percent of the 0–500 AQI scale, clamped to [0, 100] and rounded to two
/// decimal places.
pub fn aqi_percent(aqi: u16) -> f64 {
    let pct = (f64::from(aqi) / 500.0 * 100.0).clamp(0.0, 100.0);
    (pct * 100.0).round() / 100.0
}
