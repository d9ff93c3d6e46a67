//! US EPA breakpoint tables for PM2.5 and PM10.
//!
//! Rows are ordered ascending, non-overlapping, and constructed with
//! `conc_high > conc_low`; the converter relies on that, it is not
//! re-checked at runtime.

/// One breakpoint row: a concentration range mapped linearly onto an AQI
/// index range, with the EPA category label for that range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointRow {
    pub conc_low: f64,
    pub conc_high: f64,
    pub index_low: u16,
    pub index_high: u16,
    pub category: &'static str,
}

const fn row(
    conc_low: f64,
    conc_high: f64,
    index_low: u16,
    index_high: u16,
    category: &'static str,
) -> BreakpointRow {
    BreakpointRow {
        conc_low,
        conc_high,
        index_low,
        index_high,
        category,
    }
}

/// PM2.5 (µg/m³, 24-hour) breakpoints.
pub static PM25_BREAKPOINTS: [BreakpointRow; 7] = [
    row(0.0, 12.0, 0, 50, "Good"),
    row(12.1, 35.4, 51, 100, "Moderate"),
    row(35.5, 55.4, 101, 150, "Unhealthy for Sensitive Groups"),
    row(55.5, 150.4, 151, 200, "Unhealthy"),
    row(150.5, 250.4, 201, 300, "Very Unhealthy"),
    row(250.5, 350.4, 301, 400, "Hazardous"),
    row(350.5, 500.4, 401, 500, "Hazardous"),
];

/// PM10 (µg/m³, 24-hour) breakpoints.
pub static PM10_BREAKPOINTS: [BreakpointRow; 7] = [
    row(0.0, 54.0, 0, 50, "Good"),
    row(55.0, 154.0, 51, 100, "Moderate"),
    row(155.0, 254.0, 101, 150, "Unhealthy for Sensitive Groups"),
    row(255.0, 354.0, 151, 200, "Unhealthy"),
    row(355.0, 424.0, 201, 300, "Very Unhealthy"),
    row(425.0, 504.0, 301, 400, "Hazardous"),
    row(505.0, 604.0, 401, 500, "Hazardous"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(table: &[BreakpointRow]) {
        for (i, row) in table.iter().enumerate() {
            assert!(
                row.conc_low < row.conc_high,
                "row {i}: concentration range must be non-empty"
            );
            assert!(
                row.index_low <= row.index_high,
                "row {i}: index range must be ordered"
            );
            if i > 0 {
                let prev = &table[i - 1];
                assert!(
                    row.conc_low > prev.conc_high,
                    "row {i}: concentration ranges must ascend without overlap"
                );
                assert_eq!(
                    row.index_low,
                    prev.index_high + 1,
                    "row {i}: index ranges must be contiguous"
                );
            }
        }
        assert_eq!(table.first().unwrap().index_low, 0);
        assert_eq!(table.last().unwrap().index_high, 500);
    }

    #[test]
    fn test_pm25_table_well_formed() {
        assert_well_formed(&PM25_BREAKPOINTS);
    }

    #[test]
    fn test_pm10_table_well_formed() {
        assert_well_formed(&PM10_BREAKPOINTS);
    }
}
