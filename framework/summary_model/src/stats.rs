//! Summary statistics over scraped stress metrics.
//!
//! Values are rendered with their unit so they can go straight into the report, and anything
//! that cannot be computed from the available inputs renders as `"N/A"`.

const NOT_AVAILABLE: &str = "N/A";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sum of all values, e.g. the combined op rate across concurrent runs.
pub fn sum(values: &[f64], unit: &str) -> String {
    if values.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    format!("{} {unit}", round2(values.iter().sum()))
}

/// Arithmetic mean of the values.
pub fn average(values: &[f64], unit: &str) -> String {
    if values.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    format!("{} {unit}", round2(values.iter().sum::<f64>() / values.len() as f64))
}

/// Population standard deviation. Needs at least two values to be meaningful.
pub fn std_deviation(values: &[f64], unit: &str) -> String {
    if values.len() < 2 {
        return NOT_AVAILABLE.to_string();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let squared_diff: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    format!("{} {unit}", round2((squared_diff / values.len() as f64).sqrt()))
}
