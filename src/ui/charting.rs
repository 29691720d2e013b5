/// Compute X (response number) and Y (seconds) bounds for the latency chart
pub fn compute_chart_params(latency_coords: &[(f64, f64)]) -> (f64, f64) {
    let highest_latency = latency_coords
        .iter()
        .map(|&(_, seconds)| seconds)
        .fold(0.0, f64::max);

    let responses = latency_coords.last().map_or(1.0, |&(n, _)| n).max(1.0);

    (responses, highest_latency.ceil().max(1.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}

/// Two-decimal ratio, or a dash when the session had no data for it
pub fn format_ratio(val: Option<f64>) -> String {
    val.map_or_else(|| "—".to_string(), |v| format!("{v:.2}"))
}
