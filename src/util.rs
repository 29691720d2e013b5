use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

pub fn std_dev(data: &[f64]) -> Option<f64> {
    match (mean(data), data.len()) {
        (Some(data_mean), count) if count > 0 => {
            let variance = data
                .iter()
                .map(|value| {
                    let diff = data_mean - *value;

                    diff * diff
                })
                .sum::<f64>()
                / count as f64;

            Some(variance.sqrt())
        }
        _ => None,
    }
}

/// `part / whole`, or 0 when there is nothing to divide by
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Milliseconds to seconds rounded to one decimal
pub fn ms_to_seconds(ms: u64) -> f64 {
    (ms as f64 / 100.0).round() / 10.0
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Random, time-suffixed identifier such as `session_9f2c..._18b3...`
pub fn generate_id(prefix: &str) -> String {
    format!(
        "{}_{:x}_{:x}",
        prefix,
        rand::random::<u32>(),
        Utc::now().timestamp_millis()
    )
}

/// Epoch milliseconds as an RFC 3339 UTC string
pub fn iso_millis(epoch_ms: i64) -> String {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
