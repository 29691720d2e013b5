use crate::session::Session;
use crate::util::ms_to_seconds;

/// One response's latency, for the summary chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyPoint {
    /// 1-based response number
    pub n: f64,
    pub seconds: f64,
}

impl LatencyPoint {
    pub fn new(n: f64, seconds: f64) -> Self {
        Self { n, seconds }
    }
}

impl From<LatencyPoint> for (f64, f64) {
    fn from(p: LatencyPoint) -> Self {
        (p.n, p.seconds)
    }
}

pub fn latency_series(session: &Session) -> Vec<LatencyPoint> {
    session
        .events
        .iter()
        .enumerate()
        .map(|(i, e)| LatencyPoint::new((i + 1) as f64, ms_to_seconds(e.latency_ms)))
        .collect()
}
