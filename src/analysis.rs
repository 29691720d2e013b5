//! Session events to clinical metrics.
//!
//! [`ClinicalAnalyzer::analyze`] is a pure read of a session: it can run on a
//! finalized session or on the live one to show progress.

use crate::level::Level;
use crate::markers::{KeywordMarkerDetector, Marker, MarkerDetector, SocialMarkers};
use crate::recommend::{LevelRecommender, Recommendation, RecommendationInput};
use crate::session::{Event, ResponseType, Session};
use crate::util::{mean, ratio, std_dev, word_count};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByType {
    pub button: usize,
    pub fill: usize,
    pub free: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerTotals {
    pub ask_back: usize,
    pub gratitude: usize,
    pub help: usize,
    pub justify: usize,
    pub greeting: usize,
    pub assertive_request: usize,
}

impl MarkerTotals {
    fn add(&mut self, markers: &SocialMarkers) {
        for marker in Marker::ALL {
            if markers.get(marker) {
                *self.slot(marker) += 1;
            }
        }
    }

    fn slot(&mut self, marker: Marker) -> &mut usize {
        match marker {
            Marker::AskBack => &mut self.ask_back,
            Marker::Gratitude => &mut self.gratitude,
            Marker::Help => &mut self.help,
            Marker::Justify => &mut self.justify,
            Marker::Greeting => &mut self.greeting,
            Marker::AssertiveRequest => &mut self.assertive_request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub total_responses: usize,
    pub avg_latency_ms: u64,
    #[serde(default)]
    pub latency_sd_ms: u64,
    pub invalid_attempts: u32,
    pub by_type: ByType,
    pub rigidity_ratio: f64,
    pub variation_ratio: f64,
    pub fill_quality: Option<f64>,
    pub free_quality: Option<f64>,
    pub free_markers_ratio: Option<f64>,
    pub marker_totals: MarkerTotals,
    pub valid_ratio: f64,
    pub rec: Recommendation,
    pub observations: Vec<String>,
}

/// Trigger points for the free-text observations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationThresholds {
    /// Mean latency strictly above this is flagged
    pub high_latency_ms: u64,
    pub many_invalid: u32,
    pub rigidity: f64,
    pub rigidity_min_buttons: usize,
    pub variation: f64,
    pub variation_min_responses: usize,
    pub ask_back_min: usize,
}

impl Default for ObservationThresholds {
    fn default() -> Self {
        Self {
            high_latency_ms: 12_000,
            many_invalid: 3,
            rigidity: 0.7,
            rigidity_min_buttons: 6,
            variation: 0.6,
            variation_min_responses: 6,
            ask_back_min: 2,
        }
    }
}

#[derive(Clone)]
pub struct ClinicalAnalyzer {
    detector: Arc<dyn MarkerDetector>,
    observations: ObservationThresholds,
    recommender: LevelRecommender,
}

impl Default for ClinicalAnalyzer {
    fn default() -> Self {
        Self::new(
            Arc::new(KeywordMarkerDetector::default()),
            ObservationThresholds::default(),
            LevelRecommender::default(),
        )
    }
}

impl std::fmt::Debug for ClinicalAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicalAnalyzer")
            .field("observations", &self.observations)
            .field("recommender", &self.recommender)
            .finish_non_exhaustive()
    }
}

impl ClinicalAnalyzer {
    pub fn new(
        detector: Arc<dyn MarkerDetector>,
        observations: ObservationThresholds,
        recommender: LevelRecommender,
    ) -> Self {
        Self {
            detector,
            observations,
            recommender,
        }
    }

    pub fn analyze(&self, session: &Session) -> Analysis {
        let events = &session.events;
        let invalid = session.attempts_invalid;
        let total_responses = events.len();

        let latencies: Vec<f64> = events.iter().map(|e| e.latency_ms as f64).collect();
        let avg_latency_ms = mean(&latencies).unwrap_or(0.0).round() as u64;
        let latency_sd_ms = std_dev(&latencies).unwrap_or(0.0).round() as u64;

        let by_type = ByType {
            button: count_type(events, ResponseType::Button),
            fill: count_type(events, ResponseType::Fill),
            free: count_type(events, ResponseType::Free),
        };

        let rigidity_ratio = rigidity(events, by_type.button);
        let variation_ratio = variation(events);

        let fill_functional = events
            .iter()
            .filter(|e| e.response_type == ResponseType::Fill)
            .filter(|e| {
                let text = e.response_text.trim();
                text.chars().count() >= 6 || word_count(text) >= 2
            })
            .count();
        let fill_quality = (by_type.fill > 0).then(|| ratio(fill_functional, by_type.fill));

        let mut marker_totals = MarkerTotals::default();
        let mut free_functional = 0;
        let mut free_with_markers = 0;
        for event in events.iter().filter(|e| e.response_type == ResponseType::Free) {
            let markers = self.detector.detect(&event.response_text);
            marker_totals.add(&markers);
            if word_count(&event.response_text) >= 3 {
                free_functional += 1;
            }
            if markers.any() {
                free_with_markers += 1;
            }
        }
        let free_quality = (by_type.free > 0).then(|| ratio(free_functional, by_type.free));
        let free_markers_ratio =
            (by_type.free > 0).then(|| ratio(free_with_markers, by_type.free));

        let valid_ratio = ratio(total_responses, total_responses + invalid as usize);

        let rec = self.recommender.recommend(&RecommendationInput {
            level_at_start: session.level_at_start,
            avg_latency_ms,
            invalid_attempts: invalid,
            valid_ratio,
            rigidity_ratio,
            variation_ratio,
            fill_quality,
            free_quality,
            free_markers_ratio,
            total_responses,
        });

        let mut analysis = Analysis {
            total_responses,
            avg_latency_ms,
            latency_sd_ms,
            invalid_attempts: invalid,
            by_type,
            rigidity_ratio,
            variation_ratio,
            fill_quality,
            free_quality,
            free_markers_ratio,
            marker_totals,
            valid_ratio,
            rec,
            observations: Vec::new(),
        };
        analysis.observations = self.observe(&analysis);
        analysis
    }

    fn observe(&self, a: &Analysis) -> Vec<String> {
        let th = &self.observations;
        let mut notes = Vec::new();
        let mut note = |cond: bool, text: &str| {
            if cond {
                notes.push(text.to_string());
            }
        };

        note(
            a.total_responses == 0,
            "No responses recorded in this session (possible avoidance, engagement difficulty or interrupted use).",
        );
        note(
            a.avg_latency_ms > th.high_latency_ms,
            "High mean latency (possible anxiety, blocking, difficulty initiating or higher cognitive demand).",
        );
        note(
            a.invalid_attempts >= th.many_invalid,
            "Increased invalid attempts (may indicate frustration, avoidance or a need for more support/prompting).",
        );
        note(
            a.rigidity_ratio >= th.rigidity && a.by_type.button >= th.rigidity_min_buttons,
            "Rigidity pattern: frequent repetition of the same option (preference for predictability / restricted repertoire).",
        );
        note(
            a.variation_ratio >= th.variation && a.total_responses >= th.variation_min_responses,
            "Good response variation (greater flexibility and a broader repertoire).",
        );
        note(
            a.marker_totals.ask_back >= th.ask_back_min,
            "Social reciprocity present (asking back), indicating developing conversational reciprocity.",
        );
        note(
            a.marker_totals.gratitude >= 1,
            "Use of gratitude / social politeness observed.",
        );
        note(
            a.marker_totals.help >= 1,
            "Functional help request observed (assertiveness / requesting).",
        );
        note(
            a.marker_totals.justify >= 1,
            "Justification or time negotiation present (pragmatic skill and flexibility).",
        );

        notes
    }
}

impl Analysis {
    /// Recommendation shorthand for the summary line, e.g. `advance → 2`
    pub fn headline(&self) -> String {
        format!("{} → {}", self.rec.action, self.rec.to_level)
    }

    pub fn level_after(&self) -> Level {
        self.rec.to_level
    }
}

fn count_type(events: &[Event], kind: ResponseType) -> usize {
    events.iter().filter(|e| e.response_type == kind).count()
}

/// Largest share of button responses landing on the same (step, option)
fn rigidity(events: &[Event], button_total: usize) -> f64 {
    let largest = events
        .iter()
        .filter(|e| e.response_type == ResponseType::Button)
        .counts_by(|e| (e.step_id, e.option_index))
        .into_values()
        .max()
        .unwrap_or(0);
    ratio(largest, button_total)
}

/// Distinct trimmed, case-folded, non-empty texts over all responses
fn variation(events: &[Event]) -> f64 {
    let distinct: HashSet<String> = events
        .iter()
        .map(|e| e.response_text.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    ratio(distinct.len(), events.len())
}
