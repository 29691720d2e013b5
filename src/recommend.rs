//! Objective advance / hold / regress decision for the next session's level.

use crate::level::Level;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Advance,
    Hold,
    Regress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: Action,
    pub to_level: Level,
    pub reason: String,
}

impl Recommendation {
    fn new(action: Action, to_level: Level, reason: &str) -> Self {
        Self {
            action,
            to_level,
            reason: reason.to_string(),
        }
    }
}

/// Metrics the decision table reads. `None` quality values mean the session
/// produced no events of that type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationInput {
    pub level_at_start: Level,
    pub avg_latency_ms: u64,
    pub invalid_attempts: u32,
    pub valid_ratio: f64,
    pub rigidity_ratio: f64,
    pub variation_ratio: f64,
    pub fill_quality: Option<f64>,
    pub free_quality: Option<f64>,
    pub free_markers_ratio: Option<f64>,
    pub total_responses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderThresholds {
    pub good_latency_ms: u64,
    pub max_low_invalid: u32,
    pub min_valid_ratio: f64,
    /// Rigidity must stay strictly below this
    pub max_rigidity: f64,
    pub min_variation: f64,
    pub min_fill_quality: f64,
    pub min_free_quality: f64,
    pub min_free_markers: f64,
    pub regress_invalid: u32,
    pub regress_latency_ms: u64,
}

impl Default for RecommenderThresholds {
    fn default() -> Self {
        Self {
            good_latency_ms: 10_000,
            max_low_invalid: 1,
            min_valid_ratio: 0.8,
            max_rigidity: 0.7,
            min_variation: 0.45,
            min_fill_quality: 0.75,
            min_free_quality: 0.70,
            min_free_markers: 0.40,
            regress_invalid: 4,
            regress_latency_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelRecommender {
    thresholds: RecommenderThresholds,
}

impl LevelRecommender {
    pub fn new(thresholds: RecommenderThresholds) -> Self {
        Self { thresholds }
    }

    pub fn recommend(&self, m: &RecommendationInput) -> Recommendation {
        let th = &self.thresholds;
        let level = m.level_at_start;

        let good_latency = m.avg_latency_ms <= th.good_latency_ms;
        let low_invalid = m.invalid_attempts <= th.max_low_invalid;
        let ok_valid = m.valid_ratio >= th.min_valid_ratio;
        let low_rigidity = m.rigidity_ratio < th.max_rigidity;
        let ok_variation = m.variation_ratio >= th.min_variation;
        // missing data never fails a quality gate
        let fill_ok = m.fill_quality.map_or(true, |q| q >= th.min_fill_quality);
        let free_ok = m.free_quality.map_or(true, |q| q >= th.min_free_quality);
        let free_markers_ok = m
            .free_markers_ratio
            .map_or(true, |q| q >= th.min_free_markers);

        if !(ok_valid && low_invalid && good_latency) {
            if m.invalid_attempts >= th.regress_invalid || m.avg_latency_ms >= th.regress_latency_ms
            {
                return Recommendation::new(
                    Action::Regress,
                    level.lower(),
                    "High demand: many invalid attempts and/or high response latency.",
                );
            }
            return Recommendation::new(
                Action::Hold,
                level,
                "Engagement and fluency still need to stabilize at the current level.",
            );
        }

        match level.get() {
            1 => Recommendation::new(
                Action::Advance,
                Level::TWO,
                "Stable with full support: good response rate, few failures and adequate latency.",
            ),
            2 if low_rigidity && ok_variation => Recommendation::new(
                Action::Advance,
                Level::THREE,
                "Good flexibility and variation; ready to start guided production (completing sentences).",
            ),
            2 => Recommendation::new(
                Action::Hold,
                Level::TWO,
                "Stable, but rigidity or low variation remain; broaden the repertoire before level 3.",
            ),
            3 if fill_ok && low_invalid && good_latency => Recommendation::new(
                Action::Advance,
                Level::FOUR,
                "Functional guided production with good quality; ready to start free typing with hints.",
            ),
            3 => Recommendation::new(
                Action::Hold,
                Level::THREE,
                "Consolidate sentence completion (quality and consistency) before free text.",
            ),
            _ if free_ok && free_markers_ok => Recommendation::new(
                Action::Hold,
                Level::FOUR,
                "Functional free text; focus shifts to generalization and varying social markers.",
            ),
            _ => Recommendation::new(
                Action::Hold,
                Level::FOUR,
                "In free text, add structure (chips and hints) and reinforce social markers: asking back, gratitude, requests, justification.",
            ),
        }
    }
}
