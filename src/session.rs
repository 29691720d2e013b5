use crate::analysis::Analysis;
use crate::level::Level;
use crate::script::{Script, StepId};
use crate::util::generate_id;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResponseType {
    Button,
    Fill,
    Free,
}

/// Why a session was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndReason {
    /// The script reached END or a dangling reference
    Ended,
    ManualReset,
    ScenarioChanged,
    LevelChanged,
    Abandoned,
}

/// One recorded learner response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub ts: i64,
    pub step_id: StepId,
    pub incoming: String,
    pub response_text: String,
    pub level_used: Level,
    pub response_type: ResponseType,
    pub option_index: Option<usize>,
    pub latency_ms: u64,
}

/// One timed run of a learner through a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub started_at: i64,
    #[serde(default)]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
    pub script_id: String,
    #[serde(default)]
    pub script_title: String,
    pub level_at_start: Level,
    #[serde(default)]
    pub attempts_invalid: u32,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
}

impl Session {
    pub fn new(script: &Script, level_at_start: Level, started_at: i64) -> Self {
        Self {
            session_id: generate_id("session"),
            started_at,
            ended_at: None,
            end_reason: None,
            script_id: script.id().to_string(),
            script_title: script.title().to_string(),
            level_at_start,
            attempts_invalid: 0,
            events: Vec::new(),
            analysis: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Nothing was answered or attempted
    pub fn is_untouched(&self) -> bool {
        self.events.is_empty() && self.attempts_invalid == 0
    }
}
