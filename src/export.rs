//! Flattening sessions into one row per response for CSV and JSON reports.

use crate::error::TrainerError;
use crate::level::Level;
use crate::script::StepId;
use crate::session::{ResponseType, Session};
use crate::util::{iso_millis, ms_to_seconds};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRow {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "startedAtISO")]
    pub started_at_iso: String,
    /// Empty while the session is still open
    #[serde(rename = "endedAtISO")]
    pub ended_at_iso: String,
    #[serde(rename = "scriptId")]
    pub script_id: String,
    #[serde(rename = "scriptTitle")]
    pub script_title: String,
    #[serde(rename = "levelAtStart")]
    pub level_at_start: Level,
    #[serde(rename = "stepId")]
    pub step_id: StepId,
    #[serde(rename = "levelUsed")]
    pub level_used: Level,
    #[serde(rename = "responseType")]
    pub response_type: ResponseType,
    #[serde(rename = "optionIndex")]
    pub option_index: Option<usize>,
    #[serde(rename = "latencySeconds")]
    pub latency_seconds: f64,
    pub incoming: String,
    #[serde(rename = "responseText")]
    pub response_text: String,
    #[serde(rename = "tsISO")]
    pub ts_iso: String,
}

pub fn rows(session: &Session) -> Vec<ResponseRow> {
    let started_at_iso = iso_millis(session.started_at);
    let ended_at_iso = session.ended_at.map(iso_millis).unwrap_or_default();

    session
        .events
        .iter()
        .map(|e| ResponseRow {
            session_id: session.session_id.clone(),
            started_at_iso: started_at_iso.clone(),
            ended_at_iso: ended_at_iso.clone(),
            script_id: session.script_id.clone(),
            script_title: session.script_title.clone(),
            level_at_start: session.level_at_start,
            step_id: e.step_id,
            level_used: e.level_used,
            response_type: e.response_type,
            option_index: e.option_index,
            latency_seconds: ms_to_seconds(e.latency_ms),
            incoming: e.incoming.clone(),
            response_text: e.response_text.clone(),
            ts_iso: iso_millis(e.ts),
        })
        .collect()
}

/// CSV with a header row. Fails with [`TrainerError::NothingToExport`] when
/// the sessions hold no responses at all.
pub fn to_csv<'a, I>(sessions: I) -> Result<String, TrainerError>
where
    I: IntoIterator<Item = &'a Session>,
{
    let all: Vec<ResponseRow> = sessions.into_iter().flat_map(rows).collect();
    if all.is_empty() {
        return Err(TrainerError::NothingToExport);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in &all {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The full session record, analysis included, as pretty JSON
pub fn session_json(session: &Session) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(session)
}
