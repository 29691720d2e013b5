use thiserror::Error;

/// Rejected editor text for a step's `next` field
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NextFieldError {
    #[error("next must be END, a step id, or a JSON object of option index to step id: {0}")]
    Unrecognized(String),

    #[error("branch target for option {key} must be a non-negative integer step id")]
    InvalidBranchTarget { key: String },
}

/// Errors while importing a scenario collection. The current collection is
/// left untouched whenever one of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("import must be a JSON array of scenarios, got {0}")]
    NotAnArray(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("locked mode is on: scenario and level cannot be changed")]
    Locked,

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("unknown step {step_id} in scenario {scenario_id}")]
    UnknownStep { scenario_id: String, step_id: i64 },

    #[error("cannot delete the only scenario")]
    LastScenario,

    #[error("cannot delete the only step of a scenario")]
    LastStep,

    #[error("scenario {0} has no step id left after its highest one")]
    StepIdExhausted(String),

    #[error("there are no responses to export")]
    NothingToExport,

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error(transparent)]
    NextField(#[from] NextFieldError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
