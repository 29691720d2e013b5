//! Scenario scripts and their normalization into a well-formed step graph.
//!
//! Everything that enters the engine goes through [`normalize`]: persisted
//! collections, imports and freshly created scenarios alike. Normalization is
//! total; malformed input is repaired field by field instead of rejected.

use crate::error::NextFieldError;
use crate::util::generate_id;
use include_dir::{include_dir, Dir};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static SCENARIO_DIR: Dir = include_dir!("src/scenarios");

pub type StepId = i64;

/// Placeholder replaced by the learner's text in level 3 templates
pub const BLANK: &str = "{blank}";

const END_MARKER: &str = "END";
const MAX_L2_OPTIONS: usize = 4;
const MAX_CHIPS: usize = 8;

const DEFAULT_TITLE: &str = "Novo cenário";
const DEFAULT_TEMPLATE: &str = "Eu estou {blank}.";
const DEFAULT_PLACEHOLDER: &str = "complete aqui";
const DEFAULT_OTHER_OPTION: &str = "Ok.";
const DEFAULT_HINT: &str = "Dica: escreva uma resposta curta.";

/// Where a step leads once answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Terminal,
    Unconditional(StepId),
    /// Stringified option index to step id
    Branch(BTreeMap<String, StepId>),
}

impl Next {
    /// Interprets a raw JSON `next` value. Anything unrecognised is terminal.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s.trim().eq_ignore_ascii_case(END_MARKER) => Next::Terminal,
            Value::Number(_) => step_id_of(value).map_or(Next::Terminal, Next::Unconditional),
            Value::Object(map) => Next::Branch(
                map.iter()
                    .filter_map(|(k, v)| step_id_of(v).map(|id| (k.clone(), id)))
                    .collect(),
            ),
            _ => Next::Terminal,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Next::Terminal => Value::String(END_MARKER.to_string()),
            Next::Unconditional(id) => Value::from(*id),
            Next::Branch(map) => Value::Object(
                map.iter()
                    .map(|(k, id)| (k.clone(), Value::from(*id)))
                    .collect(),
            ),
        }
    }

    /// Parses the editor's textual encoding: `END`, a decimal step id, or a
    /// JSON object mapping option indices to step ids. Blank text means END.
    pub fn parse_field(text: &str) -> Result<Self, NextFieldError> {
        let t = text.trim();
        if t.is_empty() || t.eq_ignore_ascii_case(END_MARKER) {
            return Ok(Next::Terminal);
        }

        if t.chars().all(|c| c.is_ascii_digit()) {
            return t
                .parse::<StepId>()
                .map(Next::Unconditional)
                .map_err(|_| NextFieldError::Unrecognized(t.to_string()));
        }

        match serde_json::from_str::<Value>(t) {
            Ok(Value::Object(map)) => {
                let mut branches = BTreeMap::new();
                for (key, value) in map {
                    match step_id_of(&value) {
                        Some(id) if id >= 0 => {
                            branches.insert(key, id);
                        }
                        _ => return Err(NextFieldError::InvalidBranchTarget { key }),
                    }
                }
                Ok(Next::Branch(branches))
            }
            _ => Err(NextFieldError::Unrecognized(t.to_string())),
        }
    }

    pub fn format_field(&self) -> String {
        match self {
            Next::Terminal => END_MARKER.to_string(),
            Next::Unconditional(id) => id.to_string(),
            Next::Branch(_) => {
                serde_json::to_string_pretty(&self.to_value()).unwrap_or_else(|_| "{}".into())
            }
        }
    }
}

impl Serialize for Next {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillIn {
    pub template: String,
    pub placeholder: String,
    pub other_option: String,
}

impl FillIn {
    /// Substitutes the first `{blank}` with the learner's text
    pub fn fill(&self, blank: &str) -> String {
        self.template.replacen(BLANK, blank, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreeText {
    pub hint: String,
    pub chips: Vec<String>,
}

/// One conversational turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub id: StepId,
    pub incoming: String,
    #[serde(rename = "optionsL1")]
    pub options_l1: Vec<String>,
    #[serde(rename = "optionsL2")]
    pub options_l2: Vec<String>,
    pub level3: FillIn,
    pub level4: FreeText,
    pub next: Next,
}

/// A normalized scenario. Steps are non-empty with strictly ascending ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) steps: Vec<Step>,
}

impl Script {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|idx| &self.steps[idx])
    }

    pub fn first_step(&self) -> &Step {
        // normalize never yields an empty step list
        &self.steps[0]
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Repairs an arbitrary JSON value into a [`Script`]
pub fn normalize(raw: &Value) -> Script {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let id = obj
        .get("id")
        .and_then(coerce_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| generate_id("script"));
    let title = obj
        .get("title")
        .and_then(coerce_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut steps: Vec<Step> = obj
        .get("steps")
        .and_then(Value::as_array)
        .map(|raw_steps| {
            raw_steps
                .iter()
                .enumerate()
                .map(|(position, raw_step)| repair_step(position, raw_step))
                .collect()
        })
        .unwrap_or_default();

    steps.sort_by_key(|s| s.id);
    let before = steps.len();
    steps.dedup_by_key(|s| s.id);
    if steps.len() != before {
        tracing::warn!(script = %id, dropped = before - steps.len(), "dropped steps with duplicate ids");
    }

    if steps.is_empty() {
        steps.push(fallback_step());
    }

    Script { id, title, steps }
}

pub fn normalize_all(raw: &[Value]) -> Vec<Script> {
    raw.iter().map(normalize).collect()
}

/// The built-in scenario collection shipped with the binary
pub fn default_scripts() -> Vec<Script> {
    let parsed = SCENARIO_DIR
        .get_file("default.json")
        .and_then(|f| f.contents_utf8())
        .and_then(|s| serde_json::from_str::<Value>(s).ok());

    match parsed {
        Some(Value::Array(items)) if !items.is_empty() => normalize_all(&items),
        _ => {
            tracing::warn!("built-in scenarios unavailable, using the minimal fallback");
            vec![normalize(&Value::Null)]
        }
    }
}

/// Minimal greeting used whenever a script would otherwise have no steps
pub fn fallback_step() -> Step {
    Step {
        id: 1,
        incoming: "Oi".into(),
        options_l1: vec!["Oi".into(), "Olá".into()],
        options_l2: vec!["Oi".into(), "Olá".into(), "Oiê".into()],
        level3: FillIn {
            template: "Oi, {blank}!".into(),
            placeholder: "nome".into(),
            other_option: "Olá! 🙂".into(),
        },
        level4: FreeText {
            hint: "Dica: cumprimente.".into(),
            chips: vec!["Oi!".into(), "Olá 🙂".into()],
        },
        next: Next::Terminal,
    }
}

fn repair_step(position: usize, raw: &Value) -> Step {
    let empty = Map::new();
    let obj = raw.as_object().unwrap_or(&empty);
    let level3 = obj.get("level3").and_then(Value::as_object).unwrap_or(&empty);
    let level4 = obj.get("level4").and_then(Value::as_object).unwrap_or(&empty);

    let mut options_l1 = text_list(obj.get("optionsL1")).unwrap_or_default();
    options_l1.resize(2, String::new());

    let mut options_l2 =
        text_list(obj.get("optionsL2")).unwrap_or_else(|| vec![String::new(); 3]);
    options_l2.truncate(MAX_L2_OPTIONS);

    let mut chips = text_list(level4.get("chips")).unwrap_or_default();
    chips.truncate(MAX_CHIPS);

    Step {
        id: obj
            .get("id")
            .and_then(step_id_of)
            .unwrap_or(position as StepId + 1),
        incoming: obj.get("incoming").and_then(coerce_text).unwrap_or_default(),
        options_l1,
        options_l2,
        level3: FillIn {
            template: text_or(level3.get("template"), DEFAULT_TEMPLATE),
            placeholder: text_or(level3.get("placeholder"), DEFAULT_PLACEHOLDER),
            other_option: text_or(level3.get("otherOption"), DEFAULT_OTHER_OPTION),
        },
        level4: FreeText {
            hint: text_or(level4.get("hint"), DEFAULT_HINT),
            chips,
        },
        next: match obj.get("next") {
            None | Some(Value::Null) => Next::Terminal,
            Some(v) => Next::from_value(v),
        },
    }
}

fn step_id_of(value: &Value) -> Option<StepId> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as StepId)
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(coerce_text)
        .unwrap_or_else(|| default.to_string())
}

fn text_list(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .map(|v| coerce_text(v).unwrap_or_default())
            .collect()
    })
}
