//! The learner's scenario collection and its editing operations.
//!
//! Every edit re-normalizes the whole collection, and the collection never
//! becomes empty: an empty result falls back to the built-in scenarios.

use crate::error::{json_kind, ImportError, TrainerError};
use crate::script::{default_scripts, normalize, normalize_all, Next, Script, Step, StepId};
use crate::util::generate_id;
use serde_json::{json, Value};

/// Editable text fields of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StepField {
    Incoming,
    OptionsL1,
    OptionsL2,
    Template,
    Placeholder,
    OtherOption,
    Hint,
    Chips,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioLibrary {
    scripts: Vec<Script>,
}

impl Default for ScenarioLibrary {
    fn default() -> Self {
        Self {
            scripts: default_scripts(),
        }
    }
}

impl ScenarioLibrary {
    pub fn new(scripts: Vec<Script>) -> Self {
        if scripts.is_empty() {
            return Self::default();
        }
        Self { scripts }
    }

    /// Loads a persisted collection, repairing what it can
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) if !items.is_empty() => Self::new(normalize_all(items)),
            Value::Null => Self::default(),
            other => {
                tracing::warn!(
                    found = json_kind(other),
                    "stored scenarios unusable, restoring built-in scenarios"
                );
                Self::default()
            }
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.scripts.iter().map(Script::to_value).collect())
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| s.id() == id)
    }

    pub fn first(&self) -> &Script {
        &self.scripts[0]
    }

    /// Replaces the collection with a JSON array of raw scenarios. On error
    /// the collection is unchanged.
    pub fn import_json(&mut self, text: &str) -> Result<usize, ImportError> {
        let value: Value = serde_json::from_str(text)?;
        self.import_value(&value)
    }

    pub fn import_value(&mut self, value: &Value) -> Result<usize, ImportError> {
        let Value::Array(items) = value else {
            let err = ImportError::NotAnArray(json_kind(value));
            tracing::warn!(%err, "import rejected");
            return Err(err);
        };

        *self = Self::new(normalize_all(items));
        tracing::info!(scenarios = self.scripts.len(), "scenarios imported");
        Ok(self.scripts.len())
    }

    /// Pretty JSON in the import format
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.scripts)
    }

    /// Appends a one-step template scenario and returns its id
    pub fn add_scenario(&mut self) -> String {
        let script = normalize(&json!({
            "id": generate_id("scenario"),
            "title": "Novo cenário",
            "steps": [template_step(1, "Mensagem recebida", ["Oi", "Tudo bem?"])],
        }));
        let id = script.id().to_string();
        self.scripts.push(script);
        id
    }

    /// Deletes a scenario. The last remaining one cannot be deleted.
    pub fn remove_scenario(&mut self, id: &str) -> Result<(), TrainerError> {
        let idx = self.index_of(id)?;
        if self.scripts.len() <= 1 {
            return Err(TrainerError::LastScenario);
        }
        self.scripts.remove(idx);
        Ok(())
    }

    pub fn rename_scenario(&mut self, id: &str, title: &str) -> Result<(), TrainerError> {
        let idx = self.index_of(id)?;
        self.scripts[idx].title = title.to_string();
        self.renormalize(idx);
        Ok(())
    }

    /// Adds a template step after the highest id and returns the new id
    pub fn add_step(&mut self, scenario_id: &str) -> Result<StepId, TrainerError> {
        let idx = self.index_of(scenario_id)?;
        let next_id = self.scripts[idx]
            .steps()
            .iter()
            .map(|s| s.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| TrainerError::StepIdExhausted(scenario_id.to_string()))?;

        let mut raw = self.scripts[idx].to_value();
        if let Some(steps) = raw.get_mut("steps").and_then(Value::as_array_mut) {
            steps.push(template_step(next_id, "Nova mensagem recebida", ["Ok", "Tudo bem"]));
        }
        self.scripts[idx] = normalize(&raw);
        Ok(next_id)
    }

    /// Deletes a step. The last step of a scenario cannot be deleted.
    pub fn remove_step(&mut self, scenario_id: &str, step_id: StepId) -> Result<(), TrainerError> {
        let idx = self.index_of(scenario_id)?;
        let script = &mut self.scripts[idx];
        let pos = script
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| TrainerError::UnknownStep {
                scenario_id: scenario_id.to_string(),
                step_id,
            })?;
        if script.steps.len() <= 1 {
            return Err(TrainerError::LastStep);
        }
        script.steps.remove(pos);
        self.renormalize(idx);
        Ok(())
    }

    /// Sets a step's `next` from editor text. Invalid text leaves the step
    /// as it was.
    pub fn set_step_next(
        &mut self,
        scenario_id: &str,
        step_id: StepId,
        text: &str,
    ) -> Result<(), TrainerError> {
        let idx = self.index_of(scenario_id)?;
        let next = Next::parse_field(text)?;
        self.step_mut(idx, step_id)?.next = next;
        self.renormalize(idx);
        Ok(())
    }

    /// Replaces one text field of a step. List fields take one entry per
    /// line; blank lines are dropped.
    pub fn patch_step(
        &mut self,
        scenario_id: &str,
        step_id: StepId,
        field: StepField,
        value: &str,
    ) -> Result<(), TrainerError> {
        let idx = self.index_of(scenario_id)?;
        let step = self.step_mut(idx, step_id)?;
        match field {
            StepField::Incoming => step.incoming = value.to_string(),
            StepField::OptionsL1 => step.options_l1 = parse_lines(value),
            StepField::OptionsL2 => step.options_l2 = parse_lines(value),
            StepField::Template => step.level3.template = value.to_string(),
            StepField::Placeholder => step.level3.placeholder = value.to_string(),
            StepField::OtherOption => step.level3.other_option = value.to_string(),
            StepField::Hint => step.level4.hint = value.to_string(),
            StepField::Chips => step.level4.chips = parse_lines(value),
        }
        tracing::debug!(scenario = scenario_id, step = step_id, %field, "step patched");
        self.renormalize(idx);
        Ok(())
    }

    fn step_mut(&mut self, idx: usize, step_id: StepId) -> Result<&mut Step, TrainerError> {
        let script = &mut self.scripts[idx];
        let scenario_id = script.id.clone();
        script
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or(TrainerError::UnknownStep {
                scenario_id,
                step_id,
            })
    }

    fn index_of(&self, id: &str) -> Result<usize, TrainerError> {
        self.scripts
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| TrainerError::UnknownScenario(id.to_string()))
    }

    fn renormalize(&mut self, idx: usize) {
        self.scripts[idx] = normalize(&self.scripts[idx].to_value());
    }
}

fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn template_step(id: StepId, incoming: &str, chips: [&str; 2]) -> Value {
    json!({
        "id": id,
        "incoming": incoming,
        "optionsL1": ["Resposta 1", "Resposta 2"],
        "optionsL2": ["Resposta 1", "Resposta 2", "Resposta 3"],
        "level3": {
            "template": "Eu estou {blank}.",
            "placeholder": "complete aqui",
            "otherOption": "Ok."
        },
        "level4": {
            "hint": "Dica: escreva uma resposta curta.",
            "chips": chips
        },
        "next": "END"
    })
}
