//! Application controller: the scenario library, learner settings, session
//! history and the active conversation, persisted through a [`Store`].
//!
//! Every session the engine finalizes passes through here exactly once on its
//! way into history. Switching scenario or level, resetting, and shutting down
//! all finalize the active session before anything else happens.

use crate::analysis::{Analysis, ClinicalAnalyzer};
use crate::clock::SharedClock;
use crate::config::{Config, Settings};
use crate::engine::{ConversationEngine, Submission, SubmitOutcome};
use crate::error::TrainerError;
use crate::export;
use crate::history::SessionHistory;
use crate::level::Level;
use crate::library::{ScenarioLibrary, StepField};
use crate::markers::KeywordMarkerDetector;
use crate::recommend::LevelRecommender;
use crate::script::{Script, StepId};
use crate::session::{EndReason, Session};
use crate::store::Store;
use std::sync::Arc;

pub struct Trainer {
    config: Config,
    store: Box<dyn Store>,
    clock: SharedClock,
    analyzer: ClinicalAnalyzer,
    library: ScenarioLibrary,
    settings: Settings,
    history: SessionHistory,
    engine: ConversationEngine,
    last_finalized: Option<Session>,
}

impl Trainer {
    /// Loads persisted state and opens a session on the first scenario
    pub fn new(
        config: Config,
        store: Box<dyn Store>,
        clock: SharedClock,
    ) -> Result<Self, TrainerError> {
        let keys = &config.storage_keys;

        let library = match store.load(&keys.scripts)? {
            Some(value) => ScenarioLibrary::from_value(&value),
            None => ScenarioLibrary::default(),
        };
        let settings = match store.load(&keys.settings)? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                tracing::warn!(%err, "stored settings unreadable, using defaults");
                Settings::default()
            }),
            None => Settings::default(),
        };
        let history = match store.load(&keys.session_log)? {
            Some(value) => SessionHistory::from_value(&value, config.history_capacity),
            None => SessionHistory::with_capacity(config.history_capacity),
        };

        let analyzer = analyzer_for(&config);
        let engine = ConversationEngine::new(
            library.first().clone(),
            config.starting_level,
            clock.clone(),
            analyzer.clone(),
            config.advance_delay_ms,
        );

        let trainer = Self {
            config,
            store,
            clock,
            analyzer,
            library,
            settings,
            history,
            engine,
            last_finalized: None,
        };
        trainer.persist_scripts()?;
        Ok(trainer)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn library(&self) -> &ScenarioLibrary {
        &self.library
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn is_locked(&self) -> bool {
        self.settings.locked
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn level(&self) -> Level {
        self.engine.level()
    }

    /// The most recent session finalized during this run
    pub fn last_finalized(&self) -> Option<&Session> {
        self.last_finalized.as_ref()
    }

    pub fn live_analysis(&self) -> Analysis {
        self.engine.live_analysis()
    }

    pub fn submit(&mut self, submission: Submission) -> Result<SubmitOutcome, TrainerError> {
        let outcome = self.engine.submit(submission);
        if let SubmitOutcome::Ended(session) = &outcome {
            self.archive((**session).clone())?;
        }
        Ok(outcome)
    }

    pub fn tick(&mut self) -> bool {
        self.engine.tick()
    }

    /// Finalizes the current session and starts the same scenario over.
    /// Allowed in locked mode.
    pub fn restart(&mut self) -> Result<(), TrainerError> {
        let script = self.active_script();
        self.switch(script, self.level(), EndReason::ManualReset)
    }

    pub fn select_scenario(&mut self, id: &str) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        let script = self
            .library
            .get(id)
            .cloned()
            .ok_or_else(|| TrainerError::UnknownScenario(id.to_string()))?;
        self.switch(script, self.level(), EndReason::ScenarioChanged)
    }

    /// Changing level always starts a new session
    pub fn set_level(&mut self, level: Level) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        let script = self.active_script();
        self.switch(script, level, EndReason::LevelChanged)
    }

    /// Moves to the level recommended by the last finalized session
    pub fn apply_recommendation(&mut self) -> Result<Option<Level>, TrainerError> {
        let Some(to_level) = self
            .last_finalized
            .as_ref()
            .and_then(|s| s.analysis.as_ref())
            .map(Analysis::level_after)
        else {
            return Ok(None);
        };
        self.set_level(to_level)?;
        Ok(Some(to_level))
    }

    pub fn set_locked(&mut self, locked: bool) -> Result<(), TrainerError> {
        self.settings.locked = locked;
        let value = serde_json::to_value(self.settings).map_err(crate::error::StoreError::from)?;
        self.store.save(&self.config.storage_keys.settings, &value)?;
        tracing::info!(locked, "locked mode changed");
        Ok(())
    }

    /// Finalizes whatever is in progress before the application exits
    pub fn shutdown(&mut self) -> Result<(), TrainerError> {
        self.close_active(EndReason::Abandoned)
    }

    pub fn import_scenarios(&mut self, json: &str) -> Result<usize, TrainerError> {
        self.ensure_unlocked()?;
        let count = self.library.import_json(json)?;
        self.persist_scripts()?;
        // an import always starts on its first scenario
        let first = self.library.first().clone();
        if first != *self.engine.script() {
            self.switch(first, self.level(), EndReason::ScenarioChanged)?;
        }
        Ok(count)
    }

    pub fn export_scenarios(&self) -> Result<String, TrainerError> {
        self.library
            .export_json()
            .map_err(|e| TrainerError::Store(e.into()))
    }

    pub fn add_scenario(&mut self) -> Result<String, TrainerError> {
        self.ensure_unlocked()?;
        let id = self.library.add_scenario();
        self.persist_scripts()?;
        Ok(id)
    }

    /// Deleting the active scenario switches to the first remaining one
    pub fn remove_scenario(&mut self, id: &str) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        self.library.remove_scenario(id)?;
        self.persist_scripts()?;
        self.follow_active_scenario()
    }

    pub fn rename_scenario(&mut self, id: &str, title: &str) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        self.library.rename_scenario(id, title)?;
        self.persist_scripts()
    }

    pub fn add_step(&mut self, scenario_id: &str) -> Result<StepId, TrainerError> {
        self.ensure_unlocked()?;
        let id = self.library.add_step(scenario_id)?;
        self.persist_scripts()?;
        Ok(id)
    }

    pub fn remove_step(&mut self, scenario_id: &str, step_id: StepId) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        self.library.remove_step(scenario_id, step_id)?;
        self.persist_scripts()
    }

    pub fn set_step_next(
        &mut self,
        scenario_id: &str,
        step_id: StepId,
        text: &str,
    ) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        self.library.set_step_next(scenario_id, step_id, text)?;
        self.persist_scripts()
    }

    pub fn patch_step(
        &mut self,
        scenario_id: &str,
        step_id: StepId,
        field: StepField,
        value: &str,
    ) -> Result<(), TrainerError> {
        self.ensure_unlocked()?;
        self.library.patch_step(scenario_id, step_id, field, value)?;
        self.persist_scripts()
    }

    pub fn clear_history(&mut self) -> Result<(), TrainerError> {
        self.history.clear();
        self.last_finalized = None;
        tracing::info!("session history cleared");
        self.persist_history()
    }

    /// CSV of one session's responses, or of every archived session
    pub fn export_csv(&self, session_id: Option<&str>) -> Result<String, TrainerError> {
        match session_id {
            Some(id) => export::to_csv([self.find_session(id)?]),
            None if self.history.is_empty() => Err(TrainerError::NothingToExport),
            None => export::to_csv(self.history.iter()),
        }
    }

    pub fn export_json(&self, session_id: &str) -> Result<String, TrainerError> {
        let session = self.find_session(session_id)?;
        export::session_json(session).map_err(|e| TrainerError::Store(e.into()))
    }

    fn find_session(&self, id: &str) -> Result<&Session, TrainerError> {
        let active = self.engine.session();
        if active.session_id == id {
            return Ok(active);
        }
        self.history
            .get(id)
            .ok_or_else(|| TrainerError::UnknownSession(id.to_string()))
    }

    /// The library's current version of the running scenario
    fn active_script(&self) -> Script {
        self.library
            .get(self.engine.script().id())
            .unwrap_or_else(|| self.engine.script())
            .clone()
    }

    fn ensure_unlocked(&self) -> Result<(), TrainerError> {
        if self.settings.locked {
            return Err(TrainerError::Locked);
        }
        Ok(())
    }

    fn switch(&mut self, script: Script, level: Level, reason: EndReason) -> Result<(), TrainerError> {
        self.close_active(reason)?;
        self.engine = ConversationEngine::new(
            script,
            level,
            self.clock.clone(),
            self.analyzer.clone(),
            self.config.advance_delay_ms,
        );
        Ok(())
    }

    /// Re-points the engine at the library's version of its scenario, or the
    /// first scenario when the active one is gone
    fn follow_active_scenario(&mut self) -> Result<(), TrainerError> {
        let active_id = self.engine.script().id();
        let script = self
            .library
            .get(active_id)
            .unwrap_or_else(|| self.library.first());
        if script == self.engine.script() {
            return Ok(());
        }
        let script = script.clone();
        self.switch(script, self.level(), EndReason::ScenarioChanged)
    }

    fn close_active(&mut self, reason: EndReason) -> Result<(), TrainerError> {
        let untouched = self.engine.session().is_untouched();
        let Some(session) = self.engine.finalize(reason) else {
            return Ok(());
        };
        if untouched && reason != EndReason::ManualReset {
            tracing::debug!(session = %session.session_id, %reason, "discarding untouched session");
            return Ok(());
        }
        self.archive(session)
    }

    fn archive(&mut self, session: Session) -> Result<(), TrainerError> {
        if let Some(analysis) = &session.analysis {
            tracing::info!(
                session = %session.session_id,
                script = %session.script_id,
                reason = ?session.end_reason,
                responses = analysis.total_responses,
                recommendation = %analysis.headline(),
                "session finalized"
            );
        }
        self.history.push(session.clone());
        self.last_finalized = Some(session);
        self.persist_history()
    }

    fn persist_scripts(&self) -> Result<(), TrainerError> {
        self.store
            .save(&self.config.storage_keys.scripts, &self.library.to_value())?;
        Ok(())
    }

    fn persist_history(&self) -> Result<(), TrainerError> {
        self.store
            .save(&self.config.storage_keys.session_log, &self.history.to_value())?;
        Ok(())
    }
}

/// Analyzer wired with the configured vocabulary and thresholds
pub fn analyzer_for(config: &Config) -> ClinicalAnalyzer {
    ClinicalAnalyzer::new(
        Arc::new(KeywordMarkerDetector::new(&config.markers)),
        config.observations,
        LevelRecommender::new(config.recommender),
    )
}
