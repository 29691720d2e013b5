//! The scripted-conversation state machine for one active session.
//!
//! An accepted response is recorded immediately. The step change itself waits
//! for a short typing pause, driven by [`ConversationEngine::tick`], and the
//! next step's latency clock starts when its incoming message is shown.

use crate::analysis::{Analysis, ClinicalAnalyzer};
use crate::clock::SharedClock;
use crate::level::Level;
use crate::recorder::EventRecorder;
use crate::script::{FillIn, FreeText, Next, Script, Step, StepId};
use crate::session::{EndReason, ResponseType, Session};

/// Result of [`compute_next`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advance(StepId),
    End,
}

/// Where answering `step` with `option_index` leads. Total: a branch map
/// without an entry for the index ends the conversation.
pub fn compute_next(step: &Step, option_index: usize) -> Transition {
    match &step.next {
        Next::Terminal => Transition::End,
        Next::Unconditional(id) => Transition::Advance(*id),
        Next::Branch(map) => map
            .get(&option_index.to_string())
            .map_or(Transition::End, |id| Transition::Advance(*id)),
    }
}

/// A learner's answer to the current step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A canned reply by index. At level 3, index 1 is the other option.
    Option(usize),
    /// Text for the level 3 template's blank
    Fill(String),
    /// Level 4 free text
    Free(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Empty response, counted as an invalid attempt
    Rejected,
    /// The typing pause before the next step is still running
    Busy,
    /// The conversation has already ended
    Closed,
    Advancing { to: StepId, due_at: i64 },
    Ended(Box<Session>),
}

/// What the current level offers the learner for the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSurface<'a> {
    Choices(&'a [String]),
    FillIn(&'a FillIn),
    FreeText(&'a FreeText),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Speaker {
    Partner,
    Learner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingAdvance {
    to: StepId,
    due_at: i64,
}

pub struct ConversationEngine {
    script: Script,
    level: Level,
    current: StepId,
    ended: bool,
    pending: Option<PendingAdvance>,
    transcript: Vec<TranscriptLine>,
    recorder: EventRecorder,
    clock: SharedClock,
    analyzer: ClinicalAnalyzer,
    advance_delay_ms: i64,
}

impl ConversationEngine {
    /// Starts a fresh session on the script's first step
    pub fn new(
        script: Script,
        level: Level,
        clock: SharedClock,
        analyzer: ClinicalAnalyzer,
        advance_delay_ms: u64,
    ) -> Self {
        let now = clock.now_ms();
        let session = Session::new(&script, level, now);
        tracing::debug!(
            session = %session.session_id,
            script = %script.id(),
            %level,
            "session started"
        );

        let current = script.first_step().id;
        let mut engine = Self {
            script,
            level,
            current,
            ended: false,
            pending: None,
            transcript: Vec::new(),
            recorder: EventRecorder::new(session),
            clock,
            analyzer,
            advance_delay_ms: i64::try_from(advance_delay_ms).unwrap_or(i64::MAX),
        };
        engine.enter_step(current, now);
        engine
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn session(&self) -> &Session {
        self.recorder.session()
    }

    pub fn transcript(&self) -> &[TranscriptLine] {
        &self.transcript
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// A response was accepted and the next step is not shown yet
    pub fn is_typing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn current_step(&self) -> &Step {
        self.script
            .step(self.current)
            .unwrap_or_else(|| self.script.first_step())
    }

    pub fn surface(&self) -> OptionSurface<'_> {
        let step = self.current_step();
        match self.level.get() {
            1 => OptionSurface::Choices(&step.options_l1[..step.options_l1.len().min(2)]),
            2 => OptionSurface::Choices(&step.options_l2[..step.options_l2.len().min(4)]),
            3 => OptionSurface::FillIn(&step.level3),
            _ => OptionSurface::FreeText(&step.level4),
        }
    }

    /// Metrics for the session so far
    pub fn live_analysis(&self) -> Analysis {
        self.analyzer.analyze(self.session())
    }

    pub fn submit(&mut self, submission: Submission) -> SubmitOutcome {
        if self.ended {
            return SubmitOutcome::Closed;
        }
        if self.pending.is_some() {
            return SubmitOutcome::Busy;
        }

        let step = self.current_step().clone();
        let (text, response_type, option_index) = self.resolve(&step, submission);
        if text.trim().is_empty() {
            self.recorder.record_invalid();
            return SubmitOutcome::Rejected;
        }

        let now = self.clock.now_ms();
        self.recorder.record_response(
            now,
            &step,
            text.clone(),
            self.level,
            response_type,
            Some(option_index),
        );
        self.transcript.push(TranscriptLine {
            speaker: Speaker::Learner,
            text,
        });

        match compute_next(&step, option_index) {
            Transition::Advance(to) if self.script.step(to).is_some() => {
                let due_at = now.saturating_add(self.advance_delay_ms);
                self.pending = Some(PendingAdvance { to, due_at });
                SubmitOutcome::Advancing { to, due_at }
            }
            Transition::Advance(to) => {
                tracing::warn!(
                    script = %self.script.id(),
                    from = step.id,
                    to,
                    "next step does not exist, ending conversation"
                );
                self.end(now, EndReason::Ended)
            }
            Transition::End => self.end(now, EndReason::Ended),
        }
    }

    /// Shows the pending step once its typing pause is over. Returns whether
    /// the visible step changed.
    pub fn tick(&mut self) -> bool {
        let Some(pending) = self.pending else {
            return false;
        };
        let now = self.clock.now_ms();
        if now < pending.due_at {
            return false;
        }

        self.pending = None;
        self.enter_step(pending.to, now);
        true
    }

    /// Ends the conversation from outside (reset, switch, quit). Returns the
    /// finalized session unless it was already finalized.
    pub fn finalize(&mut self, reason: EndReason) -> Option<Session> {
        let now = self.clock.now_ms();
        self.ended = true;
        self.pending = None;
        self.recorder.finalize(now, reason, &self.analyzer)
    }

    fn end(&mut self, now: i64, reason: EndReason) -> SubmitOutcome {
        self.ended = true;
        self.pending = None;
        match self.recorder.finalize(now, reason, &self.analyzer) {
            Some(session) => SubmitOutcome::Ended(Box::new(session)),
            None => SubmitOutcome::Closed,
        }
    }

    fn enter_step(&mut self, id: StepId, now: i64) {
        self.current = id;
        self.recorder.mark_incoming_shown(now);

        let incoming = self.current_step().incoming.clone();
        let duplicate = self
            .transcript
            .last()
            .is_some_and(|line| line.speaker == Speaker::Partner && line.text == incoming);
        if !duplicate {
            self.transcript.push(TranscriptLine {
                speaker: Speaker::Partner,
                text: incoming,
            });
        }
    }

    /// Response text, type and option index for a submission at the current
    /// level. Submissions that do not fit the level resolve to empty text.
    fn resolve(&self, step: &Step, submission: Submission) -> (String, ResponseType, usize) {
        let pick = |options: &[String], index: usize, limit: usize| {
            options
                .get(index)
                .filter(|_| index < limit)
                .cloned()
                .unwrap_or_default()
        };

        match (self.level.get(), submission) {
            (1, Submission::Option(i)) => (pick(&step.options_l1, i, 2), ResponseType::Button, i),
            (2, Submission::Option(i)) => (pick(&step.options_l2, i, 4), ResponseType::Button, i),
            (3, Submission::Option(1)) => {
                (step.level3.other_option.clone(), ResponseType::Button, 1)
            }
            (3, Submission::Fill(blank)) => {
                let blank = blank.trim();
                let text = if blank.is_empty() {
                    String::new()
                } else {
                    step.level3.fill(blank)
                };
                (text, ResponseType::Fill, 0)
            }
            (4, Submission::Free(text)) => (text.trim().to_string(), ResponseType::Free, 0),
            (_, Submission::Option(i)) => (String::new(), ResponseType::Button, i),
            (_, Submission::Fill(_)) => (String::new(), ResponseType::Fill, 0),
            (_, Submission::Free(_)) => (String::new(), ResponseType::Free, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::script::{default_scripts, normalize};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    const DELAY: u64 = 450;

    fn engine_with(script: Script, level: Level) -> (ConversationEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let engine = ConversationEngine::new(
            script,
            level,
            clock.clone(),
            ClinicalAnalyzer::default(),
            DELAY,
        );
        (engine, clock)
    }

    fn greetings(level: Level) -> (ConversationEngine, Arc<ManualClock>) {
        engine_with(default_scripts().remove(0), level)
    }

    fn branching() -> Script {
        normalize(&json!({
            "id": "branchy",
            "title": "Branchy",
            "steps": [
                {"id": 1, "incoming": "Sim ou não?", "optionsL1": ["Sim", "Não"],
                 "next": {"0": 2, "1": 3}},
                {"id": 2, "incoming": "Que bom", "next": "END"},
                {"id": 3, "incoming": "Que pena", "optionsL1": ["Ok", "Tchau"], "next": 99}
            ]
        }))
    }

    #[test]
    fn test_compute_next_terminal_and_unconditional() {
        let script = branching();
        assert_eq!(compute_next(script.step(2).unwrap(), 0), Transition::End);
        // unconditional edges ignore the chosen option
        assert_eq!(compute_next(script.step(3).unwrap(), 7), Transition::Advance(99));
    }

    #[test]
    fn test_compute_next_branch_lookup() {
        let script = branching();
        let step = script.step(1).unwrap();
        assert_eq!(compute_next(step, 0), Transition::Advance(2));
        assert_eq!(compute_next(step, 1), Transition::Advance(3));
        assert_eq!(compute_next(step, 5), Transition::End);
        assert_eq!(compute_next(step, usize::MAX), Transition::End);
    }

    #[test]
    fn test_starts_on_first_step_with_incoming_shown() {
        let (engine, _) = greetings(Level::ONE);
        assert_eq!(engine.current_step().id, 1);
        assert_eq!(engine.transcript().len(), 1);
        assert_eq!(engine.transcript()[0].text, "Oi!");
        assert_eq!(engine.session().level_at_start, Level::ONE);
        assert!(!engine.is_ended());
    }

    #[test]
    fn test_empty_submission_counts_invalid_without_event() {
        let (mut engine, _) = greetings(Level::FOUR);
        assert_eq!(engine.submit(Submission::Free("   ".into())), SubmitOutcome::Rejected);
        assert_eq!(engine.submit(Submission::Free(String::new())), SubmitOutcome::Rejected);
        assert_eq!(engine.session().attempts_invalid, 2);
        assert!(engine.session().events.is_empty());
        assert_eq!(engine.current_step().id, 1);
    }

    #[test]
    fn test_valid_submission_records_one_event_then_advances_after_pause() {
        let (mut engine, clock) = greetings(Level::ONE);
        clock.advance(2_000);

        let outcome = engine.submit(Submission::Option(1));
        assert_eq!(outcome, SubmitOutcome::Advancing { to: 2, due_at: 12_000 + DELAY as i64 });
        let event = &engine.session().events[0];
        assert_eq!(event.response_text, "Olá");
        assert_eq!(event.latency_ms, 2_000);
        assert_eq!(event.option_index, Some(1));
        assert_eq!(event.response_type, ResponseType::Button);
        assert_eq!(engine.session().attempts_invalid, 0);

        // still on step 1 during the pause
        assert!(!engine.tick());
        assert_eq!(engine.submit(Submission::Option(0)), SubmitOutcome::Busy);
        assert_eq!(engine.session().events.len(), 1);

        clock.advance(DELAY as i64);
        assert!(engine.tick());
        assert_eq!(engine.current_step().id, 2);

        // latency anchored on when step 2 appeared, not on the submission
        clock.advance(1_000);
        engine.submit(Submission::Option(0));
        assert_eq!(engine.session().events[1].latency_ms, 1_000);
    }

    #[test]
    fn test_out_of_range_option_is_invalid() {
        let (mut engine, _) = greetings(Level::ONE);
        assert_eq!(engine.submit(Submission::Option(2)), SubmitOutcome::Rejected);
        assert_eq!(engine.session().attempts_invalid, 1);
    }

    #[test]
    fn test_branching_follows_choice() {
        let (mut engine, clock) = engine_with(branching(), Level::ONE);
        engine.submit(Submission::Option(1));
        clock.advance(DELAY as i64);
        engine.tick();
        assert_eq!(engine.current_step().incoming, "Que pena");
    }

    #[test]
    fn test_dangling_next_ends_and_finalizes_once() {
        let (mut engine, clock) = engine_with(branching(), Level::ONE);
        engine.submit(Submission::Option(1));
        clock.advance(DELAY as i64);
        engine.tick();

        let outcome = engine.submit(Submission::Option(0));
        assert_matches!(outcome, SubmitOutcome::Ended(session) => {
            assert_eq!(session.end_reason, Some(EndReason::Ended));
            assert_eq!(session.events.len(), 2);
            assert!(session.analysis.is_some());
        });
        assert!(engine.is_ended());
        assert_eq!(engine.submit(Submission::Option(0)), SubmitOutcome::Closed);
        // a reset right after END does not produce a second record
        assert_eq!(engine.finalize(EndReason::ManualReset), None);
    }

    #[test]
    fn test_walks_default_script_to_end() {
        let (mut engine, clock) = greetings(Level::TWO);
        let mut ended = None;
        for _ in 0..7 {
            clock.advance(1_000);
            match engine.submit(Submission::Option(0)) {
                SubmitOutcome::Advancing { .. } => {
                    clock.advance(DELAY as i64);
                    assert!(engine.tick());
                }
                SubmitOutcome::Ended(session) => ended = Some(session),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let session = ended.expect("conversation should end on step 7");
        assert_eq!(session.events.len(), 7);
        assert_eq!(engine.transcript().len(), 14);
    }

    #[test]
    fn test_level_three_fill_and_other_option() {
        let (mut engine, clock) = greetings(Level::THREE);
        assert_matches!(engine.surface(), OptionSurface::FillIn(f) if f.template == "Oi, {blank}!");

        assert_eq!(engine.submit(Submission::Fill("  ".into())), SubmitOutcome::Rejected);
        // the fill-in needs text, a bare option 0 is not enough
        assert_eq!(engine.submit(Submission::Option(0)), SubmitOutcome::Rejected);

        engine.submit(Submission::Fill(" Ana ".into()));
        let event = &engine.session().events[0];
        assert_eq!(event.response_text, "Oi, Ana!");
        assert_eq!(event.response_type, ResponseType::Fill);
        assert_eq!(event.option_index, Some(0));

        clock.advance(DELAY as i64);
        engine.tick();
        engine.submit(Submission::Option(1));
        let event = &engine.session().events[1];
        assert_eq!(event.response_text, "Estou bem! E você?");
        assert_eq!(event.response_type, ResponseType::Button);
        assert_eq!(event.option_index, Some(1));
        assert_eq!(engine.session().attempts_invalid, 2);
    }

    #[test]
    fn test_level_four_free_text() {
        let (mut engine, _) = greetings(Level::FOUR);
        assert_matches!(engine.surface(), OptionSurface::FreeText(f) if f.chips.len() == 3);
        engine.submit(Submission::Free("  Oi, tudo bem?  ".into()));
        let event = &engine.session().events[0];
        assert_eq!(event.response_text, "Oi, tudo bem?");
        assert_eq!(event.response_type, ResponseType::Free);
        assert_eq!(event.option_index, Some(0));
        assert_eq!(event.level_used, Level::FOUR);
    }

    #[test]
    fn test_surface_per_level() {
        let (engine, _) = greetings(Level::ONE);
        assert_matches!(engine.surface(), OptionSurface::Choices(o) if o.len() == 2);
        let (engine, _) = greetings(Level::TWO);
        assert_matches!(engine.surface(), OptionSurface::Choices(o) if o.len() == 4);
    }

    #[test]
    fn test_self_loop_keeps_transcript_free_of_adjacent_duplicates() {
        let script = normalize(&json!({
            "id": "loop",
            "steps": [{"id": 1, "incoming": "De novo?", "optionsL1": ["Sim", "Não"],
                       "next": {"0": 1}}]
        }));
        let (mut engine, clock) = engine_with(script, Level::ONE);
        engine.submit(Submission::Option(0));
        clock.advance(DELAY as i64);
        engine.tick();

        let texts: Vec<&str> = engine.transcript().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["De novo?", "Sim", "De novo?"]);
        // re-entering the step still resets the latency anchor
        clock.advance(300);
        engine.submit(Submission::Option(1));
        assert_eq!(engine.session().events[1].latency_ms, 300);
    }

    #[test]
    fn test_manual_finalize_keeps_collected_events() {
        let (mut engine, _) = greetings(Level::ONE);
        engine.submit(Submission::Option(0));
        let session = engine.finalize(EndReason::ManualReset).unwrap();
        assert_eq!(session.events.len(), 1);
        assert_eq!(session.end_reason, Some(EndReason::ManualReset));
        assert!(!engine.tick());
        assert_eq!(engine.submit(Submission::Option(0)), SubmitOutcome::Closed);
    }

    #[test]
    fn test_live_analysis_on_open_session() {
        let (mut engine, _) = greetings(Level::ONE);
        engine.submit(Submission::Option(0));
        let analysis = engine.live_analysis();
        assert_eq!(analysis.total_responses, 1);
        assert!(engine.session().analysis.is_none());
    }
}
