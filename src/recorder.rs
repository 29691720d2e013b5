use crate::analysis::ClinicalAnalyzer;
use crate::level::Level;
use crate::session::{EndReason, Event, ResponseType, Session};
use crate::script::Step;

/// Owns the active session and timestamps everything appended to it.
///
/// Once finalized the session is frozen: further responses and invalid
/// attempts are dropped and a second finalization is a no-op.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    session: Session,
    incoming_shown_at: i64,
}

impl EventRecorder {
    pub fn new(session: Session) -> Self {
        let incoming_shown_at = session.started_at;
        Self {
            session,
            incoming_shown_at,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_finalized(&self) -> bool {
        self.session.is_finalized()
    }

    /// Latency anchor: the current step's incoming message became visible
    pub fn mark_incoming_shown(&mut self, now: i64) {
        self.incoming_shown_at = now;
    }

    pub fn record_response(
        &mut self,
        now: i64,
        step: &Step,
        response_text: String,
        level_used: Level,
        response_type: ResponseType,
        option_index: Option<usize>,
    ) -> Option<&Event> {
        if self.is_finalized() {
            return None;
        }

        let latency_ms = u64::try_from(now - self.incoming_shown_at).unwrap_or(0);
        self.session.events.push(Event {
            ts: now,
            step_id: step.id,
            incoming: step.incoming.clone(),
            response_text,
            level_used,
            response_type,
            option_index,
            latency_ms,
        });
        self.session.events.last()
    }

    pub fn record_invalid(&mut self) {
        if !self.is_finalized() {
            self.session.attempts_invalid += 1;
        }
    }

    /// Seals the session and attaches its analysis. Only the first call for
    /// a session returns it.
    pub fn finalize(
        &mut self,
        now: i64,
        reason: EndReason,
        analyzer: &ClinicalAnalyzer,
    ) -> Option<Session> {
        if self.is_finalized() {
            return None;
        }

        self.session.ended_at = Some(now);
        self.session.end_reason = Some(reason);
        self.session.analysis = Some(analyzer.analyze(&self.session));
        Some(self.session.clone())
    }
}
