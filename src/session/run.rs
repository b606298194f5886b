//! Per-run state and the protocol handler that mutates it.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    ReportAccumulator, ReportLength, ReportSection, RunRequest, SessionPhase, StatusChange,
    TeamBoard, FINAL_SECTION_KEY,
};
use crate::error::BoardError;
use crate::protocol::{AgentUpdate, CompletePayload, ProtocolHandler};
use crate::report::extract_decision;

/// How a run ended, as decided by an inbound message
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed(BoardError),
}

/// State of the current (or last) analysis run
#[derive(Debug)]
pub struct RunSession {
    pub(crate) run_id: Option<Uuid>,
    pub(crate) request: Option<RunRequest>,
    pub(crate) phase: SessionPhase,
    pub(crate) cancel_requested: bool,
    pub(crate) teams: TeamBoard,
    pub(crate) report: ReportAccumulator,
    pub(crate) recommendation: Option<String>,
    pub(crate) last_error: Option<String>,
    /// Display mode used while no request is loaded
    pub(crate) display_length: ReportLength,
    outcome: Option<RunOutcome>,
    teams_dirty: bool,
    report_dirty: bool,
}

impl Default for RunSession {
    fn default() -> Self {
        Self {
            run_id: None,
            request: None,
            phase: SessionPhase::Idle,
            cancel_requested: false,
            teams: TeamBoard::template(),
            report: ReportAccumulator::new(),
            recommendation: None,
            last_error: None,
            display_length: ReportLength::default(),
            outcome: None,
            teams_dirty: false,
            report_dirty: false,
        }
    }
}

impl RunSession {
    /// Fresh run for `request`; the previous run's view is discarded
    pub(crate) fn begin(&mut self, request: RunRequest) -> Uuid {
        let run_id = Uuid::new_v4();
        self.display_length = request.report_length();
        self.run_id = Some(run_id);
        self.request = Some(request);
        self.cancel_requested = false;
        self.clear_view();
        self.last_error = None;
        run_id
    }

    /// Teams back to the template, report and recommendation cleared
    pub(crate) fn clear_view(&mut self) {
        self.teams.reset();
        self.report.clear();
        self.recommendation = None;
        self.outcome = None;
        self.teams_dirty = true;
        self.report_dirty = true;
    }

    pub(crate) fn report_length(&self) -> ReportLength {
        self.request
            .as_ref()
            .map(|r| r.report_length())
            .unwrap_or(self.display_length)
    }

    pub(crate) fn set_report_length(&mut self, length: ReportLength) {
        self.display_length = length;
        if let Some(request) = self.request.as_mut() {
            request.set_report_length(length);
        }
        self.report_dirty = true;
    }

    pub(crate) fn take_outcome(&mut self) -> Option<RunOutcome> {
        self.outcome.take()
    }

    /// (teams changed, report changed) since the last call
    pub(crate) fn take_dirty(&mut self) -> (bool, bool) {
        let dirty = (self.teams_dirty, self.report_dirty);
        self.teams_dirty = false;
        self.report_dirty = false;
        dirty
    }

    /// Recommendation from the complete message, falling back to the final
    /// decision section
    fn derive_recommendation(&self, decision: Option<&str>) -> Option<String> {
        if let Some(decision) = decision.map(str::trim).filter(|d| !d.is_empty()) {
            return Some(decision.to_string());
        }
        self.report
            .get(FINAL_SECTION_KEY)
            .map(|section| extract_decision(&section.text))
    }
}

impl ProtocolHandler for RunSession {
    fn on_status(&mut self, updates: Vec<AgentUpdate>) {
        for update in updates {
            match self.teams.apply(update.team, update.display, update.status) {
                StatusChange::Advanced => {
                    debug!("{} -> {}", update.display, update.status);
                    self.teams_dirty = true;
                }
                StatusChange::Regressed => debug!(
                    "Ignoring regression of {} to {}",
                    update.display, update.status
                ),
                StatusChange::Unchanged | StatusChange::Unknown => {}
            }
        }
    }

    fn on_log(&mut self, kind: &str, summary: String) {
        debug!(kind, "{}", summary);
    }

    fn on_report(&mut self, section: ReportSection) {
        info!("Report section '{}' received", section.key);
        self.report.upsert(section);
        self.report_dirty = true;
    }

    fn on_complete(&mut self, payload: CompletePayload) {
        if let Some(snapshot) = payload.final_state.as_ref() {
            if !self.report.replace_from_snapshot(snapshot) {
                warn!("Final snapshot carried no sections, keeping streamed report");
            }
        }
        self.recommendation = self.derive_recommendation(payload.decision.as_deref());
        self.teams.complete_all();
        self.teams_dirty = true;
        self.report_dirty = true;
        self.outcome = Some(RunOutcome::Completed);
    }

    fn on_error(&mut self, message: String) {
        self.outcome = Some(RunOutcome::Failed(BoardError::Backend(message)));
    }

    fn on_pong(&mut self) {
        debug!("pong");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentStatus, FinalState, TeamKind};

    fn session() -> RunSession {
        let mut run = RunSession::default();
        run.begin(RunRequest::builder("AAPL", "2025-11-25").build().unwrap());
        run
    }

    #[test]
    fn test_decision_field_wins() {
        let mut run = session();
        run.on_report(ReportSection::new("final", "Portfolio Management Decision", "SELL now"));
        run.on_complete(CompletePayload {
            decision: Some("BUY".into()),
            final_state: None,
        });
        assert_eq!(run.recommendation.as_deref(), Some("BUY"));
        assert!(run.teams.all_completed());
    }

    #[test]
    fn test_blank_decision_falls_back_to_final_section() {
        let mut run = session();
        run.on_complete(CompletePayload {
            decision: Some("  ".into()),
            final_state: Some(FinalState {
                final_trade_decision: Some("We recommend to hold for now".into()),
                ..FinalState::default()
            }),
        });
        assert_eq!(run.recommendation.as_deref(), Some("HOLD"));
    }

    #[test]
    fn test_no_decision_and_no_final_section() {
        let mut run = session();
        run.on_report(ReportSection::new("market", "Market Analysis", "BUY signals"));
        run.on_complete(CompletePayload::default());
        assert_eq!(run.recommendation, None);
        assert!(matches!(run.take_outcome(), Some(RunOutcome::Completed)));
    }

    #[test]
    fn test_regressions_are_ignored() {
        let mut run = session();
        let update = |status| AgentUpdate {
            team: TeamKind::Trader,
            display: "Trader",
            status,
        };
        run.on_status(vec![update(AgentStatus::Completed)]);
        run.take_dirty();
        run.on_status(vec![update(AgentStatus::InProgress)]);

        assert_eq!(
            run.teams.status_of(TeamKind::Trader, "Trader"),
            Some(AgentStatus::Completed)
        );
        assert_eq!(run.take_dirty(), (false, false));
    }

    #[test]
    fn test_report_length_switch_keeps_text() {
        let mut run = session();
        run.on_report(ReportSection::new("news", "News Analysis", "Full body"));
        run.set_report_length(ReportLength::Short);

        assert_eq!(run.report_length(), ReportLength::Short);
        assert_eq!(run.report.get("news").unwrap().text, "Full body");
    }
}
