//! Session controller: owns the lifecycle of one analysis run at a time.
//!
//! All mutation goes through `&mut SessionController`. Inbound traffic is
//! pulled with [`SessionController::next_event`] and applied with
//! [`SessionController::handle_event`]; both the cancel flag and the
//! connection id are checked before anything is applied, so once
//! [`SessionController::stop`] returns no late frame can touch the view.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapters::{Connection, Connector, InboundEvent, LOCAL_ENDPOINT};
use crate::domain::{
    PhaseTransition, RenderedSection, ReportLength, RunRequest, SessionPhase, TeamBoard,
    TeamProgress,
};
use crate::error::{BoardError, Result};
use crate::protocol::{ClientEnvelope, Decoded, Dispatcher, DEFAULT_DECODE_FAILURE_THRESHOLD};
use crate::report::{export_body, ExportDocument, ExportLayout, ExportMeta, RecommendationVariant};
use crate::services::{ActivityLog, ActivityStats, DEFAULT_ACTIVITY_CAPACITY};
use crate::session::run::{RunOutcome, RunSession};

/// Transition history kept for diagnostics
const MAX_TRANSITIONS: usize = 64;

/// Runtime knobs for a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub endpoint: String,
    pub decode_failure_threshold: u32,
    pub activity_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            endpoint: LOCAL_ENDPOINT.to_string(),
            decode_failure_threshold: DEFAULT_DECODE_FAILURE_THRESHOLD,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
        }
    }
}

/// Change notifications for whoever renders the session
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Phase(PhaseTransition),
    Teams(Vec<TeamProgress>),
    Report(Vec<RenderedSection>),
    Recommendation(String),
    Error(String),
}

/// Owned copy of everything needed to draw the session
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub run_id: Option<Uuid>,
    pub ticker: Option<String>,
    pub report_length: ReportLength,
    pub teams: Vec<TeamProgress>,
    pub sections: Vec<RenderedSection>,
    pub recommendation: Option<String>,
    pub variant: Option<RecommendationVariant>,
    pub last_error: Option<String>,
    pub activity: ActivityStats,
}

/// Result of [`SessionController::toggle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started(Uuid),
    Stopped,
}

pub struct SessionController {
    connector: Arc<dyn Connector>,
    settings: SessionSettings,
    run: RunSession,
    connection: Option<Connection>,
    dispatcher: Dispatcher,
    activity: ActivityLog,
    transitions: Vec<PhaseTransition>,
    updates: Option<mpsc::UnboundedSender<SessionUpdate>>,
}

impl SessionController {
    pub fn new(connector: Arc<dyn Connector>, settings: SessionSettings) -> Self {
        Self {
            connector,
            dispatcher: Dispatcher::new(settings.decode_failure_threshold),
            activity: ActivityLog::new(settings.activity_capacity),
            settings,
            run: RunSession::default(),
            connection: None,
            transitions: Vec::new(),
            updates: None,
        }
    }

    /// Receive [`SessionUpdate`]s from now on. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.updates = Some(tx);
        rx
    }

    pub fn phase(&self) -> SessionPhase {
        self.run.phase
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run.run_id
    }

    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    pub fn teams(&self) -> &TeamBoard {
        &self.run.teams
    }

    pub fn recommendation(&self) -> Option<&str> {
        self.run.recommendation.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.run.last_error.as_deref()
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Begin a run. Rejected with `AlreadyRunning` while a run is active.
    pub async fn start(&mut self, request: RunRequest) -> Result<Uuid> {
        if !self.run.phase.accepts_start() {
            warn!("Start rejected, session is {}", self.run.phase);
            return Err(BoardError::AlreadyRunning {
                phase: self.run.phase.to_string(),
            });
        }

        // Terminal phases have already released their connection
        if let Some(stale) = self.connection.take() {
            stale.close();
        }

        let ticker = request.ticker().to_string();
        let run_id = self.run.begin(request);
        self.dispatcher.reset();
        info!(%run_id, "Starting analysis for {}", ticker);
        self.transition(SessionPhase::Connecting, format!("start requested for {}", ticker));
        self.publish_view();

        let connection = match self.connector.open(&self.settings.endpoint).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(%run_id, "Failed to open connection: {}", e);
                self.fail(&e);
                return Err(e);
            }
        };

        self.activity.set_connected(Some(connection.url()));
        self.activity
            .note(&format!("Connected to {} ({})", connection.url(), connection.id()));
        self.connection = Some(connection);
        self.transition(SessionPhase::Running, "transport ready");

        let envelope = match self.run.request.as_ref() {
            Some(request) => ClientEnvelope::start(request),
            None => {
                let e = BoardError::Internal("run started without a request".to_string());
                self.fail(&e);
                return Err(e);
            }
        };

        if let Err(e) = self.send(&envelope) {
            error!(%run_id, "Start request could not be sent: {}", e);
            self.fail(&e);
            return Err(e);
        }

        Ok(run_id)
    }

    /// Kill switch. Idempotent and infallible.
    pub fn stop(&mut self) {
        if self.run.phase == SessionPhase::Idle && self.connection.is_none() {
            debug!("Stop requested while idle");
            return;
        }

        self.run.cancel_requested = true;
        self.transition(SessionPhase::Stopping, "stop requested");

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.send(&ClientEnvelope::StopAnalysis) {
                debug!("Stop request not delivered: {}", e);
            }
            connection.close();
        }
        self.activity.set_connected(None);
        self.activity.note("Analysis stopped");

        self.run.clear_view();
        self.run.last_error = None;
        self.transition(SessionPhase::Idle, "stopped");
        self.publish_view();

        // Late events carry a connection id that no longer matches
        self.run.cancel_requested = false;
        info!(run_id = ?self.run.run_id, "Analysis stopped");
    }

    /// Stop when active, start otherwise
    pub async fn toggle(&mut self, request: RunRequest) -> Result<ToggleOutcome> {
        if self.run.phase.is_active() {
            self.stop();
            Ok(ToggleOutcome::Stopped)
        } else {
            self.start(request).await.map(ToggleOutcome::Started)
        }
    }

    /// Liveness check; the backend answers with `pong`
    pub fn ping(&mut self) -> Result<()> {
        if self.run.phase != SessionPhase::Running {
            return Err(BoardError::TransportClosed(format!(
                "no live connection (phase: {})",
                self.run.phase
            )));
        }
        self.send(&ClientEnvelope::Ping)
    }

    /// Switch between short and long display; retained text is untouched
    pub fn set_report_length(&mut self, length: ReportLength) {
        self.run.set_report_length(length);
        self.publish_view();
    }

    /// Next event from the live connection; `None` when there is none
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        match self.connection.as_mut() {
            Some(connection) => connection.recv().await,
            None => None,
        }
    }

    /// Apply one inbound event. Returns false when the event was discarded.
    pub fn handle_event(&mut self, event: InboundEvent) -> bool {
        if self.run.cancel_requested {
            debug!("Discarding event after cancel");
            return false;
        }
        let Some(live) = self.connection.as_ref().map(Connection::id) else {
            debug!("Discarding event from {}, no live connection", event.connection());
            return false;
        };
        if event.connection() != live {
            debug!("Discarding stale event from {}", event.connection());
            return false;
        }
        if self.run.phase != SessionPhase::Running {
            debug!("Discarding event in phase {}", self.run.phase);
            return false;
        }

        match event {
            InboundEvent::Frame { text, .. } => match self.dispatcher.decode(&text) {
                Decoded::Message(message) => {
                    if self.run.cancel_requested {
                        return false;
                    }
                    self.activity.record_message(message.kind(), &text);
                    self.dispatcher.route(message, &mut self.run);
                    if let Some(outcome) = self.run.take_outcome() {
                        self.finish(outcome);
                    }
                }
                Decoded::Dropped(e) => {
                    self.activity.record_error(&e.to_string());
                }
                Decoded::Fatal(e) => {
                    error!("Protocol stream is corrupt: {}", e);
                    self.finish(RunOutcome::Failed(e));
                }
            },
            InboundEvent::Closed { reason, .. } => {
                let reason = reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| "connection closed by backend".to_string());
                warn!("Connection closed mid-run: {}", reason);
                self.finish(RunOutcome::Failed(BoardError::TransportClosed(reason)));
            }
            InboundEvent::TransportError { message, .. } => {
                error!("Transport failure mid-run: {}", message);
                self.finish(RunOutcome::Failed(BoardError::TransportClosed(message)));
            }
        }

        self.publish_view();
        true
    }

    /// Drive the run until it leaves `running`
    pub async fn run_until_settled(&mut self) -> SessionPhase {
        while self.run.phase == SessionPhase::Running {
            match self.next_event().await {
                Some(event) => {
                    self.handle_event(event);
                }
                None => {
                    self.finish(RunOutcome::Failed(BoardError::TransportClosed(
                        "event stream ended".to_string(),
                    )));
                    self.publish_view();
                }
            }
        }
        self.run.phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let recommendation = self.run.recommendation.clone();
        SessionSnapshot {
            phase: self.run.phase,
            run_id: self.run.run_id,
            ticker: self.run.request.as_ref().map(|r| r.ticker().to_string()),
            report_length: self.run.report_length(),
            teams: self.run.teams.progress(),
            sections: self.run.report.render(self.run.report_length()),
            variant: recommendation.as_deref().map(RecommendationVariant::from_label),
            recommendation,
            last_error: self.run.last_error.clone(),
            activity: self.activity.stats().clone(),
        }
    }

    /// Full report text, one `label\ntext` block per section
    pub fn plain_text(&self) -> String {
        self.run.report.plain_text()
    }

    /// Paginated export of the current report, if there is one
    pub fn export(&self, layout: ExportLayout) -> Option<ExportDocument> {
        let request = self.run.request.as_ref()?;
        if self.run.report.is_empty() {
            return None;
        }
        let length = self.run.report_length();
        let body = export_body(
            &self.plain_text(),
            length,
            self.run.recommendation.as_deref(),
        );
        let meta = ExportMeta {
            ticker: request.ticker().to_string(),
            analysis_date: request.analysis_date_iso(),
            report_length: length,
        };
        Some(ExportDocument::build(&body, meta, layout))
    }

    fn send(&mut self, envelope: &ClientEnvelope) -> Result<()> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| BoardError::TransportClosed("no live connection".to_string()))?;
        connection.send(envelope)
    }

    fn finish(&mut self, outcome: RunOutcome) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.activity.set_connected(None);

        match outcome {
            RunOutcome::Completed => {
                info!(
                    run_id = ?self.run.run_id,
                    recommendation = ?self.run.recommendation,
                    "Analysis complete"
                );
                self.transition(SessionPhase::Completed, "pipeline complete");
                if let Some(label) = self.run.recommendation.clone() {
                    self.emit(SessionUpdate::Recommendation(label));
                }
            }
            RunOutcome::Failed(e) => self.fail(&e),
        }
    }

    fn fail(&mut self, e: &BoardError) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        let message = surfaced_message(e);
        self.activity.record_error(&message);
        self.run.last_error = Some(message.clone());
        self.transition(SessionPhase::Errored, message.clone());
        self.emit(SessionUpdate::Error(message));
    }

    fn transition(&mut self, to: SessionPhase, reason: impl Into<String>) {
        let from = self.run.phase;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            warn!("Invalid phase transition {} -> {}", from, to);
            return;
        }

        let transition = PhaseTransition::new(from, to, reason);
        info!(
            run_id = ?self.run.run_id,
            "Phase {} -> {} ({})", from, to, transition.reason
        );
        self.run.phase = to;

        if self.transitions.len() == MAX_TRANSITIONS {
            self.transitions.remove(0);
        }
        self.transitions.push(transition.clone());
        self.emit(SessionUpdate::Phase(transition));
    }

    fn publish_view(&mut self) {
        let (teams, report) = self.run.take_dirty();
        if teams {
            self.emit(SessionUpdate::Teams(self.run.teams.progress()));
        }
        if report {
            self.emit(SessionUpdate::Report(
                self.run.report.render(self.run.report_length()),
            ));
        }
    }

    fn emit(&mut self, update: SessionUpdate) {
        if let Some(tx) = self.updates.as_ref() {
            if tx.send(update).is_err() {
                debug!("Update subscriber gone");
                self.updates = None;
            }
        }
    }
}

/// Backend messages are shown verbatim, everything else with its context
fn surfaced_message(e: &BoardError) -> String {
    match e {
        BoardError::Backend(message) => message.clone(),
        other => other.to_string(),
    }
}
