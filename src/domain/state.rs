use serde::{Deserialize, Serialize};
use std::fmt;

/// Session lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No run in progress
    Idle,
    /// Connection requested, waiting for the transport to report ready
    Connecting,
    /// Start request sent, streaming events from the pipeline
    Running,
    /// Kill switch engaged, tearing the run down
    Stopping,
    /// Pipeline finished and the final report is in place
    Completed,
    /// Run ended by a transport, protocol or backend failure
    Errored,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::Connecting => "CONNECTING",
            SessionPhase::Running => "RUNNING",
            SessionPhase::Stopping => "STOPPING",
            SessionPhase::Completed => "COMPLETED",
            SessionPhase::Errored => "ERRORED",
        }
    }

    /// Check if this phase can transition to another phase
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        use SessionPhase::*;

        match (self, target) {
            // From Idle
            (Idle, Connecting) => true,

            // From Connecting
            (Connecting, Running) => true,  // Transport ready
            (Connecting, Errored) => true,  // Open failed
            (Connecting, Stopping) => true, // Cancelled while connecting

            // From Running
            (Running, Completed) => true,
            (Running, Errored) => true,
            (Running, Stopping) => true,

            // From Stopping
            (Stopping, Idle) => true,

            // Terminal phases start over or get cleared
            (Completed, Connecting) => true,
            (Completed, Stopping) => true,
            (Errored, Connecting) => true,
            (Errored, Stopping) => true,

            // Stop from idle is a no-op teardown
            (Idle, Stopping) => true,

            _ => false,
        }
    }

    /// Get valid next phases from the current phase
    pub fn valid_transitions(&self) -> Vec<SessionPhase> {
        use SessionPhase::*;

        match self {
            Idle => vec![Connecting, Stopping],
            Connecting => vec![Running, Errored, Stopping],
            Running => vec![Completed, Errored, Stopping],
            Stopping => vec![Idle],
            Completed => vec![Connecting, Stopping],
            Errored => vec![Connecting, Stopping],
        }
    }

    /// Is a run occupying the session? A new start is rejected in these phases.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionPhase::Connecting | SessionPhase::Running | SessionPhase::Stopping
        )
    }

    /// Can `start` be accepted from this phase?
    pub fn accepts_start(&self) -> bool {
        matches!(
            self,
            SessionPhase::Idle | SessionPhase::Completed | SessionPhase::Errored
        )
    }

    /// Is this a terminal phase for the current run?
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Errored)
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SessionPhase {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "IDLE" => Ok(SessionPhase::Idle),
            "CONNECTING" => Ok(SessionPhase::Connecting),
            "RUNNING" => Ok(SessionPhase::Running),
            "STOPPING" => Ok(SessionPhase::Stopping),
            "COMPLETED" => Ok(SessionPhase::Completed),
            "ERRORED" => Ok(SessionPhase::Errored),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}

/// Phase transition event (for logging/debugging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    pub reason: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl PhaseTransition {
    pub fn new(from: SessionPhase, to: SessionPhase, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}
