//! Frame decoding with failure escalation, and routing of decoded messages
//! to typed handlers.

use tracing::{debug, warn};

use crate::domain::{slot_for_backend, AgentStatus, ReportSection, TeamKind};
use crate::error::BoardError;
use crate::protocol::envelope::{decode_frame, CompletePayload, ServerMessage, StatusPayload};

/// Consecutive undecodable frames tolerated before the stream is declared corrupt
pub const DEFAULT_DECODE_FAILURE_THRESHOLD: u32 = 3;

/// Status delta for one known agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentUpdate {
    pub team: TeamKind,
    pub display: &'static str,
    pub status: AgentStatus,
}

/// Map a status payload onto known agents; unmapped names and unknown
/// status strings are dropped.
pub fn translate_status(payload: &StatusPayload) -> Vec<AgentUpdate> {
    payload
        .agents
        .iter()
        .filter_map(|(name, raw)| {
            let Some(slot) = slot_for_backend(name) else {
                debug!("Ignoring status for unmapped agent '{}'", name);
                return None;
            };
            let Some(status) = AgentStatus::parse(raw) else {
                debug!("Ignoring unknown status '{}' for '{}'", raw, name);
                return None;
            };
            Some(AgentUpdate {
                team: slot.team,
                display: slot.display,
                status,
            })
        })
        .collect()
}

/// Receivers of routed protocol messages
pub trait ProtocolHandler {
    fn on_status(&mut self, updates: Vec<AgentUpdate>);

    /// Free-form `message` and `tool_call` traffic; never state-affecting
    fn on_log(&mut self, kind: &str, summary: String);

    fn on_report(&mut self, section: ReportSection);

    fn on_complete(&mut self, payload: CompletePayload);

    fn on_error(&mut self, message: String);

    fn on_pong(&mut self) {}
}

/// Result of decoding one frame
#[derive(Debug)]
pub enum Decoded {
    Message(ServerMessage),
    /// Frame dropped; the connection stays usable
    Dropped(BoardError),
    /// Too many consecutive failures; the run must end
    Fatal(BoardError),
}

#[derive(Debug)]
pub struct Dispatcher {
    consecutive_failures: u32,
    threshold: u32,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DECODE_FAILURE_THRESHOLD)
    }
}

impl Dispatcher {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn decode(&mut self, text: &str) -> Decoded {
        match decode_frame(text) {
            Ok(message) => {
                self.consecutive_failures = 0;
                Decoded::Message(message)
            }
            Err(err) => {
                self.consecutive_failures += 1;
                warn!(
                    "Dropping undecodable frame ({}/{}): {}",
                    self.consecutive_failures, self.threshold, err
                );
                if self.consecutive_failures >= self.threshold {
                    Decoded::Fatal(BoardError::ProtocolFatal(format!(
                        "{} consecutive undecodable frames, last: {}",
                        self.consecutive_failures, err
                    )))
                } else {
                    Decoded::Dropped(err)
                }
            }
        }
    }

    /// Route a decoded message to the handler by kind
    pub fn route<H: ProtocolHandler>(&self, message: ServerMessage, handler: &mut H) {
        match message {
            ServerMessage::Status(payload) => {
                if let Some(note) = payload.message.as_deref() {
                    debug!("Status note: {}", note);
                }
                handler.on_status(translate_status(&payload));
            }
            ServerMessage::Message(payload) => {
                let kind = payload.kind.as_deref().unwrap_or("Message");
                let content = match &payload.content {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                handler.on_log("message", format!("[{}] {}", kind, truncate(&content, 100)));
            }
            ServerMessage::ToolCall(payload) => {
                let name = payload.name.as_deref().unwrap_or("unknown");
                handler.on_log("tool_call", format!("Tool: {}", name));
            }
            ServerMessage::Report(payload) => handler.on_report(payload.into_section()),
            ServerMessage::Complete(payload) => handler.on_complete(payload),
            ServerMessage::Error(payload) => handler.on_error(
                payload
                    .message
                    .unwrap_or_else(|| "Backend reported an error".to_string()),
            ),
            ServerMessage::Pong => handler.on_pong(),
            ServerMessage::Unknown(kind) => debug!("Ignoring unknown message type '{}'", kind),
        }
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
