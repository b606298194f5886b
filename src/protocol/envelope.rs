//! Wire envelopes exchanged with the analysis backend.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{FinalState, ReportSection, RunRequest};
use crate::error::{BoardError, Result};

/// Client → backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientEnvelope {
    StartAnalysis { request: StartAnalysisRequest },
    StopAnalysis,
    Ping,
}

impl ClientEnvelope {
    pub fn start(request: &RunRequest) -> Self {
        ClientEnvelope::StartAnalysis {
            request: StartAnalysisRequest::from(request),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ClientEnvelope::StartAnalysis { .. } => "start_analysis",
            ClientEnvelope::StopAnalysis => "stop_analysis",
            ClientEnvelope::Ping => "ping",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Start payload in the backend's flat field layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAnalysisRequest {
    pub ticker: String,
    pub analysis_date: String,
    pub report_length: String,
    pub analysts: Vec<String>,
    pub research_depth: u32,
    pub llm_provider: String,
    pub backend_url: String,
    pub shallow_thinker: String,
    pub deep_thinker: String,
}

impl From<&RunRequest> for StartAnalysisRequest {
    fn from(req: &RunRequest) -> Self {
        Self {
            ticker: req.ticker().to_string(),
            analysis_date: req.analysis_date_iso(),
            report_length: req.report_length().as_str().to_string(),
            analysts: req.analysts().iter().map(|a| a.as_str().to_string()).collect(),
            research_depth: req.research_depth().rounds(),
            llm_provider: req.provider().name.clone(),
            backend_url: req.provider().backend_url.clone(),
            shallow_thinker: req.models().shallow.clone(),
            deep_thinker: req.models().deep.clone(),
        }
    }
}

/// `{type, data}` before the payload is interpreted
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusPayload {
    /// Backend agent name → wire status string
    #[serde(default)]
    pub agents: BTreeMap<String, String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportPayload {
    pub section: String,
    #[serde(default)]
    pub label: Option<String>,
    pub content: String,
}

impl ReportPayload {
    /// Missing labels fall back to the section key
    pub fn into_section(self) -> ReportSection {
        let label = self
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.section.clone());
        ReportSection::new(self.section, label, self.content)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompletePayload {
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub final_state: Option<FinalState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend → client, decoded by kind
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Status(StatusPayload),
    Message(MessagePayload),
    ToolCall(ToolCallPayload),
    Report(ReportPayload),
    Complete(CompletePayload),
    Error(ErrorPayload),
    Pong,
    /// Kind this client does not know; ignored
    Unknown(String),
}

impl ServerMessage {
    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::Status(_) => "status",
            ServerMessage::Message(_) => "message",
            ServerMessage::ToolCall(_) => "tool_call",
            ServerMessage::Report(_) => "report",
            ServerMessage::Complete(_) => "complete",
            ServerMessage::Error(_) => "error",
            ServerMessage::Pong => "pong",
            ServerMessage::Unknown(kind) => kind,
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &str, data: serde_json::Value) -> Result<T> {
    // `data` may be absent for payloads whose fields are all optional
    let data = if data.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        data
    };
    serde_json::from_value(data)
        .map_err(|e| BoardError::ProtocolDecode(format!("invalid '{}' payload: {}", kind, e)))
}

/// Decode one inbound text frame
pub fn decode_frame(text: &str) -> Result<ServerMessage> {
    let raw: RawEnvelope = serde_json::from_str(text)
        .map_err(|e| BoardError::ProtocolDecode(format!("malformed envelope: {}", e)))?;

    let message = match raw.kind.as_str() {
        "status" => ServerMessage::Status(payload(&raw.kind, raw.data)?),
        "message" => ServerMessage::Message(payload(&raw.kind, raw.data)?),
        "tool_call" => ServerMessage::ToolCall(payload(&raw.kind, raw.data)?),
        "report" => ServerMessage::Report(payload(&raw.kind, raw.data)?),
        "complete" => ServerMessage::Complete(payload(&raw.kind, raw.data)?),
        "error" => ServerMessage::Error(payload(&raw.kind, raw.data)?),
        "pong" => ServerMessage::Pong,
        _ => ServerMessage::Unknown(raw.kind),
    };

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalystKind, ReportLength};
    use serde_json::json;

    #[test]
    fn test_start_envelope_shape() {
        let req = RunRequest::builder("aapl", "2025-11-25")
            .report_length(ReportLength::Short)
            .analysts([AnalystKind::News, AnalystKind::Market])
            .build()
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&ClientEnvelope::start(&req).to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "action": "start_analysis",
                "request": {
                    "ticker": "AAPL",
                    "analysis_date": "2025-11-25",
                    "report_length": "short",
                    "analysts": ["market", "news"],
                    "research_depth": 3,
                    "llm_provider": "google",
                    "backend_url": "https://generativelanguage.googleapis.com/v1",
                    "shallow_thinker": "gemini-2.0-flash-lite",
                    "deep_thinker": "gemini-2.0-flash-lite"
                }
            })
        );
    }

    #[test]
    fn test_control_envelopes() {
        assert_eq!(
            ClientEnvelope::StopAnalysis.to_json().unwrap(),
            r#"{"action":"stop_analysis"}"#
        );
        assert_eq!(ClientEnvelope::Ping.to_json().unwrap(), r#"{"action":"ping"}"#);
    }

    #[test]
    fn test_decode_status_with_timestamp() {
        let msg = decode_frame(
            r#"{"type":"status","data":{"agents":{"Market Analyst":"completed"}},"timestamp":"2025-11-25T10:00:00"}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::Status(status) => {
                assert_eq!(status.agents.get("Market Analyst").unwrap(), "completed")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_report_and_label_fallback() {
        let msg = decode_frame(r#"{"type":"report","data":{"section":"news","content":"x"}}"#).unwrap();
        let ServerMessage::Report(report) = msg else {
            panic!("expected report");
        };
        let section = report.into_section();
        assert_eq!(section.label, "news");
    }

    #[test]
    fn test_decode_complete_without_data() {
        let msg = decode_frame(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Complete(CompletePayload::default()));
    }

    #[test]
    fn test_unknown_kind_is_forward_compatible() {
        let msg = decode_frame(r#"{"type":"heartbeat","data":{}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown("heartbeat".into()));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            decode_frame("{not json"),
            Err(BoardError::ProtocolDecode(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"data":{}}"#),
            Err(BoardError::ProtocolDecode(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"report","data":{"section":"x"}}"#),
            Err(BoardError::ProtocolDecode(_))
        ));
    }
}
