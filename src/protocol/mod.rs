//! Message protocol spoken with the analysis backend.

pub mod dispatcher;
pub mod envelope;

pub use dispatcher::{
    translate_status, AgentUpdate, Decoded, Dispatcher, ProtocolHandler,
    DEFAULT_DECODE_FAILURE_THRESHOLD,
};
pub use envelope::{
    decode_frame, ClientEnvelope, CompletePayload, ErrorPayload, ReportPayload, ServerMessage,
    StartAnalysisRequest, StatusPayload,
};
