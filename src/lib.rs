pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod report;
pub mod services;
pub mod session;

pub use adapters::{Connection, ConnectionId, Connector, InboundEvent, WsConnector};
pub use config::AppConfig;
pub use domain::{
    AgentStatus, AnalystKind, ReportLength, ResearchDepth, RunRequest, SessionPhase, TeamBoard,
    TeamKind,
};
pub use error::{BoardError, Result};
pub use session::{SessionController, SessionSettings, SessionSnapshot, SessionUpdate};
