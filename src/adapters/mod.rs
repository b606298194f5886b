pub mod analysis_ws;
pub mod endpoint;

pub use analysis_ws::{
    ChannelConnector, Connection, ConnectionId, Connector, InboundEvent, PeerHandle, WsConnector,
};
pub use endpoint::{resolve_endpoint, select_endpoint, PageOrigin, LOCAL_ENDPOINT};
