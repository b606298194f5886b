//! Backend endpoint resolution from the page (or configured) origin.

use url::Url;

use crate::error::{BoardError, Result};

/// Used when there is no usable host, e.g. a dashboard opened from disk
pub const LOCAL_ENDPOINT: &str = "ws://localhost:8000/ws";

const WS_PATH: &str = "/ws";
const DEFAULT_PLAIN_PORT: u16 = 8000;
const DEFAULT_TLS_PORT: u16 = 443;

/// Where the dashboard was served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl PageOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse an origin such as `https://dash.example.com` or `file:///tmp/index.html`
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin)
            .map_err(|e| BoardError::Validation(format!("Invalid page origin '{}': {}", origin, e)))?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port(),
        })
    }

    fn is_tls(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }
}

/// Map a page origin onto the backend's WebSocket endpoint
pub fn resolve_endpoint(origin: &PageOrigin) -> String {
    if origin.scheme.eq_ignore_ascii_case("file") || origin.host.trim().is_empty() {
        return LOCAL_ENDPOINT.to_string();
    }

    let (scheme, fallback_port) = if origin.is_tls() {
        ("wss", DEFAULT_TLS_PORT)
    } else {
        ("ws", DEFAULT_PLAIN_PORT)
    };
    let port = origin.port.unwrap_or(fallback_port);

    format!("{}://{}:{}{}", scheme, origin.host, port, WS_PATH)
}

/// Explicit `ws_url` wins, then the page origin, then the local default
pub fn select_endpoint(ws_url: Option<&str>, page_origin: Option<&str>) -> Result<String> {
    if let Some(url) = ws_url.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(url.to_string());
    }
    match page_origin.map(str::trim).filter(|o| !o.is_empty()) {
        Some(origin) => Ok(resolve_endpoint(&PageOrigin::parse(origin)?)),
        None => Ok(LOCAL_ENDPOINT.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_maps_to_wss_with_default_port() {
        let origin = PageOrigin::parse("https://dash.example.com").unwrap();
        assert_eq!(resolve_endpoint(&origin), "wss://dash.example.com:443/ws");
    }

    #[test]
    fn test_http_keeps_explicit_port() {
        let origin = PageOrigin::parse("http://10.0.0.5:9000/index.html").unwrap();
        assert_eq!(resolve_endpoint(&origin), "ws://10.0.0.5:9000/ws");
    }

    #[test]
    fn test_http_without_port_uses_backend_default() {
        let origin = PageOrigin::new("http", "analysis.local", None);
        assert_eq!(resolve_endpoint(&origin), "ws://analysis.local:8000/ws");
    }

    #[test]
    fn test_file_origin_goes_local() {
        let origin = PageOrigin::parse("file:///home/me/dashboard/index.html").unwrap();
        assert_eq!(resolve_endpoint(&origin), LOCAL_ENDPOINT);
        assert_eq!(
            resolve_endpoint(&PageOrigin::new("http", "", None)),
            LOCAL_ENDPOINT
        );
    }

    #[test]
    fn test_select_endpoint_precedence() {
        assert_eq!(
            select_endpoint(Some("ws://override:1/ws"), Some("https://x.com")).unwrap(),
            "ws://override:1/ws"
        );
        assert_eq!(
            select_endpoint(Some("  "), Some("https://x.com")).unwrap(),
            "wss://x.com:443/ws"
        );
        assert_eq!(select_endpoint(None, None).unwrap(), LOCAL_ENDPOINT);
        assert!(select_endpoint(None, Some("::not a url")).is_err());
    }
}
