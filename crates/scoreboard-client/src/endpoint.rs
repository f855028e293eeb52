//! WebSocket URL resolution
//!
//! The socket URL is derived from the location of the control page (scheme,
//! hostname and the `socketHost`/`socketPort` query parameters) plus any
//! explicit overrides. Resolution happens once, when a client is created.

use url::{Host, Url};

use scoreboard_core::prelude::*;

use crate::protocol::ProtocolVersion;

/// Port used when neither an override nor the page supplies one.
pub const DEFAULT_PORT: u16 = 8082;

/// The page the control panel is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub secure: bool,
    pub hostname: String,
    pub socket_host: Option<String>,
    pub socket_port: Option<String>,
}

impl PageLocation {
    /// Parse a page URL such as `https://rink.local/control?socketPort=9000`
    pub fn parse(href: &str) -> Result<Self> {
        let url = Url::parse(href).map_err(|e| Error::endpoint(format!("{href}: {e}")))?;

        let hostname = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        };

        let query = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            secure: url.scheme() == "https",
            hostname,
            socket_host: query("socketHost"),
            socket_port: query("socketPort"),
        })
    }

    pub fn localhost() -> Self {
        Self {
            secure: false,
            hostname: "localhost".to_string(),
            socket_host: None,
            socket_port: None,
        }
    }
}

impl Default for PageLocation {
    fn default() -> Self {
        Self::localhost()
    }
}

/// Explicit settings that take precedence over the page location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointOverrides {
    /// Full URL; used verbatim when non-blank
    pub url: Option<String>,
    pub host: Option<String>,
    /// Kept as text so that a non-numeric value can be ignored
    pub port: Option<String>,
    pub path: Option<String>,
}

/// Resolve the socket URL for `dialect`.
///
/// Precedence: a non-blank full URL override wins outright. Otherwise the
/// scheme follows the page (`wss` for `https:` pages), the host comes from
/// the override, the `socketHost` query parameter or the page hostname, the
/// port from the override, `socketPort` or [`DEFAULT_PORT`], and the path from
/// the override or the dialect default.
pub fn resolve_url(
    dialect: ProtocolVersion,
    page: &PageLocation,
    overrides: &EndpointOverrides,
) -> Result<String> {
    if let Some(explicit) = non_blank(overrides.url.as_deref()) {
        validate(explicit)?;
        return Ok(explicit.to_string());
    }

    let scheme = if page.secure { "wss" } else { "ws" };

    let host = non_blank(overrides.host.as_deref())
        .or_else(|| non_blank(page.socket_host.as_deref()))
        .unwrap_or(page.hostname.as_str());
    let host = format_host(host);

    let port = parse_port(overrides.port.as_deref(), "port override")
        .or_else(|| parse_port(page.socket_port.as_deref(), "socketPort"))
        .unwrap_or(DEFAULT_PORT);

    let path = match overrides.path.as_deref() {
        Some(path) if path.starts_with('/') => path.to_string(),
        Some(path) => format!("/{path}"),
        None => dialect.default_path().to_string(),
    };

    let resolved = format!("{scheme}://{host}:{port}{path}");
    validate(&resolved)?;
    debug!("Resolved socket URL: {}", resolved);
    Ok(resolved)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn format_host(host: &str) -> String {
    if host.is_empty() {
        "localhost".to_string()
    } else if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

fn parse_port(raw: Option<&str>, source: &str) -> Option<u16> {
    let raw = non_blank(raw)?;
    match raw.parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("Ignoring invalid {} '{}'", source, raw);
            None
        }
    }
}

fn validate(candidate: &str) -> Result<()> {
    let url = Url::parse(candidate).map_err(|e| Error::endpoint(format!("{candidate}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(Error::endpoint(format!(
            "{candidate}: unsupported scheme '{other}'"
        ))),
    }
}
