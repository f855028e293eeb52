//! Configuration types for Scoreboard Control
//!
//! Defines:
//! - `Settings` - contents of `.scoreboard/config.toml`
//! - One section type per table: connection, reconnect, commands, api

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scoreboard_client::{
    BackoffConfig, ClientOptions, CommandPolicy, EndpointOverrides, PageLocation,
    ProtocolVersion,
};
use scoreboard_core::prelude::*;

/// Global settings from `.scoreboard/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub commands: CommandSettings,

    #[serde(default)]
    pub api: ApiSettings,
}

/// Where and how to connect
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Wire dialect: "v2" or "legacy"
    #[serde(default)]
    pub protocol: ProtocolVersion,

    /// Full socket URL; used verbatim when non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Location of the control page; supplies scheme, hostname and the
    /// `socketHost`/`socketPort` query parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

/// Reconnect backoff
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CommandSettings {
    /// "drop" sends commands only while open; "queue" holds them until open
    #[serde(default)]
    pub policy: CommandPolicy,
}

/// REST collaborator
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Settings {
    /// Replace out-of-range values with defaults, logging each fix
    pub fn validate(&mut self) {
        if self.reconnect.initial_delay_ms == 0 {
            warn!("reconnect.initial_delay_ms must be positive; using default");
            self.reconnect.initial_delay_ms = default_initial_delay_ms();
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            warn!(
                "reconnect.max_delay_ms ({}) is below initial_delay_ms ({}); raising it",
                self.reconnect.max_delay_ms, self.reconnect.initial_delay_ms
            );
            self.reconnect.max_delay_ms = self.reconnect.initial_delay_ms;
        }
        if self.api.base_url.trim().is_empty() {
            warn!("api.base_url is empty; using default");
            self.api.base_url = default_api_base_url();
        }
    }

    /// Page location from `connection.page_url`, or localhost when unset
    /// or unparseable
    pub fn page_location(&self) -> PageLocation {
        match self.connection.page_url.as_deref().map(str::trim) {
            Some(href) if !href.is_empty() => PageLocation::parse(href).unwrap_or_else(|e| {
                warn!("Ignoring connection.page_url: {}", e);
                PageLocation::localhost()
            }),
            _ => PageLocation::localhost(),
        }
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial: Duration::from_millis(self.reconnect.initial_delay_ms),
            max: Duration::from_millis(self.reconnect.max_delay_ms),
        }
    }

    /// Options for a client built from these settings
    pub fn client_options(&self) -> ClientOptions {
        let non_empty = |value: &Option<String>| {
            value
                .as_ref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        ClientOptions {
            page: self.page_location(),
            endpoint: EndpointOverrides {
                url: non_empty(&self.connection.url),
                host: non_empty(&self.connection.host),
                port: self.connection.port.map(|p| p.to_string()),
                path: non_empty(&self.connection.path),
            },
            backoff: self.backoff(),
            command_policy: self.commands.policy,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.connection.protocol, ProtocolVersion::V2);
        assert_eq!(settings.reconnect.initial_delay_ms, 500);
        assert_eq!(settings.reconnect.max_delay_ms, 5000);
        assert_eq!(settings.commands.policy, CommandPolicy::Drop);
        assert_eq!(settings.api.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[connection]
protocol = "legacy"

[reconnect]
max_delay_ms = 8000
"#,
        )
        .unwrap();

        assert_eq!(settings.connection.protocol, ProtocolVersion::Legacy);
        assert_eq!(settings.reconnect.initial_delay_ms, 500);
        assert_eq!(settings.reconnect.max_delay_ms, 8000);
    }

    #[test]
    fn test_policy_accepts_long_names() {
        let settings: Settings =
            toml::from_str("[commands]\npolicy = \"queue_until_open\"\n").unwrap();
        assert_eq!(settings.commands.policy, CommandPolicy::Queue);
    }

    #[test]
    fn test_validate_repairs_delays() {
        let mut settings = Settings::default();
        settings.reconnect.initial_delay_ms = 0;
        settings.reconnect.max_delay_ms = 100;
        settings.validate();

        assert_eq!(settings.reconnect.initial_delay_ms, 500);
        assert_eq!(settings.reconnect.max_delay_ms, 500);
    }

    #[test]
    fn test_client_options_resolve_url() {
        let mut settings = Settings::default();
        settings.connection.page_url = Some("https://rink.local/control?socketPort=9000".into());
        settings.connection.path = Some("".into());

        let options = settings.client_options();
        assert_eq!(options.endpoint.path, None);
        assert_eq!(
            options.resolve_url(ProtocolVersion::V2).unwrap(),
            "wss://rink.local:9000/"
        );
    }

    #[test]
    fn test_port_override_beats_page_query() {
        let mut settings = Settings::default();
        settings.connection.page_url = Some("http://rink.local/?socketPort=9000".into());
        settings.connection.port = Some(7000);

        let url = settings
            .client_options()
            .resolve_url(ProtocolVersion::Legacy)
            .unwrap();
        assert_eq!(url, "ws://rink.local:7000/ws");
    }

    #[test]
    fn test_bad_page_url_falls_back_to_localhost() {
        let mut settings = Settings::default();
        settings.connection.page_url = Some("::not a url::".into());
        assert_eq!(settings.page_location(), PageLocation::localhost());
    }
}
