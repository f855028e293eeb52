//! Headless mode - NDJSON event output
//!
//! `scorectl` writes everything it observes to stdout as newline-delimited
//! JSON, one event per line, so scripts can follow the scoreboard without
//! parsing human-oriented text. Logs go to a file instead.
//!
//! # Example Output
//!
//! ```json
//! {"event":"connection","state":"connecting","timestamp":1704700001000}
//! {"event":"connection","state":"open","timestamp":1704700001042}
//! {"event":"state","state":{"period":1,"status":"PLAYING"},"timestamp":1704700001050}
//! ```

pub mod runner;

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use scoreboard_core::{ConnectionState, PortList};

/// Events emitted in headless mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Connection state changed
    Connection {
        state: ConnectionState,
        timestamp: i64,
    },

    /// New snapshot (v2)
    State { state: Value, timestamp: i64 },

    /// Serial port listing (v2 push or REST)
    Ports {
        ports: Vec<String>,
        current_port: String,
        timestamp: i64,
    },

    /// Periodic full-state broadcast (legacy)
    Update { data: Value, timestamp: i64 },

    /// Scoreboard power broadcast (legacy)
    Power { scoreboard_on: bool, timestamp: i64 },

    /// Free-form server message (legacy)
    Message { data: Value, timestamp: i64 },

    /// A command frame was handed to the transport
    CommandSent {
        command: String,
        payload: Option<Value>,
        timestamp: i64,
    },

    /// A legacy event frame was handed to the transport
    EventSent {
        name: String,
        data: Option<Value>,
        timestamp: i64,
    },

    /// REST response body
    Response { data: Value, timestamp: i64 },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let json = serde_json::to_string(self).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn connection(state: ConnectionState) -> Self {
        Self::Connection {
            state,
            timestamp: Self::now(),
        }
    }

    pub fn state(state: Value) -> Self {
        Self::State {
            state,
            timestamp: Self::now(),
        }
    }

    pub fn ports(list: &PortList) -> Self {
        Self::Ports {
            ports: list.ports.clone(),
            current_port: list.current_port.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn update(data: Value) -> Self {
        Self::Update {
            data,
            timestamp: Self::now(),
        }
    }

    pub fn power(scoreboard_on: bool) -> Self {
        Self::Power {
            scoreboard_on,
            timestamp: Self::now(),
        }
    }

    pub fn message(data: Value) -> Self {
        Self::Message {
            data,
            timestamp: Self::now(),
        }
    }

    pub fn command_sent(command: &str, payload: Option<Value>) -> Self {
        Self::CommandSent {
            command: command.to_string(),
            payload,
            timestamp: Self::now(),
        }
    }

    pub fn event_sent(name: &str, data: Option<Value>) -> Self {
        Self::EventSent {
            name: name.to_string(),
            data,
            timestamp: Self::now(),
        }
    }

    pub fn response(data: Value) -> Self {
        Self::Response {
            data,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
