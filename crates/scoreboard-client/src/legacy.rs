//! Typed runtime for the legacy `{event, data}` dialect

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scoreboard_core::prelude::*;
use scoreboard_core::TeamId;

use crate::client::ClientOptions;
use crate::protocol::ProtocolVersion;
use crate::transport::{Connector, Transport, TransportOptions, TungsteniteConnector};

/// Team code used by legacy payloads (`"home"` / `"away"`)
pub type TeamCode = TeamId;

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPayload {
    pub team: TeamCode,
}

/// Player reference; the server accepts numbers or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayerRef {
    Number(u32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPayload {
    pub team: TeamCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assist: Option<PlayerRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGamePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_lengths: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermission_duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buzzer_interval_seconds: Option<u32>,
}

/// Every event the legacy server accepts
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    ClockStart,
    ClockPause,
    Goal(GoalPayload),
    UndoGoal(TeamPayload),
    Shot(TeamPayload),
    UndoShot(TeamPayload),
    Buzzer,
    PowerOn,
    PowerOff,
    PowerState,
    SetPeriod { period: u32 },
    ExitIntermission,
    CreateGame(CreateGamePayload),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::ClockStart => "clock_start",
            OutboundEvent::ClockPause => "clock_pause",
            OutboundEvent::Goal(_) => "goal",
            OutboundEvent::UndoGoal(_) => "undo_goal",
            OutboundEvent::Shot(_) => "shot",
            OutboundEvent::UndoShot(_) => "undo_shot",
            OutboundEvent::Buzzer => "buzzer",
            OutboundEvent::PowerOn => "power_on",
            OutboundEvent::PowerOff => "power_off",
            OutboundEvent::PowerState => "power_state",
            OutboundEvent::SetPeriod { .. } => "set_period",
            OutboundEvent::ExitIntermission => "exit_intermission",
            OutboundEvent::CreateGame(_) => "createGame",
        }
    }

    pub fn data(&self) -> Result<Option<Value>> {
        let value = match self {
            OutboundEvent::Goal(p) => serde_json::to_value(p)?,
            OutboundEvent::UndoGoal(p) | OutboundEvent::Shot(p) | OutboundEvent::UndoShot(p) => {
                serde_json::to_value(p)?
            }
            OutboundEvent::SetPeriod { period } => serde_json::json!({ "period": period }),
            OutboundEvent::CreateGame(p) => serde_json::to_value(p)?,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamUpdate {
    pub score: u32,
    pub shots: Option<u32>,
    pub penalties: Vec<Value>,
    pub goals: Option<Vec<Value>>,
}

/// Periodic full-state broadcast (`update`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateEvent {
    /// Remaining time in the period, milliseconds
    pub time: i64,
    pub running: bool,
    pub period: u32,
    pub period_length: u32,
    pub scoreboard_on: bool,
    pub buzzer_on: bool,
    pub home: TeamUpdate,
    pub away: TeamUpdate,
}

/// Scoreboard power broadcast (`power`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerEvent {
    pub scoreboard_on: bool,
}

// ---------------------------------------------------------------------------
// Socket + actions
// ---------------------------------------------------------------------------

/// Typed event registration and emission over a legacy transport
#[derive(Debug, Clone)]
pub struct ServerSocket {
    transport: Transport,
}

impl ServerSocket {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Handle `update` broadcasts. Payloads that do not decode are logged
    /// and dropped.
    pub fn on_update<F>(&self, handler: F)
    where
        F: Fn(UpdateEvent) + Send + Sync + 'static,
    {
        self.transport.on("update", move |data| {
            match serde_json::from_value::<UpdateEvent>(data.clone()) {
                Ok(update) => handler(update),
                Err(err) => warn!("Dropping malformed update event: {}", err),
            }
        });
    }

    pub fn on_power<F>(&self, handler: F)
    where
        F: Fn(PowerEvent) + Send + Sync + 'static,
    {
        self.transport.on("power", move |data| {
            match serde_json::from_value::<PowerEvent>(data.clone()) {
                Ok(power) => handler(power),
                Err(err) => warn!("Dropping malformed power event: {}", err),
            }
        });
    }

    /// Handle free-form `message` broadcasts
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.transport.on("message", handler);
    }

    pub fn emit(&self, event: &OutboundEvent) {
        match event.data() {
            Ok(data) => self.transport.emit(event.name(), data),
            Err(err) => warn!("Failed to encode '{}' event: {}", event.name(), err),
        }
    }
}

/// Named server actions, each mapped onto one emitted event
#[derive(Debug, Clone)]
pub struct ServerActions {
    socket: ServerSocket,
}

impl ServerActions {
    pub fn new(socket: ServerSocket) -> Self {
        Self { socket }
    }

    pub fn start_clock(&self) {
        self.socket.emit(&OutboundEvent::ClockStart);
    }

    pub fn pause_clock(&self) {
        self.socket.emit(&OutboundEvent::ClockPause);
    }

    pub fn goal(&self, payload: GoalPayload) {
        self.socket.emit(&OutboundEvent::Goal(payload));
    }

    pub fn undo_goal(&self, payload: TeamPayload) {
        self.socket.emit(&OutboundEvent::UndoGoal(payload));
    }

    pub fn shot(&self, payload: TeamPayload) {
        self.socket.emit(&OutboundEvent::Shot(payload));
    }

    pub fn undo_shot(&self, payload: TeamPayload) {
        self.socket.emit(&OutboundEvent::UndoShot(payload));
    }

    pub fn buzzer(&self) {
        self.socket.emit(&OutboundEvent::Buzzer);
    }

    pub fn power_on(&self) {
        self.socket.emit(&OutboundEvent::PowerOn);
    }

    pub fn power_off(&self) {
        self.socket.emit(&OutboundEvent::PowerOff);
    }

    pub fn power_state(&self) {
        self.socket.emit(&OutboundEvent::PowerState);
    }

    pub fn set_period(&self, period: u32) {
        self.socket.emit(&OutboundEvent::SetPeriod { period });
    }

    pub fn exit_intermission(&self) {
        self.socket.emit(&OutboundEvent::ExitIntermission);
    }

    pub fn create_game(&self, payload: CreateGamePayload) {
        self.socket.emit(&OutboundEvent::CreateGame(payload));
    }
}

/// Transport, typed socket and actions for one legacy connection
#[derive(Debug, Clone)]
pub struct LegacyRuntime {
    pub transport: Transport,
    pub socket: ServerSocket,
    pub server: ServerActions,
}

impl LegacyRuntime {
    /// Connect over real WebSockets. Must be called within a tokio runtime.
    pub fn create(options: ClientOptions) -> Result<Self> {
        Self::with_connector(options, TungsteniteConnector)
    }

    pub fn with_connector<C>(options: ClientOptions, connector: C) -> Result<Self>
    where
        C: Connector + Sync + 'static,
    {
        let url = options.resolve_url(ProtocolVersion::Legacy)?;
        let transport = Transport::builder(TransportOptions {
            url,
            backoff: options.backoff,
            dialect: ProtocolVersion::Legacy,
        })
        .on_status(options.status)
        .spawn(connector);

        let socket = ServerSocket::new(transport.clone());
        let server = ServerActions::new(socket.clone());
        Ok(Self {
            transport,
            socket,
            server,
        })
    }

    pub fn close(&self) {
        self.transport.close();
    }

    pub async fn wait_closed(&self) {
        self.transport.wait_closed().await;
    }
}
