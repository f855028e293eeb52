//! Typed v2 command catalog and dispatcher

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use scoreboard_core::prelude::*;
use scoreboard_core::TeamId;

use crate::protocol::CommandFrame;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAdapter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    pub template_id: String,
    /// Template values to override, e.g. `periodLengthMinutes`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPenalty {
    pub team_id: TeamId,
    pub player_number: u32,
    pub serving_player_number: u32,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePenalty {
    pub penalty_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_by_goal_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddGoal {
    pub team_id: TeamId,
    pub scorer_number: u32,
    #[serde(default)]
    pub assist_numbers: Vec<u32>,
    #[serde(default)]
    pub is_empty_net: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_penalty_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Client-to-server intent. No identity, no acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartClock,
    PauseClock,
    Tick,
    EndGame,
    ResetGame,
    TriggerBuzzer,
    StopAdapter,
    GetPorts,
    StartAdapter(StartAdapter),
    CreateGame(CreateGame),
    AddPenalty(AddPenalty),
    ReleasePenalty(ReleasePenalty),
    CancelPenalty { penalty_id: String },
    AddGoal(AddGoal),
    RemoveGoal { goal_id: String },
    AddShot { team_id: TeamId },
    UndoLastShot { team_id: TeamId },
    SetPeriod { period: u32 },
    SetClock { time_millis: i64 },
    /// Any command name with an arbitrary payload
    Custom {
        name: String,
        payload: Option<Value>,
    },
}

impl Command {
    /// Wire name carried in the `command` field
    pub fn name(&self) -> &str {
        match self {
            Command::StartClock => "START_CLOCK",
            Command::PauseClock => "PAUSE_CLOCK",
            Command::Tick => "TICK",
            Command::EndGame => "END_GAME",
            Command::ResetGame => "RESET_GAME",
            Command::TriggerBuzzer => "TRIGGER_BUZZER",
            Command::StopAdapter => "STOP_ADAPTER",
            Command::GetPorts => "GET_PORTS",
            Command::StartAdapter(_) => "START_ADAPTER",
            Command::CreateGame(_) => "CREATE_GAME",
            Command::AddPenalty(_) => "ADD_PENALTY",
            Command::ReleasePenalty(_) => "RELEASE_PENALTY",
            Command::CancelPenalty { .. } => "CANCEL_PENALTY",
            Command::AddGoal(_) => "ADD_GOAL",
            Command::RemoveGoal { .. } => "REMOVE_GOAL",
            Command::AddShot { .. } => "ADD_SHOT",
            Command::UndoLastShot { .. } => "UNDO_LAST_SHOT",
            Command::SetPeriod { .. } => "SET_PERIOD",
            Command::SetClock { .. } => "SET_CLOCK",
            Command::Custom { name, .. } => name.as_str(),
        }
    }

    /// Payload object, or `None` for payload-less commands
    pub fn payload(&self) -> Result<Option<Value>> {
        let value = match self {
            Command::StartClock
            | Command::PauseClock
            | Command::Tick
            | Command::EndGame
            | Command::ResetGame
            | Command::TriggerBuzzer
            | Command::StopAdapter
            | Command::GetPorts => return Ok(None),
            Command::StartAdapter(p) => serde_json::to_value(p)?,
            Command::CreateGame(p) => serde_json::to_value(p)?,
            Command::AddPenalty(p) => serde_json::to_value(p)?,
            Command::ReleasePenalty(p) => serde_json::to_value(p)?,
            Command::AddGoal(p) => serde_json::to_value(p)?,
            Command::CancelPenalty { penalty_id } => serde_json::json!({ "penaltyId": penalty_id }),
            Command::RemoveGoal { goal_id } => serde_json::json!({ "goalId": goal_id }),
            Command::AddShot { team_id } | Command::UndoLastShot { team_id } => {
                serde_json::json!({ "teamId": team_id })
            }
            Command::SetPeriod { period } => serde_json::json!({ "period": period }),
            Command::SetClock { time_millis } => serde_json::json!({ "timeMillis": time_millis }),
            Command::Custom { payload, .. } => return Ok(payload.clone()),
        };
        Ok(Some(value))
    }

    /// Build a command from a wire name and optional payload.
    ///
    /// Known names are decoded into their typed variant; anything else
    /// becomes [`Command::Custom`].
    pub fn from_parts(name: &str, payload: Option<Value>) -> Result<Command> {
        fn field<T: serde::de::DeserializeOwned>(payload: &Option<Value>, key: &str) -> Result<T> {
            let value = payload
                .as_ref()
                .and_then(|p| p.get(key))
                .cloned()
                .ok_or_else(|| Error::protocol(format!("missing payload field '{key}'")))?;
            Ok(serde_json::from_value(value)?)
        }
        fn body<T: serde::de::DeserializeOwned>(payload: Option<Value>, name: &str) -> Result<T> {
            let value =
                payload.ok_or_else(|| Error::protocol(format!("{name} requires a payload")))?;
            Ok(serde_json::from_value(value)?)
        }

        let command = match name {
            "START_CLOCK" => Command::StartClock,
            "PAUSE_CLOCK" => Command::PauseClock,
            "TICK" => Command::Tick,
            "END_GAME" => Command::EndGame,
            "RESET_GAME" => Command::ResetGame,
            "TRIGGER_BUZZER" => Command::TriggerBuzzer,
            "STOP_ADAPTER" => Command::StopAdapter,
            "GET_PORTS" => Command::GetPorts,
            "START_ADAPTER" => Command::StartAdapter(match payload {
                Some(p) => serde_json::from_value(p)?,
                None => StartAdapter::default(),
            }),
            "CREATE_GAME" => Command::CreateGame(body(payload, name)?),
            "ADD_PENALTY" => Command::AddPenalty(body(payload, name)?),
            "RELEASE_PENALTY" => Command::ReleasePenalty(body(payload, name)?),
            "ADD_GOAL" => Command::AddGoal(body(payload, name)?),
            "CANCEL_PENALTY" => Command::CancelPenalty {
                penalty_id: field(&payload, "penaltyId")?,
            },
            "REMOVE_GOAL" => Command::RemoveGoal {
                goal_id: field(&payload, "goalId")?,
            },
            "ADD_SHOT" => Command::AddShot {
                team_id: field(&payload, "teamId")?,
            },
            "UNDO_LAST_SHOT" => Command::UndoLastShot {
                team_id: field(&payload, "teamId")?,
            },
            "SET_PERIOD" => Command::SetPeriod {
                period: field(&payload, "period")?,
            },
            "SET_CLOCK" => Command::SetClock {
                time_millis: field(&payload, "timeMillis")?,
            },
            other => Command::Custom {
                name: other.to_string(),
                payload,
            },
        };
        Ok(command)
    }

    /// Serialize into a `COMMAND` frame
    pub fn to_frame(&self) -> Result<CommandFrame> {
        Ok(CommandFrame::new(self.name(), self.payload()?))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// What to do with a command issued while the socket is not open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandPolicy {
    /// Drop it with a log line
    #[default]
    #[serde(alias = "drop_when_disconnected")]
    Drop,
    /// Queue it and flush on the next open
    #[serde(alias = "queue_until_open")]
    Queue,
}

/// Serializes commands and hands them to the transport
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    transport: Transport,
    policy: CommandPolicy,
}

impl CommandDispatcher {
    pub fn new(transport: Transport, policy: CommandPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> CommandPolicy {
        self.policy
    }

    /// Send `command`. Never fails; encoding problems and drops are logged.
    ///
    /// Returns `true` when the frame was handed to the transport (sent, or
    /// queued under [`CommandPolicy::Queue`]).
    pub fn send(&self, command: &Command) -> bool {
        let frame = match command.to_frame().and_then(|f| f.encode()) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Failed to encode {} command: {}", command.name(), err);
                return false;
            }
        };
        debug!("Sending {} command", command.name());
        match self.policy {
            CommandPolicy::Drop => self.transport.send_if_open(frame),
            CommandPolicy::Queue => {
                self.transport.send_frame(frame);
                true
            }
        }
    }
}
