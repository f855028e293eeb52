//! Typed view of the v2 game state
//!
//! The mirrored [`Snapshot`] stays schema-agnostic; these types decode it on
//! demand. Every field defaults so partially populated snapshots still
//! decode.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamId {
    Home,
    Away,
}

impl TeamId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamId::Home => "home",
            TeamId::Away => "away",
        }
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TeamId {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "home" => Ok(TeamId::Home),
            "away" => Ok(TeamId::Away),
            other => Err(crate::error::Error::protocol(format!(
                "unknown team '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    PreGame,
    ReadyForPeriod,
    Playing,
    Paused,
    Intermission,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClockType {
    #[default]
    StopTime,
    RunningTime,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub template_id: String,
    pub warmup_length_minutes: u32,
    pub period_length_minutes: u32,
    pub intermission_length_minutes: u32,
    pub periods: u32,
    pub clock_type: ClockType,
    pub shift_length_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClockState {
    pub time_remaining_millis: i64,
    pub is_running: bool,
    pub start_time_wall_clock: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalEvent {
    pub goal_id: String,
    pub team_id: TeamId,
    #[serde(default)]
    pub period: u32,
    #[serde(default)]
    pub time_in_period_millis: i64,
    #[serde(default)]
    pub scorer_number: u32,
    #[serde(default)]
    pub assist_numbers: Vec<u32>,
    #[serde(default)]
    pub is_empty_net: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    pub penalty_id: String,
    pub team_id: TeamId,
    #[serde(default)]
    pub player_number: u32,
    #[serde(default)]
    pub serving_player_number: u32,
    #[serde(default)]
    pub duration_millis: i64,
    #[serde(default)]
    pub time_remaining_millis: i64,
    #[serde(default)]
    pub start_time_wall_clock: i64,
    #[serde(default)]
    pub period: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamState {
    pub goals: Vec<GoalEvent>,
    pub shots: u32,
    pub penalties: Vec<Penalty>,
}

impl TeamState {
    /// Score is derived from the goal list
    pub fn score(&self) -> usize {
        self.goals.len()
    }

    /// Penalties still counting down
    pub fn active_penalties(&self) -> impl Iterator<Item = &Penalty> {
        self.penalties.iter().filter(|p| p.time_remaining_millis > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameState {
    pub game_id: Option<String>,
    pub config: Option<GameConfig>,
    pub status: GameStatus,
    pub period: u32,
    pub clock: ClockState,
    pub home: TeamState,
    pub away: TeamState,
    pub buzzer_on: bool,
    pub event_history: Vec<serde_json::Value>,
}

impl GameState {
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        snapshot.decode()
    }

    pub fn team(&self, team: TeamId) -> &TeamState {
        match team {
            TeamId::Home => &self.home,
            TeamId::Away => &self.away,
        }
    }
}

/// Serial port listing reported by the server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortList {
    pub ports: Vec<String>,
    pub current_port: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_state() {
        let snap = Snapshot::from_value(json!({
            "gameId": "g-1",
            "config": {
                "templateId": "standard",
                "periodLengthMinutes": 20,
                "periods": 3,
                "clockType": "RUNNING_TIME"
            },
            "status": "PLAYING",
            "period": 2,
            "clock": { "timeRemainingMillis": 450000, "isRunning": true, "startTimeWallClock": 17 },
            "home": {
                "goals": [{
                    "goalId": "a", "teamId": "home", "period": 1,
                    "timeInPeriodMillis": 1000, "scorerNumber": 9,
                    "assistNumbers": [17, 4], "isEmptyNet": false
                }],
                "shots": 12,
                "penalties": []
            },
            "away": { "goals": [], "shots": 8, "penalties": [{
                "penaltyId": "p", "teamId": "away", "playerNumber": 3,
                "servingPlayerNumber": 3, "durationMillis": 120000,
                "timeRemainingMillis": 60000, "startTimeWallClock": 0, "period": 2
            }]},
            "buzzerOn": false,
            "eventHistory": []
        }));

        let state = GameState::from_snapshot(&snap).unwrap();
        assert_eq!(state.game_id.as_deref(), Some("g-1"));
        assert_eq!(state.status, GameStatus::Playing);
        assert_eq!(
            state.config.as_ref().map(|c| c.clock_type),
            Some(ClockType::RunningTime)
        );
        assert!(state.clock.is_running);
        assert_eq!(state.home.score(), 1);
        assert_eq!(state.home.goals[0].assist_numbers, vec![17, 4]);
        assert_eq!(state.team(TeamId::Away).active_penalties().count(), 1);
    }

    #[test]
    fn test_decode_partial_state_uses_defaults() {
        let snap = Snapshot::from_value(json!({ "period": 1 }));
        let state = GameState::from_snapshot(&snap).unwrap();
        assert_eq!(state.period, 1);
        assert_eq!(state.status, GameStatus::PreGame);
        assert_eq!(state.away.score(), 0);
    }

    #[test]
    fn test_team_id_parse() {
        assert_eq!("HOME".parse::<TeamId>().unwrap(), TeamId::Home);
        assert!("visitors".parse::<TeamId>().is_err());
    }

    #[test]
    fn test_port_list_wire_shape() {
        let ports: PortList =
            serde_json::from_value(json!({ "ports": ["COM3"], "currentPort": "COM3" })).unwrap();
        assert_eq!(ports.current_port, "COM3");
    }
}
