//! Integration tests for the v2 client: snapshot mirror, subscriptions and
//! commands over a scripted connector

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use scoreboard_client::test_utils::{settle, MockConnector};
use scoreboard_client::{ClientOptions, Command, CommandPolicy, ScoreboardClient, Subscription};
use scoreboard_core::{ConnectionState, GameStatus, PortList, Snapshot, TeamId};

const INITIAL: &str = r#"{"type":"INITIAL_STATE","state":{
    "gameId":"g-1","status":"PLAYING","period":1,
    "clock":{"timeRemainingMillis":1200000,"isRunning":true},
    "home":{"goals":[],"shots":0,"penalties":[]},
    "away":{"goals":[],"shots":0,"penalties":[]}
}}"#;

async fn open_client(options: ClientOptions) -> (ScoreboardClient, MockConnector) {
    let connector = MockConnector::new();
    let client = ScoreboardClient::with_connector(options, connector.clone()).unwrap();
    settle().await;
    connector.socket(0).open();
    settle().await;
    (client, connector)
}

fn collect_snapshots(client: &ScoreboardClient) -> (Arc<Mutex<Vec<Snapshot>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = client.subscribe(move |s| sink.lock().unwrap().push(s.clone()));
    (seen, sub)
}

#[tokio::test(start_paused = true)]
async fn test_default_options_target_v2_endpoint() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    assert_eq!(client.url(), "ws://localhost:8082/");
    assert_eq!(connector.socket(0).url(), "ws://localhost:8082/");
    assert_eq!(client.connection_state(), ConnectionState::Open);
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_explicit_url_fails_construction() {
    let mut options = ClientOptions::default();
    options.endpoint.url = Some("http://example.com/ws".to_string());
    let result = ScoreboardClient::with_connector(options, MockConnector::new());
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_initial_state_then_patches_notify_in_order() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    let (seen, _sub) = collect_snapshots(&client);
    assert!(client.get_game_state().is_none());

    connector.socket(0).message(INITIAL);
    connector.socket(0).message(
        r#"{"type":"STATE_PATCH","patch":{"clock.timeRemainingMillis":1199000}}"#,
    );
    connector
        .socket(0)
        .message(r#"{"type":"STATE_PATCH","patch":{"home.shots":1,"status":"PAUSED"}}"#);
    settle().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[1].get("clock.timeRemainingMillis").and_then(|n| n.as_i64()),
        Some(1_199_000)
    );
    // Untouched branches keep their identity across patches
    assert!(seen[1]
        .get("home")
        .unwrap()
        .same_ref(seen[0].get("home").unwrap()));
    assert!(!seen[2]
        .get("home")
        .unwrap()
        .same_ref(seen[1].get("home").unwrap()));

    let current = client.get_game_state().unwrap();
    assert!(Snapshot::ptr_eq(&current, &seen[2]));

    let game = client.game_state().unwrap().unwrap();
    assert_eq!(game.status, GameStatus::Paused);
    assert_eq!(game.team(TeamId::Home).shots, 1);
    assert_eq!(game.clock.time_remaining_millis, 1_199_000);
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_patch_before_initial_state_is_ignored() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    let (seen, _sub) = collect_snapshots(&client);

    connector
        .socket(0)
        .message(r#"{"type":"STATE_PATCH","patch":{"period":2}}"#);
    settle().await;

    assert!(seen.lock().unwrap().is_empty());
    assert!(client.get_game_state().is_none());
    assert!(client.game_state().unwrap().is_none());
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_initial_state_accepts_data_field() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    connector
        .socket(0)
        .message(r#"{"type":"INITIAL_STATE","data":{"period":3}}"#);
    settle().await;

    let snapshot = client.get_game_state().unwrap();
    assert_eq!(snapshot.to_value(), json!({ "period": 3 }));
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_late_subscriber_gets_replay() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    connector.socket(0).message(INITIAL);
    settle().await;

    let (seen, _sub) = collect_snapshots(&client);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(Snapshot::ptr_eq(&seen[0], &client.get_game_state().unwrap()));
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_from_inside_callback() {
    let (client, connector) = open_client(ClientOptions::default()).await;

    let calls = Arc::new(Mutex::new(0usize));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let counter = Arc::clone(&calls);
    let own = Arc::clone(&slot);
    let sub = client.subscribe(move |_| {
        *counter.lock().unwrap() += 1;
        if let Some(sub) = own.lock().unwrap().take() {
            sub.unsubscribe();
        }
    });
    *slot.lock().unwrap() = Some(sub);

    let (others, _other_sub) = collect_snapshots(&client);

    connector.socket(0).message(INITIAL);
    connector
        .socket(0)
        .message(r#"{"type":"STATE_PATCH","patch":{"period":2}}"#);
    settle().await;

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(others.lock().unwrap().len(), 2);
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_may_reenter_the_client() {
    let (client, connector) = open_client(ClientOptions::default()).await;

    let nested: Arc<Mutex<Vec<Option<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let keep: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

    let inner_client = client.clone();
    let nested_sink = Arc::clone(&nested);
    let keep_sink = Arc::clone(&keep);
    let _sub = client.subscribe(move |snapshot| {
        if snapshot.get("period").and_then(|p| p.as_u64()) == Some(1) {
            inner_client.send_command(&Command::PauseClock);
            let sink = Arc::clone(&nested_sink);
            let sub = inner_client.subscribe(move |s| {
                sink.lock().unwrap().push(s.get("period").map(|p| p.to_value()))
            });
            keep_sink.lock().unwrap().push(sub);
        }
    });

    connector.socket(0).message(INITIAL);
    settle().await;

    assert_eq!(*nested.lock().unwrap(), vec![Some(json!(1))]);
    assert_eq!(
        connector.socket(0).sent(),
        vec![r#"{"type":"COMMAND","command":"PAUSE_CLOCK"}"#]
    );
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_connection_subscription_replays_and_deduplicates() {
    let connector = MockConnector::new();
    let client = ScoreboardClient::with_connector(ClientOptions::default(), connector.clone())
        .unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = client.subscribe_connection(move |s| sink.lock().unwrap().push(*s));

    settle().await;
    connector.socket(0).open();
    settle().await;
    client.close();
    settle().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closed
        ]
    );
    client.wait_closed().await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_dropped_while_disconnected_by_default() {
    let connector = MockConnector::new();
    let client = ScoreboardClient::with_connector(ClientOptions::default(), connector.clone())
        .unwrap();
    settle().await;

    assert!(!client.send_command(&Command::StartClock));
    connector.socket(0).open();
    settle().await;
    assert!(connector.socket(0).sent().is_empty());

    assert!(client.send_command(&Command::AddShot {
        team_id: TeamId::Away,
    }));
    settle().await;
    assert_eq!(
        connector.socket(0).sent_json(),
        vec![json!({
            "type": "COMMAND",
            "command": "ADD_SHOT",
            "payload": { "teamId": "away" }
        })]
    );
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_send_command_reports_drop_after_connection_loss() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    assert!(client.send_command(&Command::StartClock));
    settle().await;

    connector.socket(0).error("reset by peer");
    settle().await;

    assert_eq!(client.connection_state(), ConnectionState::Closed);
    assert!(!client.send_command(&Command::PauseClock));
    settle().await;
    assert_eq!(
        connector.socket(0).sent_json(),
        vec![json!({ "type": "COMMAND", "command": "START_CLOCK" })]
    );
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_queue_policy_flushes_commands_on_open() {
    let connector = MockConnector::new();
    let options = ClientOptions {
        command_policy: CommandPolicy::Queue,
        ..Default::default()
    };
    let client = ScoreboardClient::with_connector(options, connector.clone()).unwrap();
    settle().await;

    assert!(client.send_command(&Command::StartClock));
    assert!(client.send_command(&Command::SetPeriod { period: 2 }));
    connector.socket(0).open();
    settle().await;

    assert_eq!(
        connector.socket(0).sent_json(),
        vec![
            json!({ "type": "COMMAND", "command": "START_CLOCK" }),
            json!({ "type": "COMMAND", "command": "SET_PERIOD", "payload": { "period": 2 } }),
        ]
    );
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_leave_state_untouched() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    let (seen, _sub) = collect_snapshots(&client);

    connector.socket(0).message("garbage");
    connector.socket(0).message(r#"{"event":"update","data":{}}"#);
    connector.socket(0).message(r#"{"type":"SOMETHING_ELSE"}"#);
    connector.socket(0).message(r#"{"type":"STATE_PATCH","patch":[1,2]}"#);
    settle().await;

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(client.connection_state(), ConnectionState::Open);

    connector.socket(0).message(INITIAL);
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_null_initial_state_means_no_game() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    let (seen, _sub) = collect_snapshots(&client);

    connector.socket(0).message(r#"{"type":"INITIAL_STATE","data":null}"#);
    connector
        .socket(0)
        .message(r#"{"type":"STATE_PATCH","patch":{"clock.t":90}}"#);
    settle().await;

    assert!(seen.lock().unwrap().is_empty());
    assert!(client.get_game_state().is_none());

    connector.socket(0).message(INITIAL);
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_ports_frames_reach_port_subscribers() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    let seen: Arc<Mutex<Vec<PortList>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = client.on_ports(move |ports| sink.lock().unwrap().push(ports.clone()));

    connector.socket(0).message(
        r#"{"type":"PORTS","ports":{"ports":["/dev/ttyUSB0","/dev/ttyUSB1"],"currentPort":"/dev/ttyUSB0"}}"#,
    );
    settle().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].ports.len(), 2);
    assert_eq!(seen[0].current_port, "/dev/ttyUSB0");
    assert!(client.get_game_state().is_none());
    client.close();
}

#[tokio::test(start_paused = true)]
async fn test_state_survives_reconnect_until_next_initial_state() {
    let (client, connector) = open_client(ClientOptions::default()).await;
    connector.socket(0).message(INITIAL);
    settle().await;
    let before = client.get_game_state().unwrap();

    connector.socket(0).close();
    settle().await;
    assert_eq!(client.connection_state(), ConnectionState::Closed);
    assert!(Snapshot::ptr_eq(&before, &client.get_game_state().unwrap()));

    tokio::time::advance(std::time::Duration::from_millis(500)).await;
    settle().await;
    connector.socket(1).open();
    connector
        .socket(1)
        .message(r#"{"type":"INITIAL_STATE","state":{"period":2}}"#);
    settle().await;

    assert_eq!(client.get_game_state().unwrap().to_value(), json!({ "period": 2 }));
    client.close();
}
