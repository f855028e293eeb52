//! Headless runners - one entry point per `scorectl` subcommand
//!
//! Runners report through an [`EventSink`] instead of writing to stdout
//! directly; the binary passes [`stdout_sink`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use scoreboard_client::{
    ClientOptions, Command, Connector, GameApi, LegacyRuntime, ProtocolVersion, ScoreboardClient,
    StatusHandlers, Transport,
};
use scoreboard_core::prelude::*;

use super::HeadlessEvent;
use crate::config::Settings;

/// Receives every event a runner produces
pub type EventSink = Arc<dyn Fn(HeadlessEvent) + Send + Sync>;

/// Sink that prints each event as one NDJSON line
pub fn stdout_sink() -> EventSink {
    Arc::new(|event: HeadlessEvent| event.emit())
}

/// Client options with a status hook that reports connection errors
fn options_with_errors(settings: &Settings, sink: &EventSink) -> ClientOptions {
    let sink = Arc::clone(sink);
    ClientOptions {
        status: StatusHandlers {
            error: Some(Arc::new(move || {
                sink(HeadlessEvent::error("connection error".to_string(), false))
            })),
            ..Default::default()
        },
        ..settings.client_options()
    }
}

/// Wait until `transport` reports open, bounded by `timeout`
async fn wait_open(transport: &Transport, timeout: Duration) -> Result<()> {
    let (tx, mut rx) = watch::channel(transport.connection_state());
    let subscription = transport.subscribe_connection(move |state| {
        tx.send_replace(*state);
    });

    let opened = tokio::time::timeout(timeout, rx.wait_for(|state| state.is_open()))
        .await
        .map(|changed| changed.is_ok());
    subscription.unsubscribe();

    match opened {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::ChannelClosed),
        Err(_) => Err(Error::timeout(format!("connection to {}", transport.url()))),
    }
}

// ─────────────────────────────────────────────────────────
// watch
// ─────────────────────────────────────────────────────────

/// Follow the scoreboard until `shutdown` resolves
pub async fn watch<C, F>(
    settings: &Settings,
    connector: C,
    sink: EventSink,
    shutdown: F,
) -> Result<()>
where
    C: Connector + Sync + 'static,
    F: Future<Output = ()>,
{
    let options = options_with_errors(settings, &sink);

    match settings.connection.protocol {
        ProtocolVersion::V2 => {
            let client = ScoreboardClient::with_connector(options, connector)?;
            info!("Watching {} (v2)", client.url());

            let s = Arc::clone(&sink);
            let connection =
                client.subscribe_connection(move |state| s(HeadlessEvent::connection(*state)));
            let s = Arc::clone(&sink);
            let state =
                client.subscribe(move |snapshot| s(HeadlessEvent::state(snapshot.to_value())));
            let s = Arc::clone(&sink);
            let ports = client.on_ports(move |list| s(HeadlessEvent::ports(list)));

            shutdown.await;
            info!("Shutdown requested");

            for subscription in [connection, state, ports] {
                subscription.unsubscribe();
            }
            client.close();
            client.wait_closed().await;
        }
        ProtocolVersion::Legacy => {
            let runtime = LegacyRuntime::with_connector(options, connector)?;
            info!("Watching {} (legacy)", runtime.transport.url());

            let s = Arc::clone(&sink);
            let connection = runtime
                .transport
                .subscribe_connection(move |state| s(HeadlessEvent::connection(*state)));

            let s = Arc::clone(&sink);
            runtime.socket.on_update(move |update| match serde_json::to_value(&update) {
                Ok(data) => s(HeadlessEvent::update(data)),
                Err(e) => warn!("Failed to serialize update: {}", e),
            });
            let s = Arc::clone(&sink);
            runtime
                .socket
                .on_power(move |power| s(HeadlessEvent::power(power.scoreboard_on)));
            let s = Arc::clone(&sink);
            runtime
                .socket
                .on_message(move |data| s(HeadlessEvent::message(data.clone())));

            shutdown.await;
            info!("Shutdown requested");

            connection.unsubscribe();
            runtime.close();
            runtime.wait_closed().await;
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────
// send / emit
// ─────────────────────────────────────────────────────────

/// Send one v2 command once the socket is open, then close
pub async fn send<C>(
    settings: &Settings,
    connector: C,
    sink: EventSink,
    name: &str,
    payload: Option<Value>,
    timeout: Duration,
) -> Result<()>
where
    C: Connector + Sync + 'static,
{
    let command = Command::from_parts(name, payload)?;
    let echo = command.payload()?;
    let client = ScoreboardClient::with_connector(options_with_errors(settings, &sink), connector)?;

    let result = match wait_open(client.transport(), timeout).await {
        Ok(()) if client.send_command(&command) => {
            sink(HeadlessEvent::command_sent(command.name(), echo));
            Ok(())
        }
        Ok(()) => Err(Error::transport(format!(
            "connection lost before {} was sent",
            command.name()
        ))),
        Err(err) => Err(err),
    };

    client.close();
    client.wait_closed().await;
    result
}

/// Emit one legacy event, flushed on open, then close
pub async fn emit<C>(
    settings: &Settings,
    connector: C,
    sink: EventSink,
    event: &str,
    data: Option<Value>,
    timeout: Duration,
) -> Result<()>
where
    C: Connector + Sync + 'static,
{
    let runtime = LegacyRuntime::with_connector(options_with_errors(settings, &sink), connector)?;
    runtime.transport.emit(event, data.clone());

    let result = wait_open(&runtime.transport, timeout).await;
    if result.is_ok() {
        sink(HeadlessEvent::event_sent(event, data));
    }

    runtime.close();
    runtime.wait_closed().await;
    result
}

// ─────────────────────────────────────────────────────────
// REST
// ─────────────────────────────────────────────────────────

pub async fn ports<A: GameApi>(api: &A, sink: EventSink) -> Result<()> {
    let list = api.list_ports().await.context("Listing serial ports")?;
    sink(HeadlessEvent::ports(&list));
    Ok(())
}

pub async fn set_port<A: GameApi>(api: &A, sink: EventSink, port_name: &str) -> Result<()> {
    let list = api
        .set_port(port_name)
        .await
        .with_context(|| format!("Selecting serial port {port_name}"))?;
    sink(HeadlessEvent::ports(&list));
    Ok(())
}

pub async fn reset<A: GameApi>(api: &A, sink: EventSink) -> Result<()> {
    let response = api.reset().await.context("Resetting game")?;
    sink(HeadlessEvent::response(response.into_value()));
    Ok(())
}
