//! High-level v2 client: transport + state store + subscription hub +
//! command dispatcher

use std::sync::Arc;

use scoreboard_core::prelude::*;
use scoreboard_core::{ConnectionState, GameState, PortList, Snapshot};

use crate::backoff::BackoffConfig;
use crate::commands::{Command, CommandDispatcher, CommandPolicy};
use crate::endpoint::{resolve_url, EndpointOverrides, PageLocation};
use crate::hub::{DeliveryGate, Subscribers, Subscription};
use crate::protocol::{ProtocolVersion, ServerMessage};
use crate::store::StateStore;
use crate::transport::{
    Connector, StatusHandlers, Transport, TransportOptions, TungsteniteConnector,
};

/// Construction options shared by [`ScoreboardClient`] and
/// [`LegacyRuntime`](crate::legacy::LegacyRuntime)
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Where the control page is served from
    pub page: PageLocation,
    pub endpoint: EndpointOverrides,
    pub backoff: BackoffConfig,
    pub command_policy: CommandPolicy,
    /// Registered before the first connection attempt
    pub status: StatusHandlers,
}

impl ClientOptions {
    pub fn resolve_url(&self, dialect: ProtocolVersion) -> Result<String> {
        resolve_url(dialect, &self.page, &self.endpoint)
    }
}

/// Receives decoded frames on the transport task
struct ClientCore {
    store: StateStore,
    ports: Subscribers<PortList>,
}

impl ClientCore {
    fn handle(&self, message: ServerMessage) {
        match message {
            ServerMessage::InitialState { state } => {
                debug!("Received initial state");
                self.store.replace(state);
            }
            ServerMessage::StatePatch { patch } => {
                debug!("Received patch with {} entr(ies)", patch.len());
                self.store.apply_patch(&patch);
            }
            ServerMessage::Ports { ports } => {
                debug!("Received {} port(s)", ports.ports.len());
                self.ports.publish(&ports);
            }
        }
    }
}

/// Realtime state-sync client for the v2 protocol.
///
/// Owns one [`Transport`]; every method is synchronous except
/// [`ScoreboardClient::wait_closed`]. Call [`ScoreboardClient::close`] when
/// done; subscriber callbacks that capture a clone of the client otherwise
/// keep the background task alive.
#[derive(Clone)]
pub struct ScoreboardClient {
    transport: Transport,
    core: Arc<ClientCore>,
    dispatcher: CommandDispatcher,
}

impl std::fmt::Debug for ScoreboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreboardClient")
            .field("transport", &self.transport)
            .field("store", &self.core.store)
            .field("policy", &self.dispatcher.policy())
            .finish()
    }
}

impl ScoreboardClient {
    /// Connect over real WebSockets.
    ///
    /// Fails only when the endpoint cannot be resolved; network failures are
    /// retried in the background. Must be called within a tokio runtime.
    pub fn create(options: ClientOptions) -> Result<Self> {
        Self::with_connector(options, TungsteniteConnector)
    }

    /// Like [`ScoreboardClient::create`] with a caller-supplied connector
    pub fn with_connector<C>(options: ClientOptions, connector: C) -> Result<Self>
    where
        C: Connector + Sync + 'static,
    {
        let url = options.resolve_url(ProtocolVersion::V2)?;
        let gate = DeliveryGate::new();

        let core = Arc::new(ClientCore {
            store: StateStore::new(Arc::clone(&gate)),
            ports: Subscribers::new(Arc::clone(&gate)),
        });

        let handler_core = Arc::clone(&core);
        let transport = Transport::builder(TransportOptions {
            url,
            backoff: options.backoff,
            dialect: ProtocolVersion::V2,
        })
        .gate(gate)
        .on_status(options.status)
        .on_message(move |message| handler_core.handle(message))
        .spawn(connector);

        let dispatcher = CommandDispatcher::new(transport.clone(), options.command_policy);

        Ok(Self {
            transport,
            core,
            dispatcher,
        })
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Observe the snapshot. Replays the current one, if any, before
    /// returning.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.core.store.subscribe(Arc::new(callback))
    }

    /// Observe connection state. Replays the current state before returning.
    pub fn subscribe_connection<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.transport.subscribe_connection(callback)
    }

    /// Observe serial-port listings pushed by the server. No replay.
    pub fn on_ports<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PortList) + Send + Sync + 'static,
    {
        self.core.ports.subscribe(Arc::new(callback))
    }

    /// Current snapshot, if an initial state has arrived
    pub fn get_game_state(&self) -> Option<Snapshot> {
        self.core.store.current()
    }

    /// Current snapshot decoded into the typed game view
    pub fn game_state(&self) -> Result<Option<GameState>> {
        self.get_game_state()
            .map(|snapshot| GameState::from_snapshot(&snapshot))
            .transpose()
    }

    /// Send `command` according to the configured [`CommandPolicy`].
    ///
    /// Returns `false` when the command was dropped.
    pub fn send_command(&self, command: &Command) -> bool {
        self.dispatcher.send(command)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.connection_state()
    }

    /// Stop reconnecting and close the socket. Idempotent.
    pub fn close(&self) {
        self.transport.close();
    }

    pub async fn wait_closed(&self) {
        self.transport.wait_closed().await;
    }
}
