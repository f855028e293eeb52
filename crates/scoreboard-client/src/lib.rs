//! # scoreboard-client - Realtime State Sync
//!
//! Keeps one persistent WebSocket connection to the scoreboard server,
//! reconnects with exponential backoff, mirrors server state from
//! initial-state and patch frames, fans that state out to subscribers and
//! sends typed commands.
//!
//! ## Public API
//!
//! ### Clients
//! - [`ScoreboardClient`] - v2 client: snapshot mirror, subscriptions, commands
//! - [`LegacyRuntime`] - legacy `{event, data}` runtime with typed actions
//! - [`ClientOptions`] - page location, endpoint overrides, backoff, policy
//!
//! ### Building blocks
//! - [`Transport`] - reconnecting socket task with queued sends
//! - [`Connector`] - socket factory seam; [`TungsteniteConnector`] in production
//! - [`Subscribers`] / [`Subscription`] - ordered, serialized fan-out
//! - [`StateStore`] - snapshot holder with patch application
//! - [`Command`] / [`CommandDispatcher`] / [`CommandPolicy`] - v2 commands
//! - [`resolve_url()`] - socket URL resolution
//!
//! ### REST
//! - [`GameApi`] / [`HttpGameApi`] - `/api/game/...` collaborator

pub mod api;
pub mod backoff;
pub mod client;
pub mod commands;
pub mod endpoint;
pub mod hub;
pub mod legacy;
pub mod protocol;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use api::{ApiResponse, GameApi, HttpGameApi, LocalGameApi};
pub use backoff::{Backoff, BackoffConfig};
pub use client::{ClientOptions, ScoreboardClient};
pub use commands::{Command, CommandDispatcher, CommandPolicy};
pub use endpoint::{resolve_url, EndpointOverrides, PageLocation, DEFAULT_PORT};
pub use hub::{DeliveryGate, Subscribers, Subscription};
pub use legacy::{LegacyRuntime, OutboundEvent, ServerActions, ServerSocket};
pub use protocol::{CommandFrame, Envelope, ProtocolVersion, ServerMessage};
pub use store::StateStore;
pub use transport::{
    Connector, LocalConnector, Socket, StatusHandlers, Transport, TransportOptions,
    TungsteniteConnector,
};
