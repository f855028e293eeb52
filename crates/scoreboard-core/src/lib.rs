//! # scoreboard-core - Core Domain Types
//!
//! Foundation crate for Scoreboard Control. Provides the mirrored state tree,
//! patch application, the typed game view, error handling and logging setup.
//!
//! This crate has **no internal dependencies**.
//!
//! ## Public API
//!
//! ### State (`node`, `snapshot`, `patch`)
//! - [`StateNode`] - JSON tree with shared, copy-on-write containers
//! - [`Snapshot`] - Immutable root of the mirrored server state
//! - [`Patch`] - Ordered dot-path update
//! - [`apply_patch()`] - Structural-sharing patch application
//!
//! ### Game view (`game`)
//! - [`GameState`], [`TeamState`], [`GoalEvent`], [`Penalty`] - Typed v2 state
//! - [`TeamId`] - Home or away
//!
//! ### Connection (`types`)
//! - [`ConnectionState`] - Connecting, Open or Closed
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! ```rust
//! use scoreboard_core::prelude::*;
//! ```

pub mod error;
pub mod game;
pub mod logging;
pub mod node;
pub mod patch;
pub mod prelude;
pub mod snapshot;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use game::{
    ClockState, ClockType, GameConfig, GameState, GameStatus, GoalEvent, Penalty, PortList,
    TeamId, TeamState,
};
pub use node::{NodeMap, StateNode};
pub use patch::{apply_patch, Patch};
pub use snapshot::Snapshot;
pub use types::ConnectionState;
