//! Configuration file parsing for Scoreboard Control
//!
//! Supports:
//! - `.scoreboard/config.toml` - connection, reconnect, command and REST settings

pub mod settings;
pub mod types;

pub use settings::{default_config_path, init_config_file, load_settings, load_settings_from};
pub use types::*;
