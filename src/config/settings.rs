//! Settings parser for .scoreboard/config.toml

use std::path::{Path, PathBuf};

use scoreboard_core::prelude::*;

use super::types::Settings;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".scoreboard";

/// Default location of the config file below `base`
pub fn default_config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_DIR).join(CONFIG_FILENAME)
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load settings from `.scoreboard/config.toml` below `base`
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(base: &Path) -> Settings {
    load_settings_from(&default_config_path(base))
}

/// Load settings from an explicit file path
///
/// Missing, unreadable and invalid files all yield defaults; the last two
/// are logged as warnings.
pub fn load_settings_from(config_path: &Path) -> Settings {
    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    let mut settings = match std::fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str::<Settings>(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    };

    settings.validate();
    settings
}

// ─────────────────────────────────────────────────────────────────────────────
// Init
// ─────────────────────────────────────────────────────────────────────────────

/// Write a commented default config file to `config_path`
///
/// Leaves an existing file untouched and returns `false` in that case.
pub fn init_config_file(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        debug!("Config file {:?} already exists", config_path);
        return Ok(false);
    }

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
    }

    std::fs::write(config_path, generate_default_config())
        .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;

    info!("Created default config at {:?}", config_path);
    Ok(true)
}

fn generate_default_config() -> String {
    r#"# Scoreboard Control Configuration

[connection]
protocol = "v2"                     # "v2" or "legacy"
page_url = "http://localhost/"      # supplies scheme, host and ?socketHost=/?socketPort=
# url = "ws://localhost:8082/"      # full socket URL, wins over everything below
# host = "localhost"
# port = 8082
# path = "/"                        # default "/" for v2, "/ws" for legacy

[reconnect]
initial_delay_ms = 500
max_delay_ms = 5000

[commands]
policy = "drop"                     # "drop" while disconnected, or "queue" until open

[api]
base_url = "http://localhost:8080"
"#
    .to_string()
}
