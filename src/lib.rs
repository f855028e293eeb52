//! Scoreboard Control Library
//!
//! Configuration and headless NDJSON front end for `scorectl`. The realtime
//! client itself lives in `scoreboard-client`.

pub mod config;
pub mod headless;

pub use config::Settings;
pub use headless::runner::{stdout_sink, EventSink};
pub use headless::HeadlessEvent;
