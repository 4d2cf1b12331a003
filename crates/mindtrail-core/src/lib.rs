//! Core types and configuration for observation capture

mod config;
mod types;

pub use config::{load_config, CompressOptions, Config, CONFIG_FILE};
pub use types::{Observation, ObservationType, SessionInfo, Source};
