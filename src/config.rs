//! Configuration management for shelfplay
//!
//! Handles config file loading and the lookup chain for the
//! streaming endpoint port.
//! Config is stored at ~/.config/shelfplay/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::endpoint::DEFAULT_PORT;
use crate::store::JsonFileStore;

/// Default tracing filter when neither config nor RUST_LOG set one
pub const DEFAULT_LOG_FILTER: &str = "shelfplay=info";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Loopback port of the streaming endpoint
    pub stream_port: Option<u16>,
    /// Where resume positions are kept
    pub positions_file: Option<PathBuf>,
    /// tracing-subscriber filter directive, e.g. "shelfplay=debug"
    pub log_filter: Option<String>,
}

impl Config {
    /// Get config file path (~/.config/shelfplay/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("shelfplay").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default()
    }

    /// Load config from a specific file, or return default if unreadable
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Streaming endpoint port with fallback chain:
    /// 1. Environment variable SHELFPLAY_STREAM_PORT
    /// 2. Port from config file
    /// 3. Built-in default
    pub fn stream_port(&self) -> u16 {
        if let Some(port) = std::env::var("SHELFPLAY_STREAM_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            return port;
        }
        self.stream_port.unwrap_or(DEFAULT_PORT)
    }

    /// Base URL of the streaming endpoint
    pub fn endpoint_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.stream_port())
    }

    /// Positions file: configured path, else the platform data dir
    pub fn positions_path(&self) -> Option<PathBuf> {
        self.positions_file
            .clone()
            .or_else(JsonFileStore::default_path)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
