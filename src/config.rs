//! Configuration for a detection session.
//! Manages I/O for board_config.json (board rectangle, orientation,
//! detection thresholds). Uses serde for JSON serialization.
//! A missing file yields defaults; missing fields in an older file fall back
//! per-field, so upgrades never invalidate an existing config.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::board::BoardRect;
use crate::grid::DiffThresholds;

/// Default config location, next to wherever the binary is run from.
pub const DEFAULT_CONFIG_PATH: &str = "board_config.json";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Board region within the captured frame.
    pub board: BoardRect,
    /// Whether black is rendered at the bottom.
    pub flipped: bool,
    /// Change-detection thresholds.
    pub thresholds: DiffThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board: BoardRect {
                x: 50,
                y: 300,
                size: 800,
            },
            flipped: false,
            thresholds: DiffThresholds::default(),
        }
    }
}

/// Loads the config from `path`, or returns defaults when the file does not
/// exist. A file that exists but fails to parse is an error - silently
/// replacing a broken config with defaults would hide the breakage.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse config {}", path.display()))
}

pub fn save(config: &Config, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let raw = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, raw).with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
}
