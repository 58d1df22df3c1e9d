//! Configuration loading and credential resolution
//!
//! Settings come from a TOML config file with serde defaults; the API
//! credential follows a fixed priority order so the interactive binary,
//! scripts, and CI can each supply it their own way.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Player settings loaded from the config file
///
/// Every field has a compiled default so a missing or partial config file
/// never prevents startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSettings {
    /// Realtime music model identifier sent in the session setup
    #[serde(default = "default_model")]
    pub model: String,

    /// Beats per minute for the generation config (fixed per session)
    #[serde(default = "default_bpm")]
    pub bpm: u32,

    /// Sampling temperature for the generation config (fixed per session)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output device name (None = system default device)
    #[serde(default)]
    pub output_device: Option<String>,

    /// Playback ring buffer capacity in milliseconds of audio
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u32,

    /// API credential (lowest-priority source, see [`resolve_api_key`])
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "models/lyria-realtime-exp".to_string()
}

fn default_bpm() -> u32 {
    90
}

fn default_temperature() -> f32 {
    1.0
}

fn default_buffer_ms() -> u32 {
    2000
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            bpm: default_bpm(),
            temperature: default_temperature(),
            output_device: None,
            buffer_ms: default_buffer_ms(),
            api_key: None,
        }
    }
}

/// Resolve the API credential in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `GEMINI_API_KEY` environment variable
/// 3. `api_key` entry in the config file
///
/// Returns `None` when no source provides a non-empty value. Absence is a
/// precondition failure the session controller reports as `Error` status
/// before allocating anything; it is not an error here.
pub fn resolve_api_key(cli_arg: Option<&str>, settings: &PlayerSettings) -> Option<String> {
    // Priority 1: Command-line argument
    if let Some(key) = cli_arg {
        if !key.trim().is_empty() {
            return Some(key.to_string());
        }
    }

    // Priority 2: Environment variable
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Some(key);
        }
    }

    // Priority 3: Config file
    settings
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
}

/// Load player settings from the given path, or from the platform config
/// file when no path is supplied
///
/// A missing file yields compiled defaults with a warning; a file that
/// exists but fails to parse is a configuration error.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<PlayerSettings> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(PlayerSettings::default()),
        },
    };

    if !path.exists() {
        warn!("Config file not found at {:?}, using defaults", path);
        return Ok(PlayerSettings::default());
    }

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))
}

/// Default configuration file path for the platform
///
/// `~/.config/musegen/config.toml` on Linux (with `/etc/musegen/config.toml`
/// as the system-wide fallback), the platform config directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("musegen").join("config.toml"));

    if cfg!(target_os = "linux") {
        if let Some(ref path) = user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/musegen/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}
