//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Default capture settings.
    pub capture: CaptureDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Target frame rate (frames per second, > 0).
    pub frame_rate: f64,

    /// Whether to composite the mouse cursor into frames.
    pub show_cursor: bool,

    /// Capture strategy: "auto", "pixel-copy", "window-print" or "gpu-duplication".
    pub strategy: String,

    /// Frame queue capacity before the oldest frame is dropped.
    pub queue_capacity: usize,

    /// How long GPU duplication waits for a composited frame (ms).
    pub gpu_frame_timeout_ms: u64,

    /// Keep a captured window above other windows while capturing.
    pub bring_window_to_front: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framegrab=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            show_cursor: true,
            strategy: "auto".to_string(),
            queue_capacity: 3,
            gpu_frame_timeout_ms: 100,
            bring_window_to_front: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .or_else(|_| std::env::var("APPDATA"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("framegrab").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.capture.frame_rate, 30.0);
        assert_eq!(config.capture.queue_capacity, 3);
        assert_eq!(config.capture.strategy, "auto");
        assert!(config.capture.show_cursor);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"capture":{"frame_rate":60.0,"show_cursor":false}}"#)
                .unwrap();
        assert_eq!(config.capture.frame_rate, 60.0);
        assert!(!config.capture.show_cursor);
        assert_eq!(config.capture.queue_capacity, 3);
        assert!(!config.logging.json);
    }
}
