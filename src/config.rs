//! Configuration management for the cue-sync presenter

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::display::DisplayConfig;
use crate::engine::EngineSettings;
use crate::sync::SyncConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// What to play and how far the seek keys jump
    #[serde(default)]
    pub player: PlayerConfig,

    /// Main → cue correction loop
    #[serde(default)]
    pub sync: SyncSection,

    /// Overlay fades
    #[serde(default)]
    pub fade: FadeConfig,

    /// Pop-out display window
    #[serde(default)]
    pub display: DisplaySection,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Video loaded on start
    #[serde(default = "default_video_id")]
    pub video_id: String,

    /// Offset into the video to start at (seconds)
    #[serde(default)]
    pub start_offset_secs: f64,

    /// Arrow-left jump (seconds)
    #[serde(default = "default_seek_back")]
    pub seek_back_secs: f64,

    /// Arrow-right jump (seconds)
    #[serde(default = "default_seek_forward")]
    pub seek_forward_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Drift tolerated before the cue player is seeked (seconds)
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance_secs: f64,

    /// Correction loop period (ms)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadeConfig {
    /// Overlay fade length (seconds)
    #[serde(default = "default_fade_duration")]
    pub duration_secs: f64,

    /// Number of volume steps per fade
    #[serde(default = "default_fade_steps")]
    pub steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySection {
    /// How long the display waits for its player API (ms)
    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_ms: u64,

    /// How often each side pushes its state to the other (ms)
    #[serde(default = "default_state_push_interval")]
    pub state_push_interval_ms: u64,
}

// Default value functions
fn default_video_id() -> String {
    "dQw4w9WgXcQ".to_string()
}

fn default_seek_back() -> f64 {
    5.0
}

fn default_seek_forward() -> f64 {
    15.0
}

fn default_drift_tolerance() -> f64 {
    crate::sync::DEFAULT_DRIFT_TOLERANCE_SECS
}

fn default_tick_interval() -> u64 {
    500
}

fn default_fade_duration() -> f64 {
    1.0
}

fn default_fade_steps() -> u32 {
    crate::fader::DEFAULT_FADE_STEPS
}

fn default_readiness_timeout() -> u64 {
    10_000
}

fn default_state_push_interval() -> u64 {
    500
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            video_id: default_video_id(),
            start_offset_secs: 0.0,
            seek_back_secs: default_seek_back(),
            seek_forward_secs: default_seek_forward(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            drift_tolerance_secs: default_drift_tolerance(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_fade_duration(),
            steps: default_fade_steps(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: default_readiness_timeout(),
            state_push_interval_ms: default_state_push_interval(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            sync: SyncSection::default(),
            fade: FadeConfig::default(),
            display: DisplaySection::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing a default file if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;

            config.config_path = Some(path.to_path_buf());
            Ok(config)
        } else {
            let config = Config {
                config_path: Some(path.to_path_buf()),
                ..Config::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "cue-sync", "presenter")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            drift_tolerance_secs: self.sync.drift_tolerance_secs.max(0.0),
            tick_interval: Duration::from_millis(self.sync.tick_interval_ms.max(1)),
        }
    }

    pub fn display_config(&self) -> DisplayConfig {
        DisplayConfig {
            sync: self.sync_config(),
            readiness_timeout: Duration::from_millis(self.display.readiness_timeout_ms),
            state_push_interval: Duration::from_millis(self.display.state_push_interval_ms.max(1)),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            sync: self.sync_config(),
            fade_duration: Duration::from_secs_f64(self.fade.duration_secs.max(0.0).min(3600.0)),
            fade_steps: self.fade.steps,
            seek_back_secs: self.player.seek_back_secs.abs(),
            seek_forward_secs: self.player.seek_forward_secs.abs(),
            state_push_interval: Duration::from_millis(self.display.state_push_interval_ms.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.drift_tolerance_secs, 0.5);
        assert_eq!(config.sync.tick_interval_ms, 500);
        assert_eq!(config.fade.steps, 50);
        assert_eq!(config.player.seek_back_secs, 5.0);
        assert_eq!(config.player.seek_forward_secs, 15.0);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [player]
            video_id = "abc"

            [sync]
            drift_tolerance_secs = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.player.video_id, "abc");
        assert_eq!(config.player.seek_forward_secs, 15.0);
        assert_eq!(config.sync.drift_tolerance_secs, 0.25);
        assert_eq!(config.sync.tick_interval_ms, 500);
        assert_eq!(config.display.readiness_timeout_ms, 10_000);
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = std::env::temp_dir().join(format!("cue-sync-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path().unwrap(), path);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.player.video_id, config.player.video_id);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_engine_settings_conversion() {
        let mut config = Config::default();
        config.fade.duration_secs = 2.5;
        config.sync.tick_interval_ms = 250;

        let settings = config.engine_settings();
        assert_eq!(settings.fade_duration, Duration::from_millis(2500));
        assert_eq!(settings.sync.tick_interval, Duration::from_millis(250));
    }
}
