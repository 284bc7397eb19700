use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Paths (or bare command names) of the external tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// HandBrakeCLI executable
    pub handbrake: String,
    /// MediaInfo executable
    pub mediainfo: String,
    /// mkvpropedit executable
    pub mkvpropedit: String,
    /// ffmpeg executable (sample extraction)
    pub ffmpeg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            handbrake: "HandBrakeCLI".to_string(),
            mediainfo: "mediainfo".to_string(),
            mkvpropedit: "mkvpropedit".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// Default job settings applied when the command line leaves them out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Target output size in megabytes
    pub target_size_mb: f64,
    /// Video encoder passed to HandBrake with -e (None lets the preset decide)
    pub video_encoder: Option<String>,
    /// Audio encoder passed with -E ("copy" keeps source audio)
    pub audio_encoder: String,
    /// Use multi-pass encoding for fixed-bitrate software encodes
    pub multi_pass: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            target_size_mb: 1024.0,
            video_encoder: Some("x265".to_string()),
            audio_encoder: "av_aac".to_string(),
            multi_pass: false,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External tool locations
    pub tools: ToolsConfig,
    /// Job defaults
    pub defaults: DefaultsConfig,
}

impl AppConfig {
    /// Load configuration from TOML file, or create default if not found
    pub fn load() -> Self {
        let config_path = Self::config_path();

        if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config: {}. Using defaults.", e);
                }
            }
        }

        let config = Self::default();
        // Save default config for future editing
        if let Err(e) = config.save() {
            warn!("Failed to save default config: {}", e);
        }
        config
    }

    /// Save configuration to TOML file
    pub fn save(&self) -> Result<(), AppError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, toml_string)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Load configuration from a specific file
    fn load_from_file(path: &PathBuf) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("brakesize")
            .join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.defaults.target_size_mb.is_finite() || self.defaults.target_size_mb <= 0.0 {
            return Err(AppError::Config(
                "Default target size must be a positive number of megabytes".to_string(),
            ));
        }
        if self.defaults.audio_encoder.trim().is_empty() {
            return Err(AppError::Config(
                "Audio encoder must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_target_size() {
        let mut config = AppConfig::default();
        config.defaults.target_size_mb = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.tools.handbrake, config.tools.handbrake);
        assert_eq!(back.defaults.audio_encoder, config.defaults.audio_encoder);
    }
}
