use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::task::Dimensions;

/// Tool configuration, loaded from a TOML file with sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External tool locations
    pub tools: ToolsConfig,

    /// Collection-store (AnkiConnect) settings
    pub collection: CollectionConfig,

    /// Defaults applied when the CLI omits the flag
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// yt-dlp binary (name on PATH or absolute path)
    pub ytdlp: String,

    /// ffmpeg binary (name on PATH or absolute path)
    pub ffmpeg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// AnkiConnect endpoint
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Still-frame dimensions
    pub dimensions: Dimensions,

    /// Directory clipped media is written to; system temp dir when unset
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the first existing conventional location
    pub fn load() -> Result<Self> {
        let config_paths = [
            "ytanki.toml",
            "config/ytanki.toml",
            "~/.config/ytanki/config.toml",
            "/etc/ytanki/config.toml",
        ];

        for path in config_paths {
            let expanded = expand_home(path);
            if expanded.exists() {
                let content = std::fs::read_to_string(&expanded)?;
                let config: Config = toml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }

    /// Directory the clipped media lands in
    pub fn output_dir(&self) -> PathBuf {
        self.defaults
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig {
                ytdlp: "yt-dlp".to_string(),
                ffmpeg: "ffmpeg".to_string(),
            },
            collection: CollectionConfig {
                endpoint: "http://127.0.0.1:8765".to_string(),
                timeout_secs: 30,
            },
            defaults: DefaultsConfig {
                dimensions: Dimensions {
                    width: 240,
                    height: 160,
                },
                output_dir: None,
            },
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tools.ytdlp, "yt-dlp");
        assert_eq!(config.tools.ffmpeg, "ffmpeg");
        assert_eq!(config.defaults.dimensions.to_string(), "240x160");
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.collection.endpoint, config.collection.endpoint);
        assert_eq!(parsed.defaults.dimensions, config.defaults.dimensions);
    }
}
