//! Configuration management for voxd.
//!
//! Loads config from YAML files in standard locations. Every section has
//! defaults, so a missing or partial file always yields a usable config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice asset root (contains `en/`, `ar/`).
    pub dir: Option<PathBuf>,
    /// Speaker id for multi-speaker VITS models.
    pub speaker_id: i32,
    /// Speech speed multiplier.
    pub speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            dir: None,
            speaker_id: 0,
            speed: 1.0,
        }
    }
}

impl VoiceConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("voxd/voice")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Service socket path.
    pub socket: Option<PathBuf>,
}

impl IpcConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(|| {
            dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("voxd.sock")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Directory for the per-language scratch WAV files.
    pub dir: Option<PathBuf>,
}

impl ScratchConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("voxd")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub voice: VoiceConfig,
    pub ipc: IpcConfig,
    pub scratch: ScratchConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./voxd.yaml
    /// 2. ~/.config/voxd/config.yaml
    /// 3. /etc/voxd/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("voxd.yaml")),
                dirs::home_dir().map(|h| h.join(".config/voxd/config.yaml")),
                Some(PathBuf::from("/etc/voxd/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse {}: {e}, using defaults",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {e}, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }
}
