//! Simple configuration persistence
//!
//! Remembers the last opened file and the master volume between runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug)]
pub struct Config {
    /// Last file that was opened for playback
    pub last_file: Option<PathBuf>,
    /// Master volume, 0.0 to 2.0
    pub volume: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_file: None,
            volume: 1.0,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.serialize();
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("phosphor")
            .join("config.txt")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                match key {
                    "last_file" => {
                        if !value.is_empty() {
                            config.last_file = Some(PathBuf::from(value));
                        }
                    }
                    "volume" => {
                        if let Ok(v) = value.parse::<f32>() {
                            if (0.0..=2.0).contains(&v) {
                                config.volume = v;
                            }
                        }
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = Vec::new();
        lines.push("# Phosphor Configuration".to_string());

        if let Some(ref file) = self.last_file {
            lines.push(format!("last_file={}", file.display()));
        }
        lines.push(format!("volume={:.2}", self.volume));

        lines.join("\n")
    }
}
