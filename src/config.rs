use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/pixeltrail.toml";

/// Largest surface width or height accepted from config or the command line.
pub const MAX_DIMENSION: u32 = 8192;
/// Largest per-layer particle capacity accepted from config.
pub const MAX_CAPACITY: usize = 1_000_000;

/// Layer drawn beneath the particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    /// Plain black surface.
    #[default]
    None,
    /// Procedural vertical gradient uploaded once at startup.
    Gradient,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Frame ticks per second.
    pub tick_rate_hz: u32,
    /// Particles each layer accepts per frame.
    pub capacity: usize,
    /// Dynamic particles fed per tick.
    pub dynamic_per_tick: u32,
    /// Static (trail) particles fed per tick.
    pub static_per_tick: u32,
    /// Seed for the particle feed; random when absent.
    pub seed: Option<u64>,
    pub background: BackgroundKind,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            tick_rate_hz: 60,
            capacity: pixeltrail_render::DEFAULT_CAPACITY,
            dynamic_per_tick: 1,
            static_per_tick: 1,
            seed: None,
            background: BackgroundKind::None,
        }
    }
}

impl HostConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        let mut config = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<HostConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    HostConfig::default()
                }
            },
            Err(err) => {
                if err.kind() == std::io::ErrorKind::NotFound {
                    warn!("Config not found at {}. Using defaults", path.display());
                } else {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                HostConfig::default()
            }
        };
        config.sanitize();
        config
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Clamp values the renderer cannot honour. Runs on load and again after
    /// command-line overrides.
    pub fn sanitize(&mut self) {
        if self.width == 0 || self.height == 0 {
            warn!(
                width = self.width,
                height = self.height,
                "surface size must be non-zero, using 300x300"
            );
            self.width = 300;
            self.height = 300;
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            warn!(
                width = self.width,
                height = self.height,
                max = MAX_DIMENSION,
                "surface size clamped"
            );
            self.width = self.width.min(MAX_DIMENSION);
            self.height = self.height.min(MAX_DIMENSION);
        }
        let capacity = self.capacity.clamp(1, MAX_CAPACITY);
        if capacity != self.capacity {
            warn!(requested = self.capacity, capacity, "capacity clamped");
            self.capacity = capacity;
        }
        let rate = self.tick_rate_hz.clamp(1, 240);
        if rate != self.tick_rate_hz {
            warn!(requested = self.tick_rate_hz, rate, "tick_rate_hz clamped");
            self.tick_rate_hz = rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("pixeltrail_cfg_{nanos}"))
            .join(name)
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = HostConfig::load_from_path(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.width, 300);
        assert_eq!(cfg.tick_rate_hz, 60);
        assert_eq!(cfg.capacity, 32_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_path("partial.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "width = 640\nbackground = \"gradient\"\n").unwrap();

        let cfg = HostConfig::load_from_path(&path);
        assert_eq!(cfg.width, 640);
        assert_eq!(cfg.height, 300);
        assert_eq!(cfg.background, BackgroundKind::Gradient);
    }

    #[test]
    fn invalid_values_are_sanitized() {
        let path = temp_path("bad.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "width = 0\ntick_rate_hz = 10000\n").unwrap();

        let cfg = HostConfig::load_from_path(&path);
        assert_eq!((cfg.width, cfg.height), (300, 300));
        assert_eq!(cfg.tick_rate_hz, 240);
    }

    #[test]
    fn oversized_values_are_clamped() {
        let path = temp_path("huge.toml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "capacity = 100000000\nwidth = 20000\nheight = 240\n").unwrap();

        let cfg = HostConfig::load_from_path(&path);
        assert_eq!(cfg.capacity, MAX_CAPACITY);
        assert_eq!((cfg.width, cfg.height), (MAX_DIMENSION, 240));
    }

    #[test]
    fn sanitize_after_override_clamps_resolution() {
        let mut cfg = HostConfig {
            width: 20_000,
            height: 20_000,
            capacity: 0,
            ..HostConfig::default()
        };
        cfg.sanitize();
        assert_eq!((cfg.width, cfg.height), (MAX_DIMENSION, MAX_DIMENSION));
        assert_eq!(cfg.capacity, 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_path("saved.toml");
        let cfg = HostConfig {
            capacity: 3,
            seed: Some(7),
            ..HostConfig::default()
        };
        cfg.save_to_path(&path).unwrap();

        let loaded = HostConfig::load_from_path(&path);
        assert_eq!(loaded.capacity, 3);
        assert_eq!(loaded.seed, Some(7));
    }
}
