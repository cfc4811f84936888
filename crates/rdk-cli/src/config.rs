//! Demo configuration: reads and writes `~/.rdk/config.toml`.

use rdk_magic::{AnchorTransform, MagicOptions};
use rdk_perception::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted demo configuration stored in `~/.rdk/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Render ticks per second.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,

    /// Synthetic orientation readings per second.
    #[serde(default = "default_sensor_rate")]
    pub sensor_rate: f32,

    /// Stop after this many seconds; `0` runs until Ctrl-C.
    #[serde(default)]
    pub duration_secs: u64,

    /// Deny the first permission prompt and grant it on the next user
    /// gesture, as iOS Safari does.
    #[serde(default)]
    pub simulate_permission_prompt: bool,

    /// Also register a simulated geolocation backend.
    #[serde(default)]
    pub simulate_geolocation: bool,

    /// Magic-window engine options.
    #[serde(default)]
    pub magic: MagicOptions,

    /// Content pinned relative to the first orientation reading.
    #[serde(default = "default_anchors")]
    pub anchors: Vec<AnchorTransform>,
}

fn default_frame_rate() -> f32 {
    60.0
}
fn default_sensor_rate() -> f32 {
    60.0
}
fn default_anchors() -> Vec<AnchorTransform> {
    vec![
        AnchorTransform::default(),
        AnchorTransform::at(Vec3::new(1.5, 0.0, -3.0)).billboard(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            sensor_rate: default_sensor_rate(),
            duration_secs: 0,
            simulate_permission_prompt: false,
            simulate_geolocation: false,
            magic: MagicOptions::default(),
            anchors: default_anchors(),
        }
    }
}

/// Return the path to `~/.rdk/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rdk").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `RDK_*` environment variable overrides to `cfg`.
///
/// Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `RDK_SMOOTHING` | `magic.smoothing_factor` |
/// | `RDK_DEAD_ZONE` | `magic.dead_zone` |
/// | `RDK_FRAME_RATE` | `frame_rate` |
/// | `RDK_DURATION_SECS` | `duration_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RDK_SMOOTHING")
        && let Ok(factor) = v.parse::<f32>()
    {
        cfg.magic.smoothing_factor = factor;
    }
    if let Ok(v) = std::env::var("RDK_DEAD_ZONE")
        && let Ok(degrees) = v.parse::<f32>()
    {
        cfg.magic.dead_zone = degrees;
    }
    if let Ok(v) = std::env::var("RDK_FRAME_RATE")
        && let Ok(rate) = v.parse::<f32>()
    {
        cfg.frame_rate = rate;
    }
    if let Ok(v) = std::env::var("RDK_DURATION_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.duration_secs = secs;
    }
}

/// Save the config to disk, creating `~/.rdk/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
///
/// The file holds demo tuning only, so it is written with the process's
/// default permissions.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
