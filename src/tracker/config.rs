//! Configuration types for the tracker.
//!
//! Loads resolution presets, detection thresholds and timing from config.json
//! at startup. Missing fields fall back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::grid::{GeometryError, GridConfig};
use crate::tracker::classifier::{BRIGHTNESS_THRESHOLD, GOLD_TARGETS, GOLD_TOLERANCE};
use crate::tracker::stability::{STABLE_DIFF_THRESHOLD, STABLE_FRAMES_REQUIRED};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<TrackerConfig> = OnceLock::new();

/// Card geometry and scan strip tuned for one screen resolution.
///
/// Values are measured per resolution; they are not derived from each other.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridPreset {
    pub cell_w: u32,
    pub cell_h: u32,
    pub padding: u32,
    pub scan_y_start: u32,
    pub scan_y_end: u32,
    pub gold_threshold: u32,
}

/// Color and stability thresholds used by the classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Mean channel value above which a card counts as flipped
    pub brightness_threshold: f32,
    /// Mean absolute pixel difference below which two frames count as unchanged
    pub stability_diff_threshold: f32,
    /// Consecutive unchanged frames required before a cell is classified
    pub stable_frames_required: u32,
    /// Per-channel tolerance around each gold target
    pub gold_tolerance: u8,
    /// Reference colors of the gold indicator
    pub gold_targets: Vec<[u8; 3]>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: BRIGHTNESS_THRESHOLD,
            stability_diff_threshold: STABLE_DIFF_THRESHOLD,
            stable_frames_required: STABLE_FRAMES_REQUIRED,
            gold_tolerance: GOLD_TOLERANCE,
            gold_targets: GOLD_TARGETS.to_vec(),
        }
    }
}

/// Complete tracker configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Resolution presets by name
    pub presets: BTreeMap<String, GridPreset>,
    /// Preset selected at startup
    pub default_preset: String,
    pub rows: usize,
    pub cols: usize,
    pub gap_x: u32,
    pub gap_y: u32,
    /// Alpha applied to annotation images (0-255)
    pub overlay_alpha: u8,
    /// Overlay margin on each side, as a fraction of the grid size
    pub margin_ratio: f32,
    pub detection: DetectionConfig,
    /// Target duration of one capture cycle (milliseconds)
    pub cycle_ms: u64,
    /// Maximum time to wait for one screen capture (milliseconds)
    pub capture_timeout_ms: u64,
    /// Log level name: error, warn, info, debug or trace
    pub log_level: String,
}

fn default_presets() -> BTreeMap<String, GridPreset> {
    let mut presets = BTreeMap::new();
    presets.insert(
        "FHD".to_string(),
        GridPreset {
            cell_w: 151,
            cell_h: 232,
            padding: 7,
            scan_y_start: 168,
            scan_y_end: 179,
            gold_threshold: 10,
        },
    );
    presets.insert(
        "QHD".to_string(),
        GridPreset {
            cell_w: 202,
            cell_h: 310,
            padding: 9,
            scan_y_start: 224,
            scan_y_end: 239,
            gold_threshold: 18,
        },
    );
    presets
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            presets: default_presets(),
            default_preset: "FHD".to_string(),
            rows: 3,
            cols: 6,
            gap_x: 0,
            gap_y: 0,
            overlay_alpha: 230,
            margin_ratio: 0.05,
            detection: DetectionConfig::default(),
            cycle_ms: 33,
            capture_timeout_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn cycle_budget(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Preset names in display order.
    pub fn preset_names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    /// Builds and validates the grid for a preset with the given gaps.
    ///
    /// Returns None if no preset has that name.
    pub fn grid_config(
        &self,
        preset_name: &str,
        gap_x: u32,
        gap_y: u32,
    ) -> Option<Result<GridConfig, GeometryError>> {
        let preset = self.presets.get(preset_name)?;
        let mut config = GridConfig {
            rows: self.rows,
            cols: self.cols,
            cell_w: preset.cell_w,
            cell_h: preset.cell_h,
            padding_x: preset.padding,
            padding_y: preset.padding,
            gap_x,
            gap_y,
            start_x: 0,
            start_y: 0,
            scan_y_start: preset.scan_y_start,
            scan_y_end: preset.scan_y_end,
            gold_threshold: preset.gold_threshold,
            overlay_alpha: self.overlay_alpha,
        };
        // Margins are computed from the grid size, which is only safe on a valid grid
        if let Err(e) = config.validate() {
            return Some(Err(e));
        }
        config.apply_margin(self.margin_ratio);
        Some(Ok(config))
    }
}

/// Loads configuration from a file, falling back to defaults on any problem.
pub fn load_config_from(config_path: &Path) -> TrackerConfig {
    log::info!("Looking for config at: {}", config_path.display());

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Config loaded from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse config.json: {}. Using defaults.", e);
                }
            },
            Err(e) => {
                log::warn!("Failed to read config.json: {}. Using defaults.", e);
            }
        }
    } else {
        log::info!("config.json not found. Using default config.");
    }

    TrackerConfig::default()
}

/// Loads config.json from the executable's directory.
fn load_config() -> TrackerConfig {
    load_config_from(&crate::paths::get_exe_dir().join("config.json"))
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() -> &'static TrackerConfig {
    CONFIG.get_or_init(load_config)
}
