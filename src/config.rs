//! Configuration loading and validation.
//!
//! Settings come from three layers, each overriding the previous one:
//!
//! ```text
//! stock defaults  →  downsize.toml  →  command-line flags
//! ```
//!
//! The file is optional. `--config PATH` names it explicitly; otherwise
//! `downsize.toml` in the working directory is used when present.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! size = 204800      # Target size in bytes (0 or negative = no limit)
//! format = ""        # jpeg, jpg, png, gif; empty = same as input
//! quality = 80       # JPEG quality (1-100)
//!
//! [gif]
//! speed = 10         # Palette quantizer speed (1 = best, 30 = fastest)
//!
//! [processing]
//! max_processes = 4  # Max parallel batch workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DEFAULT_QUALITY, GifOptions, OutputFormat, Quality};
use crate::search::TargetSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "downsize.toml";

/// Default target size in bytes (200 KiB).
pub const DEFAULT_SIZE: i64 = 204_800;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Settings loaded from `downsize.toml`.
///
/// All fields have defaults; a config file only lists what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownsizeConfig {
    /// Target size in bytes. `0` or negative disables the limit.
    pub size: i64,
    /// Output format tag. Empty keeps the input's format.
    pub format: String,
    /// JPEG quality (1 = worst, 100 = best).
    pub quality: u8,
    /// GIF encoder settings.
    pub gif: GifConfig,
    /// Batch parallelism settings.
    pub processing: ProcessingConfig,
}

impl Default for DownsizeConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            format: String::new(),
            quality: DEFAULT_QUALITY,
            gif: GifConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl DownsizeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if !(1..=30).contains(&self.gif.speed) {
            return Err(ConfigError::Validation("gif.speed must be 1-30".into()));
        }
        if !self.format.trim().is_empty() {
            OutputFormat::from_tag(&self.format)
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the loaded values.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(size) = overrides.size {
            self.size = size;
        }
        if let Some(format) = &overrides.format {
            self.format = format.clone();
        }
        if let Some(quality) = overrides.quality {
            self.quality = quality;
        }
    }

    pub fn target(&self) -> TargetSize {
        TargetSize::new(self.size)
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    pub fn gif_options(&self) -> GifOptions {
        GifOptions::new(self.gif.speed)
    }
}

/// Values given on the command line. `None` leaves the config value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub size: Option<i64>,
    pub format: Option<String>,
    pub quality: Option<u8>,
}

/// GIF encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GifConfig {
    /// NeuQuant sampling speed: 1 gives the best palette, 30 is fastest.
    pub speed: i32,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            speed: GifOptions::default().speed,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(DownsizeConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<DownsizeConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: DownsizeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] in
/// `cwd` is used if present, otherwise the stock defaults.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<DownsizeConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let implicit = cwd.join(DEFAULT_CONFIG_FILE);
            if implicit.exists() {
                Some(load_raw_config(&implicit)?)
            } else {
                None
            }
        }
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `downsize.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# downsize configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# Target output size in bytes. The image is shrunk (aspect ratio kept)
# until its encoding fits. 0 or a negative value disables the limit.
size = 204800

# Output format: "jpeg" (or "jpg"), "png" or "gif".
# Leave empty to keep the format of the input file.
format = ""

# JPEG quality, 1 (smallest) to 100 (best). Ignored for PNG and GIF.
quality = 80

# ---------------------------------------------------------------------------
# GIF output
# ---------------------------------------------------------------------------
[gif]
# Palette quantizer speed, 1 (best colors, slowest) to 30 (fastest).
speed = 10

# ---------------------------------------------------------------------------
# Batch processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `downsize batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = DownsizeConfig::default();
        assert_eq!(config.size, 204_800);
        assert_eq!(config.quality, 80);
        assert!(config.format.is_empty());
        assert_eq!(config.gif.speed, 10);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_toml_parses_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(Some(value)).unwrap();
        assert_eq!(config, DownsizeConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let overlay: toml::Value = toml::from_str("quality = 60\n[gif]\nspeed = 3\n").unwrap();
        let config = resolve_config(Some(overlay)).unwrap();
        assert_eq!(config.quality, 60);
        assert_eq!(config.gif.speed, 3);
        assert_eq!(config.size, DEFAULT_SIZE);
    }

    #[test]
    fn unknown_key_rejected() {
        let overlay: toml::Value = toml::from_str("qualty = 60").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn quality_out_of_range_rejected() {
        let overlay: toml::Value = toml::from_str("quality = 0").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn unsupported_format_rejected() {
        let overlay: toml::Value = toml::from_str("format = \"bmp\"").unwrap();
        let err = resolve_config(Some(overlay)).unwrap_err();
        assert!(err.to_string().contains("bmp"));
    }

    #[test]
    fn zero_workers_rejected() {
        let overlay: toml::Value = toml::from_str("[processing]\nmax_processes = 0").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
    }

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn load_config_uses_implicit_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(DEFAULT_CONFIG_FILE), "size = 1000").unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config.size, 1000);
    }

    #[test]
    fn load_config_without_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config, DownsizeConfig::default());
    }

    #[test]
    fn explicit_missing_file_errors() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")), tmp.path());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config = DownsizeConfig {
            size: 1000,
            quality: 50,
            ..DownsizeConfig::default()
        };
        config.apply(&Overrides {
            size: Some(-1),
            format: Some("png".into()),
            quality: None,
        });
        assert_eq!(config.target(), TargetSize::Unlimited);
        assert_eq!(config.format, "png");
        assert_eq!(config.quality().value(), 50);
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = effective_threads(&ProcessingConfig::default());
        assert!(cores >= 1);
        let one = effective_threads(&ProcessingConfig {
            max_processes: Some(1),
        });
        assert_eq!(one, 1);
        let many = effective_threads(&ProcessingConfig {
            max_processes: Some(100_000),
        });
        assert_eq!(many, cores);
    }
}
