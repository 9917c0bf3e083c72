//! Editor configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use backdrop_render::{SelectionStyle, DEFAULT_MEASURE_CAPACITY, DEFAULT_PRESSURE_THRESHOLD};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Minimum time between the start of two preview draws.
    pub min_frame_gap_ms: u64,

    /// Quiet period before a parameter change is applied.
    pub debounce_ms: u64,

    /// Display refresh interval used by the tokio frame host.
    pub frame_interval_ms: u64,

    pub measure_cache_capacity: usize,

    /// Fraction of `memory_budget_bytes` above which the measurement cache
    /// is dropped.
    pub memory_pressure_threshold: f64,

    /// Budget for the process memory probe. 0 disables pressure checks.
    pub memory_budget_bytes: u64,

    /// Active-layer outline in the preview.
    pub selection: SelectionStyle,

    /// JPEG quality (0..1) for size-constrained exports.
    pub mobile_jpeg_quality: f32,

    /// Extra font directories registered at startup.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_frame_gap_ms: 8,
            debounce_ms: 12,
            frame_interval_ms: 16,
            measure_cache_capacity: DEFAULT_MEASURE_CAPACITY,
            memory_pressure_threshold: DEFAULT_PRESSURE_THRESHOLD,
            memory_budget_bytes: 0,
            selection: SelectionStyle::default(),
            mobile_jpeg_quality: 0.7,
            font_dirs: Vec::new(),
        }
    }
}

impl EditorConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config: {:?}", path))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("Failed to parse editor config")?;
        Ok(config)
    }

    pub fn min_frame_gap(&self) -> Duration {
        Duration::from_millis(self.min_frame_gap_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Register `font_dirs` with the text engine. Returns faces added.
    pub fn register_fonts(&self) -> usize {
        let mut total = 0;
        for dir in &self.font_dirs {
            let added = backdrop_render::text_engine::load_fonts_dir(dir);
            if added == 0 {
                tracing::warn!(dir = %dir.display(), "no fonts loaded from directory");
            }
            total += added;
        }
        total
    }
}
