//! Per-surface filter state (background image vs. foreground cutout).

use serde::{Deserialize, Serialize};

/// Brightness/contrast/blur applied to a single image draw.
///
/// Brightness and contrast are percentages where 100 is the identity;
/// blur is a pixel radius (standard deviation of the gaussian).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub blur: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FilterSettings {
    pub const IDENTITY: Self = Self {
        brightness: 100.0,
        contrast: 100.0,
        blur: 0.0,
    };

    /// True when applying these settings would leave pixels unchanged.
    pub fn is_identity(&self) -> bool {
        self.brightness == 100.0 && self.contrast == 100.0 && self.blur <= 0.0
    }

    /// The combined filter specification, in CSS filter-function syntax.
    pub fn filter_string(&self) -> String {
        format!(
            "brightness({}%) contrast({}%) blur({}px)",
            self.brightness, self.contrast, self.blur
        )
    }

    /// A blur-only variant, used for the flat-color background path.
    pub fn blur_only(&self) -> Self {
        Self {
            blur: self.blur,
            ..Self::IDENTITY
        }
    }
}

/// Background surface filters plus the flat-color override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundFilters {
    pub filters: FilterSettings,
    /// Replace the image draw entirely with a solid fill.
    pub use_flat_color: bool,
    pub flat_color: String,
}

impl Default for BackgroundFilters {
    fn default() -> Self {
        Self {
            filters: FilterSettings::IDENTITY,
            use_flat_color: false,
            flat_color: "#FFFFFF".to_string(),
        }
    }
}

/// Filter state for both surfaces of the composite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceFilters {
    pub background: BackgroundFilters,
    pub foreground: FilterSettings,
}
