//! Size-adaptive warning/critical levels.
//!
//! A fixed percentage means very different amounts of space on a 20 GiB
//! root disk and on a 100 TiB data volume. With a magic factor below 1 the
//! headroom (`100 - percent`) of filesystems larger than the normal size
//! shrinks, so they alert later; smaller filesystems get more headroom.

use serde::Deserialize;

const GIB: f64 = 1_073_741_824.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub warning:     f64,
    pub critical:    f64,
    /// Size in GiB at which levels are used as given
    pub normal_gib:  f64,
    /// Exponent applied to the size ratio; 1.0 disables adjustment
    pub magic:       f64,
    /// Filesystems at or below this size in GiB are never adjusted
    pub minimum_gib: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warning:     85.0,
            critical:    95.0,
            normal_gib:  20.0,
            magic:       1.0,
            minimum_gib: 100.0,
        }
    }
}

impl ThresholdConfig {
    /// Adjusted (warning, critical) levels for a filesystem of this size.
    pub fn levels(&self, total_bytes: u64) -> (f64, f64) {
        let total = total_bytes as f64;
        (adjust(total, self.warning, self), adjust(total, self.critical, self))
    }
}

/// Adjust `percent` for a filesystem of `total_bytes`.
///
/// The result is not clamped to 0..=100.
pub fn adjust(total_bytes: f64, percent: f64, cfg: &ThresholdConfig) -> f64 {
    if total_bytes <= cfg.minimum_gib * GIB || cfg.magic == 1.0 {
        return percent;
    }
    let normalized = (total_bytes / GIB) / cfg.normal_gib;
    if normalized == 0.0 || !normalized.is_finite() {
        return percent;
    }
    let perceived = normalized.powf(cfg.magic);
    let scale = perceived / normalized;
    100.0 - (100.0 - percent) * scale
}
