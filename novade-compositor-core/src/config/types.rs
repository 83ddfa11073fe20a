//! Configuration data structures for the compositor core.
//!
//! These structs are populated by deserializing a TOML document. Missing
//! sections and fields fall back to the functions in [`super::defaults`], and
//! unknown fields are rejected through `#[serde(deny_unknown_fields)]`.
//!
//! # Examples
//!
//! ```
//! use novade_compositor_core::config::{CompositorCoreConfig, PresentationOrigin};
//! use novade_compositor_core::region::RegionEngineKind;
//!
//! let config: CompositorCoreConfig = toml::from_str(r#"
//! [occlusion]
//! engine = "pairwise"
//!
//! [presentation]
//! origin = "bottom_left"
//! "#).unwrap();
//! assert_eq!(config.occlusion.engine, RegionEngineKind::Pairwise);
//! assert_eq!(config.presentation.origin, PresentationOrigin::BottomLeft);
//! assert_eq!(config.dirty_region.history_depth, 4);
//! ```

use super::defaults;
use crate::region::RegionEngineKind;
use serde::Deserialize;
use std::path::PathBuf;

/// Settings for the `tracing` subscriber installed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level: "trace", "debug", "info", "warn" or "error" (case-insensitive).
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
    /// Optional log file. When set, output goes to a daily-rolling file.
    #[serde(default = "defaults::default_log_file_path")]
    pub file_path: Option<PathBuf>,
    /// "text" or "json" (case-insensitive).
    #[serde(default = "defaults::default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        defaults::default_logging_config()
    }
}

/// Buffer-age history and alignment of dirty rectangles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirtyRegionConfig {
    /// Number of past frames kept per surface, `1..=16`.
    #[serde(default = "defaults::default_history_depth")]
    pub history_depth: usize,
    /// Dirty rectangles are grown to multiples of this many pixels. 0 and 1 disable alignment.
    #[serde(default = "defaults::default_alignment")]
    pub alignment: i32,
}

impl Default for DirtyRegionConfig {
    fn default() -> Self {
        defaults::default_dirty_region_config()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcclusionConfig {
    /// Which region engine runs the Boolean operations.
    #[serde(default)]
    pub engine: RegionEngineKind,
    /// Skip the occlusion pass when the surface stack did not change.
    #[serde(default = "defaults::default_true")]
    pub reuse_unchanged: bool,
    /// Surface names that always occlude their full rectangle.
    #[serde(default)]
    pub divider_bar_names: Vec<String>,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        defaults::default_occlusion_config()
    }
}

/// Coordinate convention of the rectangles handed to the presentation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationOrigin {
    #[default]
    TopLeft,
    BottomLeft,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresentationConfig {
    #[serde(default)]
    pub origin: PresentationOrigin,
    /// When false every frame damages the whole display.
    #[serde(default = "defaults::default_true")]
    pub partial_render: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        defaults::default_presentation_config()
    }
}

/// Root configuration of the compositor core.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositorCoreConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dirty_region: DirtyRegionConfig,
    #[serde(default)]
    pub occlusion: OcclusionConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
}
