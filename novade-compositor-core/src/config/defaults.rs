//! Default configuration values.
//!
//! Used by `serde`'s `default` attribute in [`super::types`] and by the
//! `Default` impls of the configuration structs.

use super::types::{DirtyRegionConfig, LoggingConfig, OcclusionConfig, PresentationConfig, PresentationOrigin};
use crate::dirty_region::DEFAULT_HISTORY_DEPTH;
use crate::region::RegionEngineKind;
use std::path::PathBuf;

/// Largest accepted `dirty_region.history_depth`.
pub const MAX_HISTORY_DEPTH: usize = 16;

pub(super) fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        file_path: default_log_file_path(),
        format: default_log_format(),
    }
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

/// No log file by default.
pub(super) fn default_log_file_path() -> Option<PathBuf> {
    None
}

pub(super) fn default_log_format() -> String {
    "text".to_string()
}

pub(super) fn default_dirty_region_config() -> DirtyRegionConfig {
    DirtyRegionConfig {
        history_depth: default_history_depth(),
        alignment: default_alignment(),
    }
}

pub(super) fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

pub(super) fn default_alignment() -> i32 {
    0
}

pub(super) fn default_occlusion_config() -> OcclusionConfig {
    OcclusionConfig {
        engine: RegionEngineKind::default(),
        reuse_unchanged: default_true(),
        divider_bar_names: Vec::new(),
    }
}

pub(super) fn default_presentation_config() -> PresentationConfig {
    PresentationConfig {
        origin: PresentationOrigin::default(),
        partial_render: default_true(),
    }
}

pub(super) fn default_true() -> bool {
    true
}
