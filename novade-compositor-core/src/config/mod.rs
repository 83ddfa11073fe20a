//! Configuration of the compositor core.
//!
//! - [`types`]: the schema, rooted at [`CompositorCoreConfig`].
//! - [`defaults`]: default values used when fields or sections are missing.
//! - [`loader`]: [`ConfigLoader`], which reads, parses and validates TOML.
//!
//! The configuration only selects behavior of the host integration (which
//! region engine to use, how much buffer history to keep, the presentation
//! coordinate convention). The core itself has no file format.

pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::{ConfigLoader, CONFIG_PATH_ENV};
pub use types::{
    CompositorCoreConfig, DirtyRegionConfig, LoggingConfig, OcclusionConfig, PresentationConfig, PresentationOrigin,
};
