//! # NovaDE Compositor Core (`novade-compositor-core`)
//!
//! Damage tracking and occlusion culling for the NovaDE compositor. Given the
//! stack of surfaces on a display and what changed since the last frame, it
//! works out which pixels have to be redrawn and which surfaces can be skipped.
//!
//! ## Components
//!
//! - **Region algebra** ([`region`]): canonical sets of rectangles with
//!   intersection, union, symmetric difference and subtraction. Two
//!   interchangeable engines compute them, a sweep line (default) and a
//!   pairwise reference.
//! - **Dirty tracking** ([`dirty_region`]): one [`DirtyRegionManager`] per
//!   surface and one for the display, with buffer-age history.
//! - **Occlusion** ([`occlusion`]): the visible region of every surface,
//!   visibility change events and per-process visibility.
//! - **Damage** ([`damage`]): the final damage list of a frame.
//! - **Frame driver** ([`frame`]): [`FramePipeline`] runs the stages in order.
//!
//! Configuration ([`config`]), errors ([`error`]) and logging setup
//! ([`logging`]) follow the rest of NovaDE.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use novade_compositor_core::config::ConfigLoader;
//! use novade_compositor_core::geometry::Rect;
//! use novade_compositor_core::logging::init_logging;
//! use novade_compositor_core::surface::{SurfaceDescriptor, SurfaceId, SurfaceStack};
//! use novade_compositor_core::{CoreError, FramePipeline};
//!
//! fn main() -> Result<(), CoreError> {
//!     let config = ConfigLoader::load()?;
//!     init_logging(&config.logging, false)?;
//!
//!     let mut stack = SurfaceStack::from_descriptors([
//!         SurfaceDescriptor::new(SurfaceId::new(1), Rect::from_xywh(0, 0, 800, 600)),
//!     ]);
//!     let mut pipeline = FramePipeline::new(1920, 1080, &config)?;
//!     let damage = pipeline.run_frame(&stack, 1);
//!     tracing::info!(rects = damage.rects.len(), "frame damage computed");
//!     stack.reset_frame_state();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod damage;
pub mod dirty_region;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod logging;
pub mod occlusion;
pub mod region;
pub mod surface;

// Re-export key types for convenience
pub use config::{CompositorCoreConfig, ConfigLoader};
pub use damage::{DamageAggregator, FrameDamage, SurfaceDamage};
pub use dirty_region::DirtyRegionManager;
pub use error::{ConfigError, CoreError};
pub use frame::{FramePipeline, FrameStage};
pub use geometry::Rect;
pub use occlusion::{OcclusionCalculator, OcclusionPass, VisibilityChangedEvent, VisibilityListener};
pub use region::{Region, RegionEngineKind, RegionOp, RegionOpEngine};
pub use surface::{SurfaceChangeFlags, SurfaceDescriptor, SurfaceId, SurfaceStack};
