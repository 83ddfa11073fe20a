//! Per-frame driver tying dirty tracking, occlusion and damage together.
//!
//! A frame runs through these stages in order:
//!
//! 1. [`FramePipeline::begin_frame`] clears every accumulator.
//! 2. [`FramePipeline::apply_updates`] feeds the surface stack's geometry and
//!    content changes into the per-surface managers and the display manager.
//! 3. [`FramePipeline::merge_history`] applies buffer ages.
//! 4. [`FramePipeline::calc_occlusion`] computes visible regions.
//! 5. [`FramePipeline::aggregate`] produces the damage to present.
//!
//! [`FramePipeline::run_frame`] does all of it. Calling a stage out of order
//! is logged and proceeds; the result may be stale but never inconsistent.

use crate::config::CompositorCoreConfig;
use crate::damage::{DamageAggregator, FrameDamage};
use crate::dirty_region::DirtyRegionManager;
use crate::error::CoreError;
use crate::occlusion::{OcclusionCalculator, OcclusionPass};
use crate::surface::{SurfaceId, SurfaceStack};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Where the pipeline is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    /// No frame in progress.
    Idle,
    Began,
    Updated,
    HistoryMerged,
    OcclusionDone,
    /// Damage was produced; the next call should be `begin_frame`.
    Aggregated,
}

/// Tracking state as of the last completed frame.
#[derive(Debug)]
struct FrameCheckpoint {
    display: DirtyRegionManager,
    surfaces: HashMap<SurfaceId, DirtyRegionManager>,
    damage: DamageAggregator,
}

#[derive(Debug)]
pub struct FramePipeline {
    history_depth: usize,
    display: DirtyRegionManager,
    surfaces: HashMap<SurfaceId, DirtyRegionManager>,
    occlusion: OcclusionCalculator,
    damage: DamageAggregator,
    stage: FrameStage,
    frame_count: u64,
    checkpoint: Option<FrameCheckpoint>,
}

impl FramePipeline {
    /// Creates a pipeline for a display of `width` x `height` pixels.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidInput`] for a negative display size.
    pub fn new(width: i32, height: i32, config: &CompositorCoreConfig) -> Result<Self, CoreError> {
        let history_depth = config.dirty_region.history_depth;
        let mut display = DirtyRegionManager::with_history_depth(history_depth);
        if !display.set_surface_size(width, height) {
            return Err(CoreError::InvalidInput(format!("display size {}x{} is negative", width, height)));
        }
        let occlusion = OcclusionCalculator::from_config(&config.occlusion);
        info!(
            width,
            height,
            engine = occlusion.engine().name(),
            history_depth,
            "frame pipeline created"
        );
        Ok(Self {
            history_depth,
            display,
            surfaces: HashMap::new(),
            occlusion,
            damage: DamageAggregator::from_config(width, height, &config.presentation, config.dirty_region.alignment),
            stage: FrameStage::Idle,
            frame_count: 0,
            checkpoint: None,
        })
    }

    /// A pipeline with the default configuration.
    pub fn with_defaults(width: i32, height: i32) -> Result<Self, CoreError> {
        Self::new(width, height, &CompositorCoreConfig::default())
    }

    fn expect_stage(&self, expected: &[FrameStage], operation: &'static str) {
        if !expected.contains(&self.stage) {
            warn!(stage = ?self.stage, ?expected, operation, "frame stage called out of order");
        }
    }

    /// Starts a new frame by clearing the current-frame accumulators.
    ///
    /// The history and surface state left by the previous frame are kept
    /// aside until [`aggregate`](Self::aggregate) so that
    /// [`cancel_frame`](Self::cancel_frame) can return to them. A frame begun
    /// while another is unfinished cancels that one first.
    pub fn begin_frame(&mut self) {
        self.expect_stage(&[FrameStage::Idle, FrameStage::Aggregated], "begin_frame");
        if self.checkpoint.is_some() {
            // The previous frame never reached aggregation.
            self.cancel_frame();
        }
        self.display.clear();
        for manager in self.surfaces.values_mut() {
            manager.clear();
        }
        self.checkpoint = Some(FrameCheckpoint {
            display: self.display.clone(),
            surfaces: self.surfaces.clone(),
            damage: self.damage.clone(),
        });
        self.frame_count += 1;
        self.stage = FrameStage::Began;
        debug!(frame = self.frame_count, "frame begun");
    }

    /// Records the stack's geometry and content changes.
    ///
    /// Managers are created for new surfaces and dropped for surfaces that
    /// left the stack.
    pub fn apply_updates(&mut self, stack: &SurfaceStack) {
        self.expect_stage(&[FrameStage::Began], "apply_updates");

        let before = self.surfaces.len();
        self.surfaces.retain(|id, _| stack.contains(*id));
        if self.surfaces.len() != before {
            debug!(removed = before - self.surfaces.len(), "dropped dirty managers of removed surfaces");
        }

        for surface in stack.iter() {
            let depth = self.history_depth;
            let manager = self
                .surfaces
                .entry(surface.id)
                .or_insert_with(|| DirtyRegionManager::with_history_depth(depth));
            manager.set_surface_rect(surface.dst_rect);
            for rect in &surface.self_dirty_rects {
                manager.merge_dirty_rect(*rect);
            }
        }

        self.damage.collect_display_dirty(stack, &self.surfaces, &mut self.display);
        self.stage = FrameStage::Updated;
    }

    /// Applies the display's buffer age, or a surface's own age where it has one.
    pub fn merge_history(&mut self, stack: &SurfaceStack, display_age: i32) {
        self.expect_stage(&[FrameStage::Updated], "merge_history");
        self.damage.merge_history(stack, &mut self.surfaces, &mut self.display, display_age);
        self.stage = FrameStage::HistoryMerged;
    }

    pub fn calc_occlusion(&mut self, stack: &SurfaceStack) -> OcclusionPass {
        self.expect_stage(&[FrameStage::HistoryMerged], "calc_occlusion");
        let pass = self.occlusion.calculate(stack);
        self.stage = FrameStage::OcclusionDone;
        pass
    }

    pub fn aggregate(&mut self, stack: &SurfaceStack) -> FrameDamage {
        self.expect_stage(&[FrameStage::OcclusionDone], "aggregate");
        let damage = self.damage.aggregate(stack, &self.surfaces, &self.occlusion, &self.display);
        self.checkpoint = None;
        self.stage = FrameStage::Aggregated;
        damage
    }

    /// Runs every stage for one frame.
    pub fn run_frame(&mut self, stack: &SurfaceStack, display_age: i32) -> FrameDamage {
        self.begin_frame();
        self.apply_updates(stack);
        self.merge_history(stack, display_age);
        self.calc_occlusion(stack);
        self.aggregate(stack)
    }

    /// Abandons the frame in progress.
    ///
    /// Dirty history and the recorded surface state go back to where the last
    /// completed frame left them, as if this frame never ran. The occlusion
    /// cache is invalidated. Without a frame to return to, surface state is
    /// forgotten and the next frame redraws every surface.
    pub fn cancel_frame(&mut self) {
        warn!(frame = self.frame_count, stage = ?self.stage, "frame cancelled");
        match self.checkpoint.take() {
            Some(checkpoint) => {
                self.display = checkpoint.display;
                self.surfaces = checkpoint.surfaces;
                self.damage = checkpoint.damage;
            }
            None => self.damage.reset_positions(),
        }
        self.display.clear();
        for manager in self.surfaces.values_mut() {
            manager.clear();
        }
        self.occlusion.invalidate();
        self.stage = FrameStage::Idle;
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Number of frames begun so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn display_manager(&self) -> &DirtyRegionManager {
        &self.display
    }

    pub fn surface_manager(&self, id: SurfaceId) -> Option<&DirtyRegionManager> {
        self.surfaces.get(&id)
    }

    pub fn occlusion(&self) -> &OcclusionCalculator {
        &self.occlusion
    }

    /// Mutable access, e.g. to register visibility listeners.
    pub fn occlusion_mut(&mut self) -> &mut OcclusionCalculator {
        &mut self.occlusion
    }

    pub fn damage(&self) -> &DamageAggregator {
        &self.damage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::surface::SurfaceDescriptor;
    use pretty_assertions::assert_eq;

    fn id(raw: u64) -> SurfaceId {
        SurfaceId::new(raw)
    }

    #[test]
    fn test_negative_display_size_rejected() {
        assert!(matches!(FramePipeline::with_defaults(-1, 100), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_stages_advance_in_order() {
        let stack = SurfaceStack::from_descriptors([SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10))]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        assert_eq!(pipeline.stage(), FrameStage::Idle);
        pipeline.begin_frame();
        assert_eq!(pipeline.stage(), FrameStage::Began);
        pipeline.apply_updates(&stack);
        assert_eq!(pipeline.stage(), FrameStage::Updated);
        pipeline.merge_history(&stack, 1);
        assert_eq!(pipeline.stage(), FrameStage::HistoryMerged);
        pipeline.calc_occlusion(&stack);
        assert_eq!(pipeline.stage(), FrameStage::OcclusionDone);
        pipeline.aggregate(&stack);
        assert_eq!(pipeline.stage(), FrameStage::Aggregated);
        assert_eq!(pipeline.frame_count(), 1);
    }

    #[test]
    fn test_first_frame_damages_every_surface() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10)),
            SurfaceDescriptor::new(id(2), Rect::new(50, 50, 60, 60)),
        ]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        let damage = pipeline.run_frame(&stack, 1);
        // The display manager tracks a bounding rectangle.
        assert_eq!(damage.region.bound(), Rect::new(0, 0, 60, 60));
    }

    #[test]
    fn test_idle_frame_has_no_damage() {
        let mut stack = SurfaceStack::from_descriptors([SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10))]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        pipeline.run_frame(&stack, 1);
        stack.reset_frame_state();
        let damage = pipeline.run_frame(&stack, 1);
        assert!(damage.is_empty());
    }

    #[test]
    fn test_managers_follow_the_stack() {
        let mut stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10)),
            SurfaceDescriptor::new(id(2), Rect::new(0, 0, 20, 20)),
        ]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        pipeline.run_frame(&stack, 1);
        assert!(pipeline.surface_manager(id(2)).is_some());

        stack.remove(id(2));
        pipeline.run_frame(&stack, 1);
        assert!(pipeline.surface_manager(id(2)).is_none());
        assert!(pipeline.surface_manager(id(1)).is_some());
    }

    #[test]
    fn test_out_of_order_calls_still_produce_damage() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10)).with_dirty(Rect::new(0, 0, 5, 5)),
        ]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        // Skips begin_frame and merge_history.
        pipeline.apply_updates(&stack);
        pipeline.calc_occlusion(&stack);
        let damage = pipeline.aggregate(&stack);
        assert_eq!(pipeline.stage(), FrameStage::Aggregated);
        assert!(damage.region.bound().is_inside_of(&Rect::new(0, 0, 10, 10)));
        assert!(!damage.is_empty());
    }

    #[test]
    fn test_cancel_frame_over_draws_next_frame() {
        let mut stack = SurfaceStack::from_descriptors([SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10))]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        pipeline.run_frame(&stack, 1);
        stack.reset_frame_state();

        if let Some(surface) = stack.get_mut(id(1)) {
            surface.set_dst_rect(Rect::new(20, 20, 30, 30));
        }
        pipeline.begin_frame();
        pipeline.apply_updates(&stack);
        pipeline.cancel_frame();
        assert_eq!(pipeline.stage(), FrameStage::Idle);

        let damage = pipeline.run_frame(&stack, 1);
        assert!(pipeline.occlusion().is_visible(id(1)));
        // Both the presented location and the new one are redrawn.
        assert_eq!(damage.region.bound(), Rect::new(0, 0, 30, 30));
    }

    #[test]
    fn test_cancelled_frame_leaves_no_history() {
        let mut stack = SurfaceStack::from_descriptors([SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100))]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        for rect in [Rect::new(0, 0, 10, 10), Rect::new(20, 20, 30, 30)] {
            if let Some(surface) = stack.get_mut(id(1)) {
                surface.add_dirty(rect);
            }
            pipeline.run_frame(&stack, 1);
            stack.reset_frame_state();
        }

        if let Some(surface) = stack.get_mut(id(1)) {
            surface.add_dirty(Rect::new(80, 80, 90, 90));
        }
        pipeline.begin_frame();
        pipeline.apply_updates(&stack);
        pipeline.merge_history(&stack, 1);
        pipeline.cancel_frame();

        pipeline.run_frame(&stack, 2);
        let dirty = pipeline.surface_manager(id(1)).map(DirtyRegionManager::dirty_region);
        assert_eq!(dirty, Some(Rect::new(20, 20, 90, 90)));
    }

    #[test]
    fn test_cancel_without_begin_forgets_positions() {
        let stack = SurfaceStack::from_descriptors([SurfaceDescriptor::new(id(1), Rect::new(0, 0, 10, 10))]);
        let mut pipeline = FramePipeline::with_defaults(100, 100).unwrap();
        pipeline.run_frame(&stack, 1);
        pipeline.cancel_frame();
        let damage = pipeline.run_frame(&stack, 1);
        assert_eq!(damage.region.bound(), Rect::new(0, 0, 10, 10));
    }
}
