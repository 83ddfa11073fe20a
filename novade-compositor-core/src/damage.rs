//! Final damage computation for one frame.
//!
//! Display-level changes (surfaces that moved, appeared, disappeared or were
//! restacked, and content behind transparent surfaces) go into the display's
//! [`DirtyRegionManager`]. Each surface's own history-merged dirty rectangle is
//! clipped to the part of it that is actually visible. The union of both is
//! what has to be redrawn.

use crate::config::{PresentationConfig, PresentationOrigin};
use crate::dirty_region::DirtyRegionManager;
use crate::geometry::Rect;
use crate::occlusion::OcclusionCalculator;
use crate::region::{Region, RegionOp};
use crate::surface::{SurfaceChangeFlags, SurfaceDescriptor, SurfaceId, SurfaceStack};
use std::collections::HashMap;
use tracing::{debug, debug_span, trace, warn};

/// Damage bookkeeping for one surface after aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceDamage {
    /// Changed pixels of this surface that are not occluded.
    pub visible_dirty: Region,
    /// The display-level dirty rectangle of the same frame.
    pub global_dirty: Rect,
}

/// Result of [`DamageAggregator::aggregate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameDamage {
    /// Damage in display coordinates with a top-left origin.
    pub region: Region,
    /// The rectangles to submit, in the presentation coordinate convention.
    pub rects: Vec<Rect>,
    /// True when partial rendering is off and the whole display is redrawn.
    pub full_screen: bool,
}

impl FrameDamage {
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// What the previous frame presented of one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PresentedSurface {
    dst_rect: Rect,
    alpha_bits: u32,
    is_transparent: bool,
    opaque_region: Option<Region>,
}

impl PresentedSurface {
    fn of(surface: &SurfaceDescriptor) -> Self {
        Self {
            dst_rect: surface.dst_rect,
            alpha_bits: surface.alpha.to_bits(),
            is_transparent: surface.is_transparent,
            opaque_region: surface.opaque_region.clone(),
        }
    }

    fn same_opacity(&self, other: &Self) -> bool {
        self.alpha_bits == other.alpha_bits
            && self.is_transparent == other.is_transparent
            && self.opaque_region == other.opaque_region
    }
}

#[derive(Debug, Clone)]
pub struct DamageAggregator {
    display_rect: Rect,
    origin: PresentationOrigin,
    partial_render: bool,
    alignment: i32,
    last_presented: HashMap<SurfaceId, PresentedSurface>,
    surface_damage: HashMap<SurfaceId, SurfaceDamage>,
}

impl DamageAggregator {
    /// Creates an aggregator for a display of the given size.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            display_rect: Rect::from_xywh(0, 0, width.max(0), height.max(0)),
            origin: PresentationOrigin::TopLeft,
            partial_render: true,
            alignment: 0,
            last_presented: HashMap::new(),
            surface_damage: HashMap::new(),
        }
    }

    pub fn from_config(width: i32, height: i32, config: &PresentationConfig, alignment: i32) -> Self {
        let mut aggregator = Self::new(width, height);
        aggregator.origin = config.origin;
        aggregator.partial_render = config.partial_render;
        aggregator.alignment = alignment;
        aggregator
    }

    pub fn set_origin(&mut self, origin: PresentationOrigin) {
        self.origin = origin;
    }

    pub fn set_partial_render(&mut self, enabled: bool) {
        self.partial_render = enabled;
    }

    pub fn display_rect(&self) -> Rect {
        self.display_rect
    }

    /// Collects display-level damage into `display` from the current frame's
    /// per-surface dirty rectangles, before any history is merged.
    ///
    /// Changes are detected against the previous frame's geometry and opacity,
    /// and also from the surfaces' change flags. This frame's state is
    /// recorded for the next one.
    pub fn collect_display_dirty(
        &mut self,
        stack: &SurfaceStack,
        managers: &HashMap<SurfaceId, DirtyRegionManager>,
        display: &mut DirtyRegionManager,
    ) {
        let mut presented_now = HashMap::with_capacity(stack.len());
        for surface in stack.iter() {
            let dirty = managers.get(&surface.id).map_or(Rect::EMPTY, DirtyRegionManager::dirty_region);

            if surface.is_transparent {
                let transparent_dirty = surface.dst_rect.intersect(&dirty);
                if !transparent_dirty.is_empty() {
                    trace!(surface = %surface.id, rect = %transparent_dirty, "display dirty: transparent surface");
                    display.merge_dirty_rect(transparent_dirty);
                }
            }

            if surface.change_flags.contains(SurfaceChangeFlags::ZORDER) {
                trace!(surface = %surface.id, rect = %surface.dst_rect, "display dirty: z-order changed");
                display.merge_dirty_rect(surface.dst_rect);
            }

            let presented = PresentedSurface::of(surface);
            match self.last_presented.get(&surface.id) {
                None => {
                    trace!(surface = %surface.id, rect = %surface.dst_rect, "display dirty: new surface");
                    display.merge_dirty_rect(surface.dst_rect);
                }
                Some(last) if last.dst_rect != surface.dst_rect => {
                    trace!(surface = %surface.id, from = %last.dst_rect, to = %surface.dst_rect, "display dirty: surface moved");
                    display.merge_dirty_rect(last.dst_rect);
                    display.merge_dirty_rect(surface.dst_rect);
                }
                Some(last)
                    if !last.same_opacity(&presented)
                        || surface
                            .change_flags
                            .intersects(SurfaceChangeFlags::ALPHA | SurfaceChangeFlags::OPAQUE_REGION) =>
                {
                    trace!(surface = %surface.id, rect = %surface.dst_rect, "display dirty: opacity changed");
                    display.merge_dirty_rect(surface.dst_rect);
                }
                Some(_) => {}
            }

            if !surface.transparent_region.is_empty() && !dirty.is_empty() {
                let behind = surface.transparent_region.and(&Region::from_rect(dirty));
                for rect in behind.rects() {
                    display.merge_dirty_rect(*rect);
                }
            }
            presented_now.insert(surface.id, presented);
        }

        for (id, last) in &self.last_presented {
            if !presented_now.contains_key(id) {
                trace!(surface = %id, rect = %last.dst_rect, "display dirty: surface removed");
                display.merge_dirty_rect(last.dst_rect);
            }
        }
        self.last_presented = presented_now;
    }

    /// Applies buffer-age history to every surface and to the display.
    ///
    /// Surfaces use their own buffer age when they carry one, otherwise the
    /// display's.
    pub fn merge_history(
        &self,
        stack: &SurfaceStack,
        managers: &mut HashMap<SurfaceId, DirtyRegionManager>,
        display: &mut DirtyRegionManager,
        display_age: i32,
    ) {
        for surface in stack.iter() {
            let Some(manager) = managers.get_mut(&surface.id) else {
                warn!(surface = %surface.id, "no dirty region manager for surface, skipping history merge");
                continue;
            };
            let age = surface.buffer_age.unwrap_or(display_age);
            if !manager.set_buffer_age(age) {
                debug!(surface = %surface.id, age, "surface redrawn in full");
            }
            manager.intersect_dirty_rect(surface.dst_rect);
            manager.update_dirty();
            if self.alignment > 1 {
                manager.update_dirty_by_aligned(self.alignment);
            }
            if manager.is_dirty() {
                display.update_dirty_surface_node(surface.id, manager.dirty_region());
            }
            if surface.has_container_window && surface.dst_rect.is_inside_of(&manager.dirty_region()) {
                display.merge_dirty_rect(surface.dst_rect);
            }
        }

        display.set_buffer_age(display_age);
        display.update_dirty();
        if self.alignment > 1 {
            display.update_dirty_by_aligned(self.alignment);
        }
    }

    /// Combines per-surface visible dirty regions with the display dirty rectangle.
    pub fn aggregate(
        &mut self,
        stack: &SurfaceStack,
        managers: &HashMap<SurfaceId, DirtyRegionManager>,
        occlusion: &OcclusionCalculator,
        display: &DirtyRegionManager,
    ) -> FrameDamage {
        let span = debug_span!("damage_aggregation", surfaces = stack.len());
        let _enter = span.enter();

        let engine = occlusion.engine();
        let global_dirty = display.dirty_region();
        let mut surface_damage = HashMap::with_capacity(stack.len());
        let mut damage = Region::new();

        for surface in stack.iter() {
            let dirty = managers.get(&surface.id).map_or(Rect::EMPTY, DirtyRegionManager::dirty_region);
            let visible_dirty = match occlusion.visible_region(surface.id) {
                Some(visible) => Region::from_rect(dirty).combine_with(visible, RegionOp::And, engine),
                None => {
                    warn!(surface = %surface.id, "no visibility computed for surface, treating it as fully visible");
                    Region::from_rect(dirty.intersect(&surface.dst_rect))
                }
            };
            damage = damage.combine_with(&visible_dirty, RegionOp::Or, engine);
            surface_damage.insert(surface.id, SurfaceDamage { visible_dirty, global_dirty });
        }
        self.surface_damage = surface_damage;

        let region = if self.partial_render {
            let with_display = damage.combine_with(&Region::from_rect(global_dirty), RegionOp::Or, engine);
            with_display.and(&Region::from_rect(self.display_rect))
        } else {
            Region::from_rect(self.display_rect)
        };

        let rects = match self.origin {
            PresentationOrigin::TopLeft => region.rects().to_vec(),
            PresentationOrigin::BottomLeft => {
                region.rects().iter().map(|r| r.flip_within(self.display_rect.height())).collect()
            }
        };
        debug!(rects = rects.len(), area = region.area(), full_screen = !self.partial_render, "frame damage");
        FrameDamage { region, rects, full_screen: !self.partial_render }
    }

    /// Damage bookkeeping of one surface from the last aggregation.
    pub fn surface_damage(&self, id: SurfaceId) -> Option<&SurfaceDamage> {
        self.surface_damage.get(&id)
    }

    /// Forgets the previous frame so the next one treats every surface as new.
    pub fn reset_positions(&mut self) {
        self.last_presented.clear();
    }
}
