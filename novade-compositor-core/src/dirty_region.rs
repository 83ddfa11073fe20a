//! Per-surface and per-display dirty rectangle accumulation with buffer-age history.
//!
//! A [`DirtyRegionManager`] collects everything that changed during one frame
//! into a single bounding rectangle. When the frame is presented into a
//! back-buffer that was last drawn `age` frames ago, the rectangles of the
//! intervening frames have to be redrawn too; the manager keeps a short ring of
//! previous frames for exactly that purpose.
//!
//! Per frame the caller runs, in order:
//! 1. [`DirtyRegionManager::clear`]
//! 2. any number of [`DirtyRegionManager::merge_dirty_rect`] calls
//! 3. [`DirtyRegionManager::set_buffer_age`] followed by [`DirtyRegionManager::update_dirty`]
//! 4. [`DirtyRegionManager::dirty_region`] to read the result

use crate::geometry::Rect;
use crate::surface::SurfaceId;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

/// Number of past frames retained when no depth is configured.
pub const DEFAULT_HISTORY_DEPTH: usize = 4;

/// Accumulates the dirty rectangle of one surface or display.
#[derive(Debug, Clone)]
pub struct DirtyRegionManager {
    dirty: Rect,
    /// Oldest entry at the front, newest at the back.
    history: VecDeque<Rect>,
    history_depth: usize,
    buffer_age: u32,
    surface_rect: Rect,
    dirty_surface_nodes: BTreeMap<SurfaceId, Rect>,
}

impl Default for DirtyRegionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DirtyRegionManager {
    pub fn new() -> Self {
        Self::with_history_depth(DEFAULT_HISTORY_DEPTH)
    }

    /// Creates a manager retaining `depth` frames. A depth of zero is raised to one.
    pub fn with_history_depth(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            dirty: Rect::EMPTY,
            history: VecDeque::with_capacity(depth),
            history_depth: depth,
            buffer_age: 0,
            surface_rect: Rect::EMPTY,
            dirty_surface_nodes: BTreeMap::new(),
        }
    }

    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    /// Resets the current frame's rectangle and the dirty node map. History is kept.
    pub fn clear(&mut self) {
        self.dirty = Rect::EMPTY;
        self.dirty_surface_nodes.clear();
    }

    /// Grows the current frame's rectangle to include `rect`.
    pub fn merge_dirty_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            if rect.right < rect.left || rect.bottom < rect.top {
                debug!(%rect, "ignoring malformed dirty rectangle");
            }
            return;
        }
        self.dirty = self.dirty.join(&rect);
    }

    /// Restricts the current frame's rectangle to `rect`.
    pub fn intersect_dirty_rect(&mut self, rect: Rect) {
        self.dirty = self.dirty.intersect(&rect);
    }

    /// Restricts the current frame's rectangle to the surface bounds and the
    /// positive quadrant.
    pub fn clip_dirty_rect_within_surface(&mut self) {
        let left = self.dirty.left.max(0).max(self.surface_rect.left);
        let top = self.dirty.top.max(0).max(self.surface_rect.top);
        let right = self.dirty.right.min(self.surface_rect.right);
        let bottom = self.dirty.bottom.min(self.surface_rect.bottom);
        let clipped = Rect::new(left, top, right, bottom);
        self.dirty = if clipped.is_empty() { Rect::EMPTY } else { clipped };
    }

    /// Marks the whole surface dirty for this frame.
    pub fn reset_dirty_as_surface_size(&mut self) {
        self.dirty = self.surface_rect;
    }

    /// Sets the surface bounds to `[0, 0, width, height)`.
    ///
    /// Returns `false` and leaves the bounds untouched for negative sizes.
    pub fn set_surface_size(&mut self, width: i32, height: i32) -> bool {
        if width < 0 || height < 0 {
            warn!(width, height, "rejecting negative surface size");
            return false;
        }
        self.surface_rect = Rect::from_xywh(0, 0, width, height);
        true
    }

    /// Sets the surface bounds to an absolute rectangle on the display.
    pub fn set_surface_rect(&mut self, rect: Rect) {
        self.surface_rect = rect;
    }

    pub fn surface_rect(&self) -> Rect {
        self.surface_rect
    }

    /// Records how many frames ago the target buffer was last drawn.
    ///
    /// Ages outside `1..=history_depth` cannot be satisfied from history; the
    /// age is reset, the next [`update_dirty`](Self::update_dirty) falls back to
    /// redrawing the whole surface, and `false` is returned.
    pub fn set_buffer_age(&mut self, age: i32) -> bool {
        match u32::try_from(age) {
            Ok(valid) if valid >= 1 && valid as usize <= self.history_depth => {
                self.buffer_age = valid;
                true
            }
            _ => {
                warn!(age, depth = self.history_depth, "invalid buffer age, forcing full redraw");
                self.buffer_age = 0;
                false
            }
        }
    }

    pub fn buffer_age(&self) -> u32 {
        self.buffer_age
    }

    /// Pushes the current frame into history and widens the dirty rectangle
    /// to cover every frame the target buffer has missed.
    ///
    /// An age of 1 needs only the current frame. If the age is invalid or
    /// reaches further back than the recorded history, the result covers the
    /// whole surface together with all retained history.
    pub fn update_dirty(&mut self) {
        self.push_history(self.dirty);
        let age = self.buffer_age as usize;
        if age == 0 || age > self.history.len() {
            if age != 0 {
                debug!(age, recorded = self.history.len(), "buffer older than recorded history");
            }
            self.dirty = self.history.iter().fold(self.surface_rect, |acc, r| acc.join(r));
            return;
        }
        self.dirty = self.history.iter().rev().take(age).fold(Rect::EMPTY, |acc, r| acc.join(r));
    }

    /// Aligns the dirty rectangle outwards to a multiple of `bits`.
    pub fn update_dirty_by_aligned(&mut self, bits: i32) {
        self.dirty = self.dirty.pixel_aligned(bits);
    }

    /// The effective dirty rectangle.
    pub fn dirty_region(&self) -> Rect {
        self.dirty
    }

    /// The dirty rectangle of the most recently recorded frame, or the
    /// current one if nothing was recorded yet.
    pub fn latest_dirty_region(&self) -> Rect {
        self.history.back().copied().unwrap_or(self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// The dirty rectangle with a bottom-left origin inside the surface.
    pub fn dirty_region_flipped_within_surface(&self) -> Rect {
        self.rect_flipped_within_surface(self.dirty)
    }

    /// `rect` with a bottom-left origin inside the surface.
    pub fn rect_flipped_within_surface(&self, rect: Rect) -> Rect {
        rect.flip_within(self.surface_rect.height())
    }

    /// Remembers the dirty rectangle contributed by one surface this frame.
    pub fn update_dirty_surface_node(&mut self, id: SurfaceId, rect: Rect) {
        self.dirty_surface_nodes.insert(id, rect);
    }

    pub fn dirty_surface_nodes(&self) -> &BTreeMap<SurfaceId, Rect> {
        &self.dirty_surface_nodes
    }

    fn push_history(&mut self, rect: Rect) {
        if self.history.len() == self.history_depth {
            self.history.pop_front();
        }
        self.history.push_back(rect);
    }
}
