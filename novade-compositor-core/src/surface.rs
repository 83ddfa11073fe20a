//! Per-frame surface descriptors and the front-to-back surface stack.
//!
//! The compositor's scene layer fills a [`SurfaceStack`] every frame with one
//! [`SurfaceDescriptor`] per on-screen surface. The damage and occlusion passes
//! only read the stack; they never own surfaces.

use crate::geometry::Rect;
use crate::region::Region;
use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Identifier of an on-screen surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Wraps an identifier handed out by the scene layer.
    pub const fn new(raw: u64) -> Self {
        SurfaceId(raw)
    }

    /// Creates a new, process-unique `SurfaceId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        SurfaceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Identifier of the client process owning a surface.
pub type ProcessId = u32;

bitflags! {
    /// What changed on a surface since the previous frame.
    ///
    /// Set by the property/geometry update step, read by the occlusion
    /// pre-check and the display dirty collection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceChangeFlags: u32 {
        /// The surface moved in the stacking order.
        const ZORDER = 1;
        /// The destination rectangle moved or resized.
        const DST_RECT = 1 << 1;
        /// Opacity changed.
        const ALPHA = 1 << 2;
        /// The declared opaque region changed.
        const OPAQUE_REGION = 1 << 3;
        /// New content was submitted.
        const DIRTY_UPDATED = 1 << 4;
    }
}

impl SurfaceChangeFlags {
    /// Changes that can alter which pixels are occluded.
    pub fn affects_occlusion(&self) -> bool {
        self.intersects(Self::ZORDER | Self::DST_RECT | Self::ALPHA | Self::OPAQUE_REGION)
    }
}

/// Everything the damage and occlusion passes need to know about one surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDescriptor {
    pub id: SurfaceId,
    /// Name used for logging and for matching divider bars.
    pub name: String,
    pub process_id: ProcessId,
    /// Absolute destination rectangle on the display.
    pub dst_rect: Rect,
    /// Opacity in `[0.0, 1.0]`.
    pub alpha: f32,
    pub is_transparent: bool,
    /// Security surfaces never occlude anything and are never occluded.
    pub is_security: bool,
    /// Opaque part of the surface in display coordinates. `None` means the
    /// whole destination rectangle when the surface is opaque.
    pub opaque_region: Option<Region>,
    /// Transparent part of an otherwise opaque surface, in display coordinates.
    pub transparent_region: Region,
    /// Rectangles changed by the surface itself this frame, in display coordinates.
    pub self_dirty_rects: Vec<Rect>,
    pub change_flags: SurfaceChangeFlags,
    /// Whether the surface is decorated by a container window.
    pub has_container_window: bool,
    /// Buffer age overriding the display's, if the surface presents on its own.
    pub buffer_age: Option<i32>,
}

impl SurfaceDescriptor {
    /// An opaque, fully visible surface with no pending changes.
    pub fn new(id: SurfaceId, dst_rect: Rect) -> Self {
        Self {
            id,
            name: String::new(),
            process_id: 0,
            dst_rect,
            alpha: 1.0,
            is_transparent: false,
            is_security: false,
            opaque_region: None,
            transparent_region: Region::new(),
            self_dirty_rects: Vec::new(),
            change_flags: SurfaceChangeFlags::empty(),
            has_container_window: false,
            buffer_age: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_process(mut self, process_id: ProcessId) -> Self {
        self.process_id = process_id;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.is_transparent = true;
        self
    }

    pub fn security(mut self) -> Self {
        self.is_security = true;
        self
    }

    pub fn with_opaque_region(mut self, region: Region) -> Self {
        self.opaque_region = Some(region);
        self
    }

    pub fn with_transparent_region(mut self, region: Region) -> Self {
        self.transparent_region = region;
        self
    }

    pub fn with_dirty(mut self, rect: Rect) -> Self {
        self.self_dirty_rects.push(rect);
        self.change_flags |= SurfaceChangeFlags::DIRTY_UPDATED;
        self
    }

    pub fn with_flags(mut self, flags: SurfaceChangeFlags) -> Self {
        self.change_flags |= flags;
        self
    }

    pub fn with_container_window(mut self) -> Self {
        self.has_container_window = true;
        self
    }

    pub fn with_buffer_age(mut self, age: i32) -> Self {
        self.buffer_age = Some(age);
        self
    }

    /// Opaque surfaces are not flagged transparent and have full alpha.
    pub fn is_opaque(&self) -> bool {
        !self.is_transparent && self.alpha >= 1.0
    }

    /// The pixels this surface hides from everything below it.
    pub fn opaque_portion(&self) -> Region {
        if !self.is_opaque() {
            return Region::new();
        }
        let dst = Region::from_rect(self.dst_rect);
        match &self.opaque_region {
            Some(region) => region.and(&dst),
            None => dst,
        }
    }

    /// Moves the surface and records the change.
    pub fn set_dst_rect(&mut self, rect: Rect) {
        if self.dst_rect != rect {
            self.dst_rect = rect;
            self.change_flags |= SurfaceChangeFlags::DST_RECT;
        }
    }

    /// Records a content change in display coordinates.
    pub fn add_dirty(&mut self, rect: Rect) {
        self.self_dirty_rects.push(rect);
        self.change_flags |= SurfaceChangeFlags::DIRTY_UPDATED;
    }
}

/// The frame's surfaces in front-to-back order; index 0 is the topmost.
#[derive(Debug, Clone, Default)]
pub struct SurfaceStack {
    order: Vec<SurfaceId>,
    surfaces: HashMap<SurfaceId, SurfaceDescriptor>,
}

impl SurfaceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stack from descriptors given topmost first.
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = SurfaceDescriptor>,
    {
        let mut stack = Self::new();
        for descriptor in descriptors {
            stack.push_bottom(descriptor);
        }
        stack
    }

    /// Adds a surface below every existing one. Re-adding an id replaces the
    /// descriptor and keeps its position.
    pub fn push_bottom(&mut self, descriptor: SurfaceDescriptor) {
        let id = descriptor.id;
        if self.surfaces.insert(id, descriptor).is_none() {
            self.order.push(id);
        }
    }

    /// Adds a surface above every existing one.
    pub fn push_top(&mut self, descriptor: SurfaceDescriptor) {
        let id = descriptor.id;
        if self.surfaces.insert(id, descriptor).is_none() {
            self.order.insert(0, id);
        }
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<SurfaceDescriptor> {
        self.order.retain(|existing| *existing != id);
        self.surfaces.remove(&id)
    }

    /// Replaces the stacking order. Surfaces whose position changed are
    /// flagged with [`SurfaceChangeFlags::ZORDER`].
    ///
    /// The order may name ids without a descriptor; traversal skips them.
    pub fn set_order(&mut self, order: Vec<SurfaceId>) {
        for (index, id) in order.iter().enumerate() {
            if self.order.get(index) != Some(id) {
                if let Some(surface) = self.surfaces.get_mut(id) {
                    surface.change_flags |= SurfaceChangeFlags::ZORDER;
                }
            }
        }
        self.order = order;
    }

    pub fn get(&self, id: SurfaceId) -> Option<&SurfaceDescriptor> {
        self.surfaces.get(&id)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut SurfaceDescriptor> {
        self.surfaces.get_mut(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Stacking order, topmost first.
    pub fn ids(&self) -> &[SurfaceId] {
        &self.order
    }

    /// Number of surfaces with a descriptor.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Descriptors topmost first. Ids in the order without a descriptor are
    /// skipped with a warning.
    pub fn iter(&self) -> impl Iterator<Item = &SurfaceDescriptor> + '_ {
        self.order.iter().filter_map(move |id| {
            let surface = self.surfaces.get(id);
            if surface.is_none() {
                warn!(surface = %id, "surface in stacking order has no descriptor, skipping");
            }
            surface
        })
    }

    /// True if any surface carries one of the given change flags.
    pub fn any_changed(&self, flags: SurfaceChangeFlags) -> bool {
        self.surfaces.values().any(|s| s.change_flags.intersects(flags))
    }

    /// Clears change flags and per-frame dirty rectangles once a frame is done.
    pub fn reset_frame_state(&mut self) {
        for surface in self.surfaces.values_mut() {
            surface.change_flags = SurfaceChangeFlags::empty();
            surface.self_dirty_rects.clear();
        }
    }
}
