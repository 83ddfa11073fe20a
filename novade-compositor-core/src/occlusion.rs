//! Occlusion culling over the frame's surface stack.
//!
//! Surfaces are walked topmost first. Each surface's visible region is its
//! destination rectangle minus everything opaque above it; its own opaque
//! portion is then added to the running occluder. Listeners learn about
//! surfaces that became visible or hidden, and about processes whose overall
//! visibility changed.

use crate::config::OcclusionConfig;
use crate::region::{Region, RegionOp, RegionOpEngine, SweepLineEngine};
use crate::geometry::Rect;
use crate::surface::{ProcessId, SurfaceChangeFlags, SurfaceDescriptor, SurfaceId, SurfaceStack};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

/// Delivered when the set of visible surfaces differs from the previous pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChangedEvent {
    /// Surfaces whose visibility flipped, mapped to their new visibility.
    pub changes: BTreeMap<SurfaceId, bool>,
    /// Every currently visible surface, sorted by id.
    pub visible: Vec<SurfaceId>,
}

/// Receives visibility notifications from an [`OcclusionCalculator`].
pub trait VisibilityListener: Send + Sync {
    fn on_visibility_changed(&self, event: &VisibilityChangedEvent);

    /// Called with the full per-process map whenever any entry changed.
    fn on_process_visibility_changed(&self, _visibility: &BTreeMap<ProcessId, bool>) {}
}

/// Handle returned by [`OcclusionCalculator::register_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Summary of one [`OcclusionCalculator::calculate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcclusionPass {
    /// False if the previous results were reused.
    pub recomputed: bool,
    pub visibility_changed: Option<VisibilityChangedEvent>,
    pub process_visibility_changed: bool,
}

/// The inputs of one surface that decide what it hides and what hides it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OcclusionInputs {
    dst_rect: Rect,
    alpha_bits: u32,
    is_transparent: bool,
    is_security: bool,
    is_divider_bar: bool,
    opaque_region: Option<Region>,
    process_id: ProcessId,
}

pub struct OcclusionCalculator {
    engine: Arc<dyn RegionOpEngine>,
    divider_bar_names: HashSet<String>,
    reuse_unchanged: bool,
    invalidated: bool,
    last_surface_count: usize,
    last_order: Vec<SurfaceId>,
    last_inputs: HashMap<SurfaceId, OcclusionInputs>,
    visible_regions: HashMap<SurfaceId, Region>,
    visible: BTreeSet<SurfaceId>,
    process_visibility: BTreeMap<ProcessId, bool>,
    listeners: Vec<(ListenerHandle, Arc<dyn VisibilityListener>)>,
    next_listener: u64,
}

impl fmt::Debug for OcclusionCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcclusionCalculator")
            .field("engine", &self.engine.name())
            .field("divider_bar_names", &self.divider_bar_names)
            .field("reuse_unchanged", &self.reuse_unchanged)
            .field("invalidated", &self.invalidated)
            .field("visible", &self.visible)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for OcclusionCalculator {
    fn default() -> Self {
        Self::new(Arc::new(SweepLineEngine))
    }
}

impl OcclusionCalculator {
    pub fn new(engine: Arc<dyn RegionOpEngine>) -> Self {
        Self {
            engine,
            divider_bar_names: HashSet::new(),
            reuse_unchanged: true,
            invalidated: true,
            last_surface_count: 0,
            last_order: Vec::new(),
            last_inputs: HashMap::new(),
            visible_regions: HashMap::new(),
            visible: BTreeSet::new(),
            process_visibility: BTreeMap::new(),
            listeners: Vec::new(),
            next_listener: 1,
        }
    }

    pub fn from_config(config: &OcclusionConfig) -> Self {
        let mut calculator = Self::new(config.engine.engine());
        calculator.reuse_unchanged = config.reuse_unchanged;
        calculator.divider_bar_names = config.divider_bar_names.iter().cloned().collect();
        calculator
    }

    /// Surfaces with one of these names always occlude their full rectangle.
    pub fn set_divider_bar_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.divider_bar_names = names.into_iter().map(Into::into).collect();
        self.invalidated = true;
    }

    /// When false, every call to [`calculate`](Self::calculate) recomputes.
    pub fn set_reuse_unchanged(&mut self, reuse: bool) {
        self.reuse_unchanged = reuse;
    }

    pub fn engine(&self) -> &dyn RegionOpEngine {
        self.engine.as_ref()
    }

    /// Forces the next [`calculate`](Self::calculate) to recompute.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    pub fn register_listener(&mut self, listener: Arc<dyn VisibilityListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((handle, listener));
        handle
    }

    /// Returns false if the handle was not registered.
    pub fn unregister_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    fn inputs_of(&self, surface: &SurfaceDescriptor) -> OcclusionInputs {
        OcclusionInputs {
            dst_rect: surface.dst_rect,
            alpha_bits: surface.alpha.to_bits(),
            is_transparent: surface.is_transparent,
            is_security: surface.is_security,
            is_divider_bar: self.divider_bar_names.contains(&surface.name),
            opaque_region: surface.opaque_region.clone(),
            process_id: surface.process_id,
        }
    }

    /// Whether the stack differs from the last computed one in a way that
    /// can change visibility.
    ///
    /// Geometry and opacity are compared against the previous pass, so hosts
    /// that rebuild their descriptors every frame need not set change flags.
    pub fn needs_recompute(&self, stack: &SurfaceStack) -> bool {
        self.invalidated
            || !self.reuse_unchanged
            || self.last_surface_count != stack.len()
            || self.last_order.as_slice() != stack.ids()
            || stack.any_changed(SurfaceChangeFlags::all())
            || stack
                .iter()
                .any(|surface| self.last_inputs.get(&surface.id) != Some(&self.inputs_of(surface)))
    }

    /// Runs the occlusion pass over `stack`, or keeps the previous results if
    /// nothing relevant changed.
    pub fn calculate(&mut self, stack: &SurfaceStack) -> OcclusionPass {
        if !self.needs_recompute(stack) {
            trace!("surface stack unchanged, reusing occlusion results");
            return OcclusionPass::default();
        }
        let span = debug_span!("occlusion_pass", surfaces = stack.len(), engine = self.engine.name());
        let _enter = span.enter();

        self.last_surface_count = stack.len();
        self.last_order = stack.ids().to_vec();
        self.last_inputs = stack.iter().map(|surface| (surface.id, self.inputs_of(surface))).collect();
        self.invalidated = false;

        let engine = self.engine.as_ref();
        let mut occluded = Region::new();
        let mut visible_regions = HashMap::with_capacity(stack.len());
        let mut visible = BTreeSet::new();
        let mut process_visibility = BTreeMap::new();

        for surface in stack.iter() {
            if surface.dst_rect.is_empty() {
                debug!(surface = %surface.id, name = %surface.name, "skipping zero-area surface");
                visible_regions.insert(surface.id, Region::new());
                continue;
            }
            let own = Region::from_rect(surface.dst_rect);

            let region = if surface.is_security {
                own
            } else {
                let region = own.combine_with(&occluded, RegionOp::Sub, engine);
                if self.divider_bar_names.contains(&surface.name) {
                    occluded = occluded.combine_with(&own, RegionOp::Or, engine);
                } else {
                    let opaque = surface.opaque_portion();
                    occluded = occluded.combine_with(&opaque, RegionOp::Or, engine);
                }
                region
            };

            let is_visible = !region.is_empty();
            trace!(surface = %surface.id, visible = %region, "surface visibility");
            if is_visible {
                visible.insert(surface.id);
            }
            *process_visibility.entry(surface.process_id).or_insert(false) |= is_visible;
            visible_regions.insert(surface.id, region);
        }

        self.visible_regions = visible_regions;
        let visibility_changed = self.update_visible_set(visible);
        let process_visibility_changed = self.update_process_visibility(process_visibility);
        debug!(
            visible = self.visible.len(),
            visibility_changed = visibility_changed.is_some(),
            process_visibility_changed,
            "occlusion pass done"
        );

        OcclusionPass { recomputed: true, visibility_changed, process_visibility_changed }
    }

    fn update_visible_set(&mut self, visible: BTreeSet<SurfaceId>) -> Option<VisibilityChangedEvent> {
        if visible == self.visible {
            return None;
        }
        let changes: BTreeMap<SurfaceId, bool> = visible
            .symmetric_difference(&self.visible)
            .map(|id| (*id, visible.contains(id)))
            .collect();
        let event = VisibilityChangedEvent { changes, visible: visible.iter().copied().collect() };
        self.visible = visible;
        for (_, listener) in &self.listeners {
            listener.on_visibility_changed(&event);
        }
        Some(event)
    }

    fn update_process_visibility(&mut self, visibility: BTreeMap<ProcessId, bool>) -> bool {
        if visibility == self.process_visibility {
            return false;
        }
        self.process_visibility = visibility;
        for (_, listener) in &self.listeners {
            listener.on_process_visibility_changed(&self.process_visibility);
        }
        true
    }

    /// The unoccluded part of a surface from the last computed pass.
    pub fn visible_region(&self, id: SurfaceId) -> Option<&Region> {
        self.visible_regions.get(&id)
    }

    pub fn visible_regions(&self) -> &HashMap<SurfaceId, Region> {
        &self.visible_regions
    }

    pub fn is_visible(&self, id: SurfaceId) -> bool {
        self.visible.contains(&id)
    }

    /// Per-process visibility: a process is visible if any of its surfaces is.
    pub fn process_visibility(&self) -> &BTreeMap<ProcessId, bool> {
        &self.process_visibility
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::PairwiseEngine;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<VisibilityChangedEvent>>,
        process_maps: Mutex<Vec<BTreeMap<ProcessId, bool>>>,
    }

    impl VisibilityListener for Recorder {
        fn on_visibility_changed(&self, event: &VisibilityChangedEvent) {
            self.events.lock().unwrap().push(event.clone());
        }

        fn on_process_visibility_changed(&self, visibility: &BTreeMap<ProcessId, bool>) {
            self.process_maps.lock().unwrap().push(visibility.clone());
        }
    }

    fn id(raw: u64) -> SurfaceId {
        SurfaceId::new(raw)
    }

    fn abc_stack() -> SurfaceStack {
        SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100)).with_process(10),
            SurfaceDescriptor::new(id(2), Rect::new(50, 50, 150, 150)).with_process(20),
            SurfaceDescriptor::new(id(3), Rect::new(0, 0, 200, 200)).with_process(30),
        ])
    }

    fn area(calc: &OcclusionCalculator, raw: u64) -> i64 {
        calc.visible_region(id(raw)).map_or(0, Region::area)
    }

    #[test]
    fn test_three_opaque_surfaces() {
        let mut calc = OcclusionCalculator::default();
        let pass = calc.calculate(&abc_stack());
        assert!(pass.recomputed);
        assert_eq!(area(&calc, 1), 10_000);
        assert_eq!(area(&calc, 2), 7_500);
        assert!(calc.visible_region(id(2)).map_or(0, Region::size) <= 3);
        assert_eq!(area(&calc, 3), 40_000 - 17_500);
    }

    #[test]
    fn test_fully_covered_surface_is_invisible() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100)),
            SurfaceDescriptor::new(id(2), Rect::new(10, 10, 20, 20)),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.calculate(&stack);
        assert!(calc.is_visible(id(1)));
        assert!(!calc.is_visible(id(2)));
        assert!(calc.visible_region(id(2)).map_or(false, Region::is_empty));
    }

    #[test]
    fn test_transparent_and_translucent_surfaces_do_not_occlude() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100)).transparent(),
            SurfaceDescriptor::new(id(2), Rect::new(0, 0, 100, 100)).with_alpha(0.5),
            SurfaceDescriptor::new(id(3), Rect::new(0, 0, 100, 100)),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.calculate(&stack);
        assert_eq!(area(&calc, 3), 10_000);
    }

    #[test]
    fn test_opaque_region_limits_occlusion() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100))
                .with_opaque_region(Region::from_rect(Rect::new(0, 0, 50, 100))),
            SurfaceDescriptor::new(id(2), Rect::new(0, 0, 100, 100)),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.calculate(&stack);
        assert_eq!(calc.visible_region(id(2)), Some(&Region::from_rect(Rect::new(50, 0, 100, 100))));
    }

    #[test]
    fn test_divider_bar_always_occludes() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 40, 100, 60)).with_name("DividerBar").with_alpha(0.3),
            SurfaceDescriptor::new(id(2), Rect::new(0, 0, 100, 100)),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.set_divider_bar_names(["DividerBar"]);
        calc.calculate(&stack);
        assert_eq!(area(&calc, 2), 8_000);
    }

    #[test]
    fn test_security_surface_resolved_in_isolation() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100)),
            SurfaceDescriptor::new(id(2), Rect::new(0, 0, 50, 50)).security(),
            SurfaceDescriptor::new(id(3), Rect::new(0, 0, 200, 200)),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.calculate(&stack);
        assert_eq!(area(&calc, 2), 2_500);
        assert_eq!(area(&calc, 3), 40_000 - 10_000);
    }

    #[test]
    fn test_zero_area_surface_skipped() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(10, 10, 10, 50)),
            SurfaceDescriptor::new(id(2), Rect::new(0, 0, 100, 100)),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.calculate(&stack);
        assert!(!calc.is_visible(id(1)));
        assert_eq!(area(&calc, 2), 10_000);
    }

    #[test]
    fn test_unchanged_stack_reuses_results() {
        let stack = abc_stack();
        let mut calc = OcclusionCalculator::default();
        assert!(calc.calculate(&stack).recomputed);
        assert!(!calc.calculate(&stack).recomputed);
        assert_eq!(area(&calc, 2), 7_500);

        calc.invalidate();
        assert!(calc.calculate(&stack).recomputed);

        let mut moved = stack.clone();
        if let Some(surface) = moved.get_mut(id(1)) {
            surface.set_dst_rect(Rect::new(1, 0, 101, 100));
        }
        assert!(calc.calculate(&moved).recomputed);
    }

    #[test]
    fn test_rebuilt_descriptors_without_flags_are_compared() {
        let mut calc = OcclusionCalculator::default();
        let frame = |top: Rect, alpha: f32| {
            SurfaceStack::from_descriptors([
                SurfaceDescriptor::new(id(1), top).with_alpha(alpha),
                SurfaceDescriptor::new(id(2), Rect::new(0, 0, 200, 200)),
            ])
        };
        calc.calculate(&frame(Rect::new(0, 0, 100, 100), 1.0));
        assert!(!calc.calculate(&frame(Rect::new(0, 0, 100, 100), 1.0)).recomputed);

        let pass = calc.calculate(&frame(Rect::new(100, 100, 200, 200), 1.0));
        assert!(pass.recomputed);
        assert_eq!(
            calc.visible_region(id(2)),
            Some(&Region::from_rects([Rect::new(0, 0, 200, 100), Rect::new(0, 100, 100, 200)]))
        );

        let pass = calc.calculate(&frame(Rect::new(100, 100, 200, 200), 0.5));
        assert!(pass.recomputed);
        assert_eq!(area(&calc, 2), 40_000);
    }

    #[test]
    fn test_reuse_disabled_always_recomputes() {
        let stack = abc_stack();
        let mut calc = OcclusionCalculator::default();
        calc.set_reuse_unchanged(false);
        assert!(calc.calculate(&stack).recomputed);
        assert!(calc.calculate(&stack).recomputed);
    }

    #[test]
    fn test_listeners_receive_only_changes() {
        let recorder = Arc::new(Recorder::default());
        let mut calc = OcclusionCalculator::default();
        let handle = calc.register_listener(recorder.clone());

        let mut stack = abc_stack();
        calc.calculate(&stack);
        {
            let events = recorder.events.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].visible, vec![id(1), id(2), id(3)]);
        }

        // Recomputed but the visible set is the same.
        calc.invalidate();
        let pass = calc.calculate(&stack);
        assert!(pass.recomputed);
        assert!(pass.visibility_changed.is_none());
        assert_eq!(recorder.events.lock().unwrap().len(), 1);

        // Surface 2 becomes fully covered.
        stack.push_top(SurfaceDescriptor::new(id(4), Rect::new(0, 0, 200, 200)).with_process(40));
        let pass = calc.calculate(&stack);
        let event = pass.visibility_changed.expect("visibility changed");
        assert_eq!(event.changes.get(&id(2)), Some(&false));
        assert_eq!(event.changes.get(&id(4)), Some(&true));
        assert!(pass.process_visibility_changed);
        assert_eq!(calc.process_visibility().get(&20), Some(&false));

        assert!(calc.unregister_listener(handle));
        assert!(!calc.unregister_listener(handle));
        assert_eq!(recorder.events.lock().unwrap().len(), 2);
        assert_eq!(recorder.process_maps.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_process_visible_if_any_surface_visible() {
        let stack = SurfaceStack::from_descriptors([
            SurfaceDescriptor::new(id(1), Rect::new(0, 0, 100, 100)).with_process(7),
            SurfaceDescriptor::new(id(2), Rect::new(10, 10, 20, 20)).with_process(7),
            SurfaceDescriptor::new(id(3), Rect::new(10, 10, 20, 20)).with_process(8),
        ]);
        let mut calc = OcclusionCalculator::default();
        calc.calculate(&stack);
        assert_eq!(calc.process_visibility().get(&7), Some(&true));
        assert_eq!(calc.process_visibility().get(&8), Some(&false));
    }

    #[test]
    fn test_pairwise_engine_matches_sweep_line() {
        let stack = abc_stack();
        let mut sweep = OcclusionCalculator::default();
        let mut pairwise = OcclusionCalculator::new(Arc::new(PairwiseEngine));
        sweep.calculate(&stack);
        pairwise.calculate(&stack);
        assert_eq!(sweep.visible_regions(), pairwise.visible_regions());
    }
}
