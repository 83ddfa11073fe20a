//! Top-to-bottom sweep producing the canonical rectangles of a region operation.
//!
//! Every input rectangle contributes an opening event at its top edge and a
//! closing event at its bottom edge. Between two distinct event rows the
//! segment tree describes a horizontal slab that is uniform in y; the x-ranges
//! accepted by the operation become rectangles of that slab, and a rectangle
//! from the slab above is extended instead when its x-range is identical.

use super::segment_tree::{IndexRange, Operand, SegmentTree};
use super::RegionOp;
use crate::geometry::Rect;
use tracing::{debug, trace};

/// Sort order at equal `y`: closing events come before opening ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum EventKind {
    VoidClose,
    Close,
    Open,
    VoidOpen,
}

impl EventKind {
    fn operand(self) -> Operand {
        match self {
            EventKind::Open | EventKind::Close => Operand::Lhs,
            EventKind::VoidOpen | EventKind::VoidClose => Operand::Rhs,
        }
    }

    fn delta(self) -> i32 {
        match self {
            EventKind::Open | EventKind::VoidOpen => 1,
            EventKind::Close | EventKind::VoidClose => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Event {
    pub y: i32,
    pub kind: EventKind,
    pub left: i32,
    pub right: i32,
}

/// Runs `op` over two rectangle lists and returns the canonical result,
/// sorted by `(top, left)`.
///
/// The rectangles of one operand may overlap each other; coverage is counted.
pub(crate) fn sweep(lhs: &[Rect], rhs: &[Rect], op: RegionOp) -> Vec<Rect> {
    let mut events = Vec::with_capacity((lhs.len() + rhs.len()) * 2);
    let mut xs = Vec::with_capacity((lhs.len() + rhs.len()) * 2);
    push_events(lhs, EventKind::Open, EventKind::Close, &mut events, &mut xs);
    push_events(rhs, EventKind::VoidOpen, EventKind::VoidClose, &mut events, &mut xs);

    if events.is_empty() {
        return Vec::new();
    }

    xs.sort_unstable();
    xs.dedup();
    events.sort_unstable_by_key(|e| (e.y, e.kind));

    let mut tree = SegmentTree::new(xs.len());
    let mut slabs = SlabBuilder::default();
    let mut ranges = Vec::new();
    let mut pre_y = events[0].y;

    for event in &events {
        let cur_y = event.y;
        if cur_y > pre_y {
            ranges.clear();
            tree.collect(op, &mut ranges);
            slabs.push_slab(&ranges, &xs, pre_y, cur_y);
        }
        tree.update(index_of(&xs, event.left), index_of(&xs, event.right), event.kind.operand(), event.kind.delta());
        pre_y = cur_y;
    }

    let mut rects = slabs.finish();
    rects.sort_unstable_by_key(|r| (r.top, r.left));
    trace!(?op, inputs = lhs.len() + rhs.len(), outputs = rects.len(), "region sweep done");
    rects
}

fn push_events(rects: &[Rect], open: EventKind, close: EventKind, events: &mut Vec<Event>, xs: &mut Vec<i32>) {
    for rect in rects {
        if rect.is_empty() {
            if rect.right < rect.left || rect.bottom < rect.top {
                debug!(%rect, "dropping malformed rectangle from region operation");
            }
            continue;
        }
        events.push(Event { y: rect.top, kind: open, left: rect.left, right: rect.right });
        events.push(Event { y: rect.bottom, kind: close, left: rect.left, right: rect.right });
        xs.push(rect.left);
        xs.push(rect.right);
    }
}

fn index_of(xs: &[i32], x: i32) -> usize {
    // Every event edge was inserted into `xs`, so the search always hits.
    xs.binary_search(&x).unwrap_or_else(|insert_at| insert_at)
}

/// Accumulates slab rows, extending rectangles whose x-range continues.
#[derive(Debug, Default)]
struct SlabBuilder {
    /// Rectangles ending at the bottom of the previous slab, sorted by x.
    open: Vec<Rect>,
    next: Vec<Rect>,
    done: Vec<Rect>,
}

impl SlabBuilder {
    fn push_slab(&mut self, ranges: &[IndexRange], xs: &[i32], pre_y: i32, cur_y: i32) {
        let mut i = 0;
        let mut j = 0;
        while i < self.open.len() && j < ranges.len() {
            let prev = self.open[i];
            let (left, right) = (xs[ranges[j].start], xs[ranges[j].end]);
            if prev.left == left && prev.right == right {
                self.next.push(Rect::new(left, prev.top, right, cur_y));
                i += 1;
                j += 1;
            } else if prev.right < right {
                self.done.push(prev);
                i += 1;
            } else {
                self.next.push(Rect::new(left, pre_y, right, cur_y));
                j += 1;
            }
        }
        for range in &ranges[j..] {
            self.next.push(Rect::new(xs[range.start], pre_y, xs[range.end], cur_y));
        }
        self.done.extend_from_slice(&self.open[i..]);
        self.open.clear();
        std::mem::swap(&mut self.open, &mut self.next);
    }

    fn finish(mut self) -> Vec<Rect> {
        self.done.append(&mut self.open);
        self.done
    }
}
