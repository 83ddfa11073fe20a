//! Interval tree over coordinate-compressed x-breakpoints.
//!
//! The tree lives for exactly one region operation. Nodes are stored in a
//! per-call arena and children are only materialized when an update covers
//! part of a node, so a node without children is uniform over its range.

use super::RegionOp;

/// Which operand of the operation an update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    /// The left operand, counted in `positive`.
    Lhs,
    /// The right operand, counted in `negative`.
    Rhs,
}

/// Half-open range of breakpoint indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug)]
struct Node {
    start: usize,
    end: usize,
    positive: i32,
    negative: i32,
    children: Option<(usize, usize)>,
}

impl Node {
    fn new(start: usize, end: usize) -> Self {
        Self { start, end, positive: 0, negative: 0, children: None }
    }

    fn mid(&self) -> usize {
        self.start + (self.end - self.start) / 2
    }
}

#[derive(Debug)]
pub(crate) struct SegmentTree {
    nodes: Vec<Node>,
}

impl SegmentTree {
    /// Builds a tree spanning `breakpoints` compressed coordinates.
    ///
    /// `breakpoints` must be at least 2; the root covers the elementary
    /// intervals `[0, breakpoints - 1)`.
    pub(crate) fn new(breakpoints: usize) -> Self {
        let mut nodes = Vec::with_capacity(breakpoints.saturating_mul(2));
        nodes.push(Node::new(0, breakpoints.saturating_sub(1)));
        Self { nodes }
    }

    /// Adds `delta` to the coverage count of `operand` over `[start, end)`.
    pub(crate) fn update(&mut self, start: usize, end: usize, operand: Operand, delta: i32) {
        self.update_node(0, start, end, operand, delta);
    }

    fn update_node(&mut self, idx: usize, start: usize, end: usize, operand: Operand, delta: i32) {
        if start >= end {
            return;
        }
        let (node_start, node_end, mid) = {
            let node = &self.nodes[idx];
            (node.start, node.end, node.mid())
        };
        if start == node_start && end == node_end {
            let node = &mut self.nodes[idx];
            match operand {
                Operand::Lhs => node.positive += delta,
                Operand::Rhs => node.negative += delta,
            }
            return;
        }
        let (left, right) = match self.nodes[idx].children {
            Some(children) => children,
            None => {
                let left = self.nodes.len();
                self.nodes.push(Node::new(node_start, mid));
                self.nodes.push(Node::new(mid, node_end));
                self.nodes[idx].children = Some((left, left + 1));
                (left, left + 1)
            }
        };
        self.update_node(left, start, end.min(mid), operand, delta);
        self.update_node(right, start.max(mid), end, operand, delta);
    }

    /// Appends every maximal index range where `op` holds, in ascending order.
    ///
    /// Touching ranges are coalesced so each maximal run is reported once.
    pub(crate) fn collect(&self, op: RegionOp, out: &mut Vec<IndexRange>) {
        self.collect_node(0, false, false, op, out);
    }

    fn collect_node(
        &self,
        idx: usize,
        parent_lhs: bool,
        parent_rhs: bool,
        op: RegionOp,
        out: &mut Vec<IndexRange>,
    ) {
        let node = &self.nodes[idx];
        let in_lhs = parent_lhs || node.positive > 0;
        let in_rhs = parent_rhs || node.negative > 0;
        // Coverage only grows towards the leaves, so these states are final.
        let settled = (in_lhs && in_rhs) || (op == RegionOp::Or && (in_lhs || in_rhs));

        match node.children {
            Some((left, right)) if !settled => {
                self.collect_node(left, in_lhs, in_rhs, op, out);
                self.collect_node(right, in_lhs, in_rhs, op, out);
            }
            _ => {
                if op.accepts(in_lhs, in_rhs) {
                    push_range(out, IndexRange { start: node.start, end: node.end });
                }
            }
        }
    }
}

fn push_range(out: &mut Vec<IndexRange>, range: IndexRange) {
    if range.start >= range.end {
        return;
    }
    match out.last_mut() {
        Some(last) if last.end == range.start => last.end = range.end,
        _ => out.push(range),
    }
}
