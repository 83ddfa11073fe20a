//! Interchangeable implementations of the region Boolean operations.
//!
//! The engine is chosen once from configuration and handed around as
//! `&dyn RegionOpEngine`. Both engines return canonical regions, so their
//! results compare equal for the same inputs.

use super::sweep::sweep;
use super::{Region, RegionOp};
use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Strategy computing `lhs op rhs` for two non-empty regions.
pub trait RegionOpEngine: fmt::Debug + Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Computes the operation. Callers go through [`Region::combine_with`],
    /// which answers empty operands itself.
    fn combine(&self, lhs: &Region, rhs: &Region, op: RegionOp) -> Region;
}

/// Sweep over y with a segment tree over the compressed x-breakpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepLineEngine;

impl RegionOpEngine for SweepLineEngine {
    fn name(&self) -> &'static str {
        "sweep_line"
    }

    fn combine(&self, lhs: &Region, rhs: &Region, op: RegionOp) -> Region {
        Region::from_canonical(sweep(lhs.rects(), rhs.rects(), op))
    }
}

/// Clips every rectangle pair directly, then canonicalizes the pieces.
///
/// Quadratic in the number of rectangles. Mostly useful for cross-checking
/// the sweep-line engine and for tiny regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairwiseEngine;

impl RegionOpEngine for PairwiseEngine {
    fn name(&self) -> &'static str {
        "pairwise"
    }

    fn combine(&self, lhs: &Region, rhs: &Region, op: RegionOp) -> Region {
        let pieces = match op {
            RegionOp::And => {
                let mut out = Vec::new();
                for a in lhs.rects() {
                    for b in rhs.rects() {
                        let clipped = a.intersect(b);
                        if !clipped.is_empty() {
                            out.push(clipped);
                        }
                    }
                }
                out
            }
            RegionOp::Or => {
                let mut out = lhs.rects().to_vec();
                out.extend(subtract_all(rhs.rects(), lhs.rects()));
                out
            }
            RegionOp::Xor => {
                let mut out = subtract_all(lhs.rects(), rhs.rects());
                out.extend(subtract_all(rhs.rects(), lhs.rects()));
                out
            }
            RegionOp::Sub => subtract_all(lhs.rects(), rhs.rects()),
        };
        // The pieces are disjoint; the union pass only restores canonical order.
        Region::from_canonical(sweep(&pieces, &[], RegionOp::Or))
    }
}

/// Removes every rectangle of `cutters` from the rectangles in `rects`.
fn subtract_all(rects: &[Rect], cutters: &[Rect]) -> Vec<Rect> {
    let mut current = rects.to_vec();
    let mut next = Vec::with_capacity(current.len());
    for cutter in cutters {
        for rect in &current {
            fragment(rect, cutter, &mut next);
        }
        std::mem::swap(&mut current, &mut next);
        next.clear();
    }
    current
}

/// Pushes up to four disjoint pieces covering `rect` minus `cutter`.
fn fragment(rect: &Rect, cutter: &Rect, out: &mut Vec<Rect>) {
    if !rect.intersects(cutter) {
        out.push(*rect);
        return;
    }
    if rect.is_inside_of(cutter) {
        return;
    }
    // Top
    if rect.top < cutter.top {
        out.push(Rect::new(rect.left, rect.top, rect.right, cutter.top));
    }
    // Bottom
    if rect.bottom > cutter.bottom {
        out.push(Rect::new(rect.left, cutter.bottom, rect.right, rect.bottom));
    }
    let band_top = rect.top.max(cutter.top);
    let band_bottom = rect.bottom.min(cutter.bottom);
    // Left and right within the vertical overlap
    if rect.left < cutter.left {
        out.push(Rect::new(rect.left, band_top, cutter.left, band_bottom));
    }
    if rect.right > cutter.right {
        out.push(Rect::new(cutter.right, band_top, rect.right, band_bottom));
    }
}

/// Configurable choice of [`RegionOpEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionEngineKind {
    #[default]
    SweepLine,
    Pairwise,
}

impl RegionEngineKind {
    /// Instantiates the engine.
    pub fn engine(self) -> Arc<dyn RegionOpEngine> {
        match self {
            RegionEngineKind::SweepLine => Arc::new(SweepLineEngine),
            RegionEngineKind::Pairwise => Arc::new(PairwiseEngine),
        }
    }
}

impl fmt::Display for RegionEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionEngineKind::SweepLine => write!(f, "sweep_line"),
            RegionEngineKind::Pairwise => write!(f, "pairwise"),
        }
    }
}
