//! Regions: exact sets of pixels described by non-overlapping rectangles.
//!
//! A [`Region`] is a value type. Its rectangles never overlap, rectangles that
//! continue an identical x-range of the row above are merged, and the list is
//! kept sorted by `(top, left)`. Because of that canonical form two regions
//! compare equal exactly when they cover the same pixels.
//!
//! Boolean operations run through a [`RegionOpEngine`]. The default engine is
//! [`SweepLineEngine`]; [`PairwiseEngine`] produces identical results by a
//! different route and is selectable from configuration.

mod engine;
mod segment_tree;
mod sweep;

pub use engine::{PairwiseEngine, RegionEngineKind, RegionOpEngine, SweepLineEngine};

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Sub};

/// The four Boolean set operations on regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionOp {
    /// Pixels in both operands.
    And,
    /// Pixels in either operand.
    Or,
    /// Pixels in exactly one operand.
    Xor,
    /// Pixels in the left operand but not the right one.
    Sub,
}

impl RegionOp {
    /// Whether a pixel with the given operand membership belongs to the result.
    pub fn accepts(self, in_lhs: bool, in_rhs: bool) -> bool {
        match self {
            RegionOp::And => in_lhs && in_rhs,
            RegionOp::Or => in_lhs || in_rhs,
            RegionOp::Xor => in_lhs != in_rhs,
            RegionOp::Sub => in_lhs && !in_rhs,
        }
    }
}

/// A set of pixels stored as canonical, non-overlapping rectangles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Region {
    rects: Vec<Rect>,
    bound: Rect,
}

impl Region {
    /// Creates an empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region covering exactly `rect`. Empty rectangles give an empty region.
    pub fn from_rect(rect: Rect) -> Self {
        if rect.is_empty() {
            return Self::new();
        }
        Self { rects: vec![rect], bound: rect }
    }

    /// Creates a region covering the union of `rects`.
    ///
    /// The input may overlap, touch or contain empty rectangles; it is
    /// normalized into canonical form.
    pub fn from_rects<I>(rects: I) -> Self
    where
        I: IntoIterator<Item = Rect>,
    {
        let input: Vec<Rect> = rects.into_iter().collect();
        match input.as_slice() {
            [] => Self::new(),
            [single] => Self::from_rect(*single),
            _ => Self::from_canonical(sweep::sweep(&input, &[], RegionOp::Or)),
        }
    }

    /// Wraps rectangles already in canonical order and computes the bound.
    pub(crate) fn from_canonical(rects: Vec<Rect>) -> Self {
        let bound = rects.iter().fold(Rect::EMPTY, |acc, r| acc.join(r));
        Self { rects, bound }
    }

    /// The rectangles making up the region, sorted by `(top, left)`.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// The minimal rectangle containing every pixel of the region.
    pub fn bound(&self) -> Rect {
        self.bound
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Number of rectangles in the decomposition.
    pub fn size(&self) -> usize {
        self.rects.len()
    }

    /// Number of pixels covered.
    pub fn area(&self) -> i64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// True if any pixel of `rect` lies in the region.
    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        self.bound.intersects(rect) && self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Applies `op` with the default sweep-line engine.
    pub fn combine(&self, other: &Region, op: RegionOp) -> Region {
        self.combine_with(other, op, &SweepLineEngine)
    }

    /// Applies `op` with the given engine.
    ///
    /// Empty operands are answered directly without running the engine.
    pub fn combine_with(&self, other: &Region, op: RegionOp, engine: &dyn RegionOpEngine) -> Region {
        if self.is_empty() {
            return match op {
                RegionOp::And | RegionOp::Sub => Region::new(),
                RegionOp::Or | RegionOp::Xor => other.clone(),
            };
        }
        if other.is_empty() {
            return match op {
                RegionOp::And => Region::new(),
                RegionOp::Or | RegionOp::Xor | RegionOp::Sub => self.clone(),
            };
        }
        if op == RegionOp::And && !self.bound.intersects(&other.bound) {
            return Region::new();
        }
        engine.combine(self, other, op)
    }

    pub fn and(&self, other: &Region) -> Region {
        self.combine(other, RegionOp::And)
    }

    pub fn or(&self, other: &Region) -> Region {
        self.combine(other, RegionOp::Or)
    }

    pub fn xor(&self, other: &Region) -> Region {
        self.combine(other, RegionOp::Xor)
    }

    pub fn sub(&self, other: &Region) -> Region {
        self.combine(other, RegionOp::Sub)
    }

    pub fn and_self(&mut self, other: &Region) {
        *self = self.and(other);
    }

    pub fn or_self(&mut self, other: &Region) {
        *self = self.or(other);
    }

    pub fn xor_self(&mut self, other: &Region) {
        *self = self.xor(other);
    }

    pub fn sub_self(&mut self, other: &Region) {
        *self = self.sub(other);
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: ", self.rects.len())?;
        for rect in &self.rects {
            write!(f, "{}", rect)?;
        }
        write!(f, "}}")
    }
}

impl BitAnd for &Region {
    type Output = Region;

    fn bitand(self, rhs: &Region) -> Region {
        self.and(rhs)
    }
}

impl BitOr for &Region {
    type Output = Region;

    fn bitor(self, rhs: &Region) -> Region {
        self.or(rhs)
    }
}

impl BitXor for &Region {
    type Output = Region;

    fn bitxor(self, rhs: &Region) -> Region {
        self.xor(rhs)
    }
}

impl Sub for &Region {
    type Output = Region;

    fn sub(self, rhs: &Region) -> Region {
        Region::sub(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn r(l: i32, t: i32, rr: i32, b: i32) -> Region {
        Region::from_rect(Rect::new(l, t, rr, b))
    }

    #[rstest]
    #[case(RegionOp::And, false, false, false)]
    #[case(RegionOp::And, true, true, true)]
    #[case(RegionOp::Or, true, false, true)]
    #[case(RegionOp::Xor, true, true, false)]
    #[case(RegionOp::Xor, false, true, true)]
    #[case(RegionOp::Sub, true, false, true)]
    #[case(RegionOp::Sub, true, true, false)]
    fn test_op_accepts(#[case] op: RegionOp, #[case] lhs: bool, #[case] rhs: bool, #[case] expected: bool) {
        assert_eq!(op.accepts(lhs, rhs), expected);
    }

    #[test]
    fn test_from_rect_empty_is_empty_region() {
        let region = Region::from_rect(Rect::new(5, 5, 5, 10));
        assert!(region.is_empty());
        assert_eq!(region.bound(), Rect::EMPTY);
        assert_eq!(region.size(), 0);
    }

    #[test]
    fn test_from_rects_normalizes_overlap() {
        let region = Region::from_rects([Rect::new(0, 0, 10, 10), Rect::new(0, 0, 10, 10), Rect::new(10, 0, 20, 10)]);
        assert_eq!(region.rects(), &[Rect::new(0, 0, 20, 10)]);
        assert_eq!(region.area(), 200);
    }

    #[test]
    fn test_and_overlap() {
        let a = r(0, 0, 100, 100);
        let b = r(50, 50, 150, 150);
        assert_eq!(a.and(&b), r(50, 50, 100, 100));
    }

    #[test]
    fn test_or_overlap_bound_and_area() {
        let a = r(0, 0, 100, 100);
        let b = r(50, 50, 150, 150);
        let union = a.or(&b);
        assert_eq!(union.bound(), Rect::new(0, 0, 150, 150));
        assert_eq!(union.area(), 17_500);
        assert_eq!(union.size(), 3);
    }

    #[test]
    fn test_sub_l_shape() {
        let b = r(50, 50, 150, 150);
        let a = r(0, 0, 100, 100);
        let visible = b.sub(&a);
        assert_eq!(visible.area(), 7_500);
        assert_eq!(visible.rects(), &[Rect::new(100, 50, 150, 100), Rect::new(50, 100, 150, 150)]);
    }

    #[test]
    fn test_xor_of_disjoint_is_union() {
        let a = r(0, 0, 10, 10);
        let b = r(20, 0, 30, 10);
        assert_eq!(a.xor(&b), a.or(&b));
    }

    #[test]
    fn test_empty_short_circuits() {
        let a = r(0, 0, 10, 10);
        let empty = Region::new();
        assert_eq!(a.and(&empty), empty);
        assert_eq!(empty.and(&a), empty);
        assert_eq!(a.or(&empty), a);
        assert_eq!(empty.or(&a), a);
        assert_eq!(a.sub(&empty), a);
        assert_eq!(empty.sub(&a), empty);
        assert_eq!(empty.xor(&a), a);
    }

    #[test]
    fn test_self_mutating_ops() {
        let mut region = r(0, 0, 10, 10);
        region.or_self(&r(10, 0, 20, 10));
        assert_eq!(region, r(0, 0, 20, 10));
        region.sub_self(&r(0, 0, 10, 10));
        assert_eq!(region, r(10, 0, 20, 10));
        region.and_self(&r(15, 0, 30, 10));
        assert_eq!(region, r(15, 0, 20, 10));
        region.xor_self(&r(15, 0, 20, 10));
        assert!(region.is_empty());
    }

    #[test]
    fn test_operators_match_methods() {
        let a = r(0, 0, 100, 100);
        let b = r(50, 50, 150, 150);
        assert_eq!(&a & &b, a.and(&b));
        assert_eq!(&a | &b, a.or(&b));
        assert_eq!(&a ^ &b, a.xor(&b));
        assert_eq!(&a - &b, a.sub(&b));
    }

    #[test]
    fn test_intersects_rect() {
        let region = r(0, 0, 10, 10).or(&r(20, 20, 30, 30));
        assert!(region.intersects_rect(&Rect::new(5, 5, 6, 6)));
        assert!(!region.intersects_rect(&Rect::new(12, 12, 18, 18)));
    }

    #[test]
    fn test_extreme_coordinates() {
        let wide = Region::from_rect(Rect::new(i32::MIN, 0, i32::MAX, 1));
        assert_eq!(wide.area(), 4_294_967_295);
        let punched = wide.sub(&Region::from_rect(Rect::new(0, 0, 10, 1)));
        assert_eq!(punched.size(), 2);
        assert_eq!(punched.area(), 4_294_967_285);
        assert_eq!(punched.bound(), Rect::new(i32::MIN, 0, i32::MAX, 1));
    }

    #[test]
    fn test_display() {
        let region = r(0, 0, 10, 10).or(&r(20, 0, 30, 10));
        assert_eq!(region.to_string(), "{2: {0,0,10,10}{20,0,30,10}}");
        assert_eq!(Region::new().to_string(), "{0: }");
    }
}
