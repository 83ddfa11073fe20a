//! Property-based tests for the region algebra.
//!
//! Regions are compared against a brute-force pixel model on a small grid,
//! and both engines are checked to produce identical canonical output.

use novade_compositor_core::geometry::Rect;
use novade_compositor_core::region::{PairwiseEngine, Region, RegionOp, RegionOpEngine, SweepLineEngine};
use proptest::prelude::*;

const GRID: i32 = 48;

fn arb_rect() -> impl Strategy<Value = Rect> {
    (0..GRID - 8, 0..GRID - 8, 0..20i32, 0..20i32).prop_map(|(x, y, w, h)| Rect::from_xywh(x, y, w, h))
}

fn arb_region() -> impl Strategy<Value = Region> {
    prop::collection::vec(arb_rect(), 0..6).prop_map(Region::from_rects)
}

fn arb_op() -> impl Strategy<Value = RegionOp> {
    prop_oneof![Just(RegionOp::And), Just(RegionOp::Or), Just(RegionOp::Xor), Just(RegionOp::Sub)]
}

fn contains(region: &Region, x: i32, y: i32) -> bool {
    region.rects().iter().any(|r| r.left <= x && x < r.right && r.top <= y && y < r.bottom)
}

fn assert_canonical(region: &Region) -> Result<(), TestCaseError> {
    let rects = region.rects();
    for r in rects {
        prop_assert!(!r.is_empty(), "empty rect {} in {}", r, region);
    }
    for (i, a) in rects.iter().enumerate() {
        for b in &rects[i + 1..] {
            prop_assert!(!a.intersects(b), "{} overlaps {} in {}", a, b, region);
            prop_assert!((a.top, a.left) <= (b.top, b.left), "unsorted {}", region);
        }
    }
    let bound = rects.iter().fold(Rect::EMPTY, |acc, r| acc.join(r));
    prop_assert_eq!(region.bound(), bound);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn prop_ops_match_pixel_model(a in arb_region(), b in arb_region(), op in arb_op()) {
        let result = a.combine(&b, op);
        assert_canonical(&result)?;
        let mut area = 0i64;
        for y in 0..GRID {
            for x in 0..GRID {
                let expected = op.accepts(contains(&a, x, y), contains(&b, x, y));
                prop_assert_eq!(contains(&result, x, y), expected, "pixel ({}, {}) for {:?}", x, y, op);
                if expected {
                    area += 1;
                }
            }
        }
        prop_assert_eq!(result.area(), area);
    }

    #[test]
    fn prop_from_rects_is_canonical(rects in prop::collection::vec(arb_rect(), 0..8)) {
        let region = Region::from_rects(rects.clone());
        assert_canonical(&region)?;
        // Insertion order does not matter.
        let reversed = Region::from_rects(rects.into_iter().rev());
        prop_assert_eq!(region, reversed);
    }

    #[test]
    fn prop_commutative_ops(a in arb_region(), b in arb_region()) {
        prop_assert_eq!(a.and(&b), b.and(&a));
        prop_assert_eq!(a.or(&b), b.or(&a));
        prop_assert_eq!(a.xor(&b), b.xor(&a));
    }

    #[test]
    fn prop_identities(a in arb_region()) {
        let empty = Region::new();
        prop_assert_eq!(a.or(&empty), a.clone());
        prop_assert!(a.and(&empty).is_empty());
        prop_assert_eq!(a.sub(&empty), a.clone());
        prop_assert_eq!(empty.or(&a), a.clone());
        prop_assert!(a.xor(&a).is_empty());
        prop_assert!(a.sub(&a).is_empty());
        prop_assert_eq!(a.and(&a), a.clone());
        prop_assert_eq!(a.or(&a), a);
    }

    #[test]
    fn prop_sub_and_partition(a in arb_region(), b in arb_region()) {
        let outside = a.sub(&b);
        let inside = a.and(&b);
        prop_assert!(outside.and(&inside).is_empty());
        prop_assert_eq!(outside.or(&inside), a.clone());
        prop_assert_eq!(outside.area() + inside.area(), a.area());
    }

    #[test]
    fn prop_xor_is_union_minus_intersection(a in arb_region(), b in arb_region()) {
        prop_assert_eq!(a.xor(&b), a.or(&b).sub(&a.and(&b)));
    }

    #[test]
    fn prop_engines_agree(a in arb_region(), b in arb_region(), op in arb_op()) {
        let sweep = a.combine_with(&b, op, &SweepLineEngine);
        let pairwise = a.combine_with(&b, op, &PairwiseEngine);
        prop_assert_eq!(&sweep, &pairwise, "{} vs {} with {:?}", SweepLineEngine.name(), PairwiseEngine.name(), op);
    }
}
