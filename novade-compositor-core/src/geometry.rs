//! Integer rectangle used throughout damage tracking and occlusion.
//!
//! Rectangles are half-open: a [`Rect`] covers every pixel `(x, y)` with
//! `left <= x < right` and `top <= y < bottom`. A rectangle whose right edge
//! does not lie strictly to the right of its left edge (or likewise for the
//! vertical edges) is empty and covers no pixel at all.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned, half-open integer rectangle `[left, top, right, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// The canonical empty rectangle.
    pub const EMPTY: Rect = Rect::new(0, 0, 0, 0);

    /// Creates a rectangle from its four edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Creates a rectangle from an origin and a size, the way surfaces report geometry.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Width in pixels, zero for empty rectangles. Saturates at `i32::MAX`.
    pub fn width(&self) -> i32 {
        if self.is_empty() { 0 } else { self.right.saturating_sub(self.left) }
    }

    /// Height in pixels, zero for empty rectangles. Saturates at `i32::MAX`.
    pub fn height(&self) -> i32 {
        if self.is_empty() { 0 } else { self.bottom.saturating_sub(self.top) }
    }

    /// Number of covered pixels, exact for any edges.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        let width = i64::from(self.right) - i64::from(self.left);
        let height = i64::from(self.bottom) - i64::from(self.top);
        width.saturating_mul(height)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// The overlapping part of both rectangles, or [`Rect::EMPTY`].
    pub fn intersect(&self, other: &Self) -> Self {
        if !self.intersects(other) {
            return Self::EMPTY;
        }
        Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    /// Smallest rectangle containing both. Empty operands are ignored.
    pub fn join(&self, other: &Self) -> Self {
        if self.is_empty() {
            return if other.is_empty() { Self::EMPTY } else { *other };
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// True if every pixel of `self` is covered by `other`.
    ///
    /// An empty rectangle is inside everything.
    pub fn is_inside_of(&self, other: &Self) -> bool {
        if self.is_empty() {
            return true;
        }
        !other.is_empty()
            && self.left >= other.left
            && self.top >= other.top
            && self.right <= other.right
            && self.bottom <= other.bottom
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }

    /// Grows the rectangle outwards so every edge lies on a multiple of `bits`.
    ///
    /// Alignments of 0 or 1 leave the rectangle unchanged.
    pub fn pixel_aligned(&self, bits: i32) -> Self {
        if bits <= 1 || self.is_empty() {
            return *self;
        }
        let bits = i64::from(bits);
        let floor = |v: i32| clamp_to_i32(i64::from(v).div_euclid(bits) * bits);
        let ceil = |v: i32| clamp_to_i32((i64::from(v) + bits - 1).div_euclid(bits) * bits);
        Self::new(floor(self.left), floor(self.top), ceil(self.right), ceil(self.bottom))
    }

    /// Mirrors the rectangle vertically inside a target of the given height.
    ///
    /// Converts between a top-left and a bottom-left origin; applying it twice
    /// with the same height yields the original rectangle.
    pub fn flip_within(&self, height: i32) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::new(
            self.left,
            height.saturating_sub(self.bottom),
            self.right,
            height.saturating_sub(self.top),
        )
    }
}

fn clamp_to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{},{},{}}}", self.left, self.top, self.right, self.bottom)
    }
}
