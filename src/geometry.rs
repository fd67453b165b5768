//! Axis-aligned rectangles on the roll.
//!
//! Intervals are half-open (`[x, x + w)`), so pieces that share an edge do not overlap.

use serde::{Deserialize, Serialize};

use crate::types::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn size(&self) -> Rect {
        Rect::new(self.w, self.h)
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Exclusive right edge. Widened so obstacles near `u32::MAX` cannot wrap.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.w as u64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.h as u64
    }
}

/// Strict positive-area intersection.
pub fn overlaps(a: &Region, b: &Region) -> bool {
    !a.is_empty()
        && !b.is_empty()
        && (a.x as u64) < b.right()
        && (b.x as u64) < a.right()
        && (a.y as u64) < b.bottom()
        && (b.y as u64) < a.bottom()
}

pub fn contains(outer: &Region, inner: &Region) -> bool {
    outer.x <= inner.x
        && outer.y <= inner.y
        && inner.right() <= outer.right()
        && inner.bottom() <= outer.bottom()
}

pub fn intersection_area(a: &Region, b: &Region) -> u64 {
    let left = a.x.max(b.x) as u64;
    let top = a.y.max(b.y) as u64;
    let right = a.right().min(b.right());
    let bottom = a.bottom().min(b.bottom());
    if right <= left || bottom <= top {
        return 0;
    }
    (right - left) * (bottom - top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Region::new(0, 0, 500, 400);
        let right = Region::new(500, 0, 500, 400);
        let below = Region::new(0, 400, 500, 400);
        assert!(!overlaps(&a, &right));
        assert!(!overlaps(&a, &below));
        assert_eq!(intersection_area(&a, &right), 0);
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = Region::new(0, 0, 500, 400);
        let b = Region::new(499, 399, 10, 10);
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
        assert_eq!(intersection_area(&a, &b), 1);
    }

    #[test]
    fn test_zero_area_never_overlaps() {
        let a = Region::new(0, 0, 500, 400);
        let line = Region::new(10, 10, 0, 100);
        assert!(!overlaps(&a, &line));
    }

    #[test]
    fn test_contains() {
        let outer = Region::new(0, 0, 1220, 60000);
        assert!(contains(&outer, &outer));
        assert!(contains(&outer, &Region::new(720, 100, 500, 400)));
        assert!(!contains(&outer, &Region::new(721, 100, 500, 400)));
        assert!(!contains(&Region::new(10, 10, 100, 100), &Region::new(0, 10, 50, 50)));
    }

    #[test]
    fn test_intersection_area_partial() {
        let a = Region::new(0, 0, 100, 100);
        let b = Region::new(50, 25, 100, 100);
        assert_eq!(intersection_area(&a, &b), 50 * 75);
    }

    #[test]
    fn test_edges_near_u32_max() {
        let strip = Region::new(0, 0, 1220, u32::MAX);
        let far = Region::new(0, u32::MAX - 10, 100, 10);
        assert!(contains(&strip, &far));
        assert!(overlaps(&strip, &far));
    }
}
