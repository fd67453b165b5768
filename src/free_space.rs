use crate::geometry::{Region, contains, overlaps};

/// Maximal free rectangles of one roll for one optimization run.
///
/// Free rectangles may overlap each other but never overlap an occupied region.
#[derive(Debug, Clone)]
pub struct FreeSpace {
    bounds: Region,
    pub free_rects: Vec<Region>,
}

impl FreeSpace {
    pub fn new(width: u32, length: u32) -> Self {
        let bounds = Region::new(0, 0, width, length);
        let free_rects = if bounds.is_empty() {
            Vec::new()
        } else {
            vec![bounds]
        };
        Self { bounds, free_rects }
    }

    /// Free space of a roll with the given obstacles already carved out.
    pub fn seed(width: u32, length: u32, obstacles: &[Region]) -> Self {
        let mut space = Self::new(width, length);
        for obstacle in obstacles {
            space.place(*obstacle);
        }
        space
    }

    pub fn bounds(&self) -> Region {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.free_rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free_rects.is_empty()
    }

    /// Whether `region` fits entirely inside one free rectangle.
    pub fn is_free(&self, region: &Region) -> bool {
        self.free_rects.iter().any(|free| contains(free, region))
    }

    /// Marks `placed` as occupied, splitting every free rectangle it touches.
    pub fn place(&mut self, placed: Region) {
        if placed.is_empty() {
            return;
        }
        let mut next = Vec::with_capacity(self.free_rects.len() + 4);
        for free in &self.free_rects {
            if overlaps(free, &placed) {
                Self::split(*free, placed, &mut next);
            } else {
                next.push(*free);
            }
        }
        self.free_rects = next;
        self.prune();
    }

    fn split(free: Region, placed: Region, out: &mut Vec<Region>) {
        // Only called on overlapping pairs, so every clipped edge lies inside `free`.
        if placed.y > free.y {
            out.push(Region::new(free.x, free.y, free.w, placed.y - free.y));
        }
        if placed.bottom() < free.bottom() {
            let top = placed.bottom() as u32;
            out.push(Region::new(
                free.x,
                top,
                free.w,
                (free.bottom() - placed.bottom()) as u32,
            ));
        }
        if placed.x > free.x {
            out.push(Region::new(free.x, free.y, placed.x - free.x, free.h));
        }
        if placed.right() < free.right() {
            let left = placed.right() as u32;
            out.push(Region::new(
                left,
                free.y,
                (free.right() - placed.right()) as u32,
                free.h,
            ));
        }
    }

    /// Drops free rectangles contained in another one. Of two identical
    /// rectangles the earlier survives, so the list order stays deterministic.
    pub fn prune(&mut self) {
        let rects = &self.free_rects;
        let keep: Vec<bool> = (0..rects.len())
            .map(|i| {
                !rects.iter().enumerate().any(|(j, other)| {
                    j != i && contains(other, &rects[i]) && (*other != rects[i] || j < i)
                })
            })
            .collect();
        let mut idx = 0;
        self.free_rects.retain(|_| {
            let kept = keep[idx];
            idx += 1;
            kept
        });
    }
}
