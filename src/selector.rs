use serde::{Deserialize, Serialize};

use crate::free_space::FreeSpace;
use crate::geometry::Region;
use crate::types::{Placement, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(clippy::enum_variant_names)]
pub enum ScoreStrategy {
    #[default]
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
}

/// Lower is better. The trailing `(y, x)` breaks ties towards the start of the roll.
type Score = (u64, u64, u32, u32);

/// Picks the free rectangle and orientation for `piece`, anchored at the
/// rectangle's top-left corner. Does not modify `space`.
pub fn find_best(
    space: &FreeSpace,
    piece: Rect,
    allow_rotate: bool,
    strategy: ScoreStrategy,
) -> Option<Placement> {
    let mut orientations = vec![(piece, false)];
    if allow_rotate && !piece.is_square() {
        orientations.push((piece.rotated(), true));
    }

    let mut best: Option<(Score, Placement)> = None;
    for free in &space.free_rects {
        for &(oriented, rotated) in &orientations {
            if !oriented.fits_in(&free.size()) {
                continue;
            }
            let score = score(oriented, free, strategy);
            if best.as_ref().is_none_or(|(best_score, _)| score < *best_score) {
                best = Some((score, Placement::new(free.x, free.y, oriented, rotated)));
            }
        }
    }

    best.map(|(_, placement)| placement)
}

fn score(piece: Rect, free: &Region, strategy: ScoreStrategy) -> Score {
    let dw = (free.w - piece.w) as u64;
    let dh = (free.h - piece.h) as u64;
    let short = dw.min(dh);
    let long = dw.max(dh);
    let (primary, secondary) = match strategy {
        ScoreStrategy::BestAreaFit => (free.area() - piece.area(), short),
        ScoreStrategy::BestShortSideFit => (short, long),
        ScoreStrategy::BestLongSideFit => (long, short),
    };
    (primary, secondary, free.y, free.x)
}
