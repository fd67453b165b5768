use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::free_space::FreeSpace;
use crate::geometry::{contains, overlaps};
use crate::selector::{ScoreStrategy, find_best};
use crate::types::{
    InstanceId, InstancePlacement, LayoutResult, PieceInstance, PieceState, Placement, Roll,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Upper bound on pending instances per run. Each placement scans and may
    /// split every free rectangle, so a run is quadratic in this number.
    pub max_pending: usize,
    pub strategy: ScoreStrategy,
}

impl LayoutConfig {
    pub const DEFAULT_MAX_PENDING: usize = 5000;
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_pending: Self::DEFAULT_MAX_PENDING,
            strategy: ScoreStrategy::default(),
        }
    }
}

pub struct LayoutEngine {
    roll: Roll,
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(roll: Roll, config: LayoutConfig) -> Self {
        Self { roll, config }
    }

    pub fn roll(&self) -> Roll {
        self.roll
    }

    /// Lays out every non-fixed instance around the fixed ones.
    ///
    /// Previous `Placed` positions are ignored. Instances that do not fit are
    /// listed in `unplaced`; only broken preconditions return an error.
    pub fn solve(&self, instances: &[PieceInstance]) -> Result<LayoutResult> {
        self.roll.validate()?;

        let mut fixed: Vec<(InstanceId, Placement)> = Vec::new();
        let mut pending: Vec<&PieceInstance> = Vec::new();
        for instance in instances {
            match instance.state {
                PieceState::Fixed(placement) => fixed.push((instance.id, placement)),
                PieceState::Pending | PieceState::Placed(_) => pending.push(instance),
            }
        }
        fixed.sort_by_key(|(id, _)| *id);

        self.validate_fixed(&fixed)?;
        if pending.len() > self.config.max_pending {
            return Err(LayoutError::TooManyPieces {
                count: pending.len(),
                limit: self.config.max_pending,
            });
        }

        // Taller pieces first, then wider; ids make the order total.
        pending.sort_by(|a, b| {
            b.rect
                .h
                .cmp(&a.rect.h)
                .then(b.rect.w.cmp(&a.rect.w))
                .then(a.id.cmp(&b.id))
        });

        let obstacles: Vec<_> = fixed.iter().map(|(_, p)| p.region()).collect();
        let mut space = FreeSpace::seed(self.roll.width, self.roll.effective_length(), &obstacles);

        let mut placements: Vec<InstancePlacement> = fixed
            .iter()
            .map(|&(id, placement)| InstancePlacement {
                id,
                placement,
                fixed: true,
            })
            .collect();
        let mut unplaced = Vec::new();

        for instance in &pending {
            match find_best(&space, instance.rect, instance.rotatable, self.config.strategy) {
                Some(placement) => {
                    space.place(placement.region());
                    placements.push(InstancePlacement {
                        id: instance.id,
                        placement,
                        fixed: false,
                    });
                }
                None => {
                    tracing::debug!(
                        id = %instance.id,
                        rect = %instance.rect,
                        "no free rectangle fits"
                    );
                    unplaced.push(instance.id);
                }
            }
        }

        placements.sort_by_key(|p| p.id);
        unplaced.sort();

        let result = self.finish(placements, unplaced);
        tracing::debug!(
            roll = %self.roll,
            fixed = fixed.len(),
            pending = pending.len(),
            used_length = result.used_length,
            free_rects = space.len(),
            "layout computed"
        );
        if !result.unplaced.is_empty() {
            tracing::warn!(
                roll = %self.roll,
                unplaced = result.unplaced.len(),
                "pieces left unplaced"
            );
        }
        Ok(result)
    }

    fn validate_fixed(&self, fixed: &[(InstanceId, Placement)]) -> Result<()> {
        let bounds = self.roll.bounds();
        for (id, placement) in fixed {
            if !contains(&bounds, &placement.region()) {
                return Err(LayoutError::FixedPieceOutOfBounds(*id));
            }
        }
        for (i, (first, a)) in fixed.iter().enumerate() {
            for (second, b) in &fixed[i + 1..] {
                if overlaps(&a.region(), &b.region()) {
                    return Err(LayoutError::OverlappingFixedPieces {
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }

    fn finish(
        &self,
        placements: Vec<InstancePlacement>,
        unplaced: Vec<InstanceId>,
    ) -> LayoutResult {
        // Every region lies inside the roll, so the bottom edge fits in u32.
        let used_length = placements
            .iter()
            .map(|p| p.placement.region().bottom())
            .max()
            .unwrap_or(0) as u32;
        let piece_area: u64 = placements.iter().map(|p| p.placement.rect.area()).sum();
        let roll_area = self.roll.width as u64 * used_length as u64;
        let waste_ratio = if roll_area == 0 {
            0.0
        } else {
            1.0 - piece_area as f64 / roll_area as f64
        };

        LayoutResult {
            roll: self.roll,
            placements,
            used_length,
            waste_ratio,
            unplaced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rect, SpecId};

    /// Validates a complete layout:
    /// 1. Every placement lies within the roll width and the used length
    /// 2. No two placements overlap
    /// 3. Placed plus unplaced accounts for every instance
    fn assert_layout_valid(result: &LayoutResult, expected_instances: usize) {
        assert_eq!(
            result.placements.len() + result.unplaced.len(),
            expected_instances,
            "expected {} instances accounted for",
            expected_instances
        );
        for p in &result.placements {
            let region = p.placement.region();
            assert!(
                region.right() <= result.roll.width as u64,
                "{} exceeds roll width",
                p.id
            );
            assert!(region.bottom() <= result.used_length as u64, "{} exceeds used length", p.id);
        }
        for (i, a) in result.placements.iter().enumerate() {
            for b in &result.placements[i + 1..] {
                assert!(
                    !overlaps(&a.placement.region(), &b.placement.region()),
                    "{} @ ({},{}) overlaps {} @ ({},{})",
                    a.id,
                    a.placement.x,
                    a.placement.y,
                    b.id,
                    b.placement.x,
                    b.placement.y
                );
            }
        }
    }

    fn expand(spec: u64, rect: Rect, qty: u32, rotatable: bool) -> Vec<PieceInstance> {
        (0..qty)
            .map(|i| PieceInstance::pending(InstanceId::new(SpecId(spec), i), rect, rotatable))
            .collect()
    }

    fn fixed(spec: u64, placement: Placement) -> PieceInstance {
        PieceInstance::fixed(InstanceId::new(SpecId(spec), 0), placement.rect, placement)
    }

    fn engine(width: u32, length: u32) -> LayoutEngine {
        LayoutEngine::new(Roll::bounded(width, length), LayoutConfig::default())
    }

    #[test]
    fn test_single_piece() {
        let result = engine(1220, 60000)
            .solve(&expand(1, Rect::new(500, 400), 1, false))
            .unwrap();
        assert_layout_valid(&result, 1);
        assert_eq!(
            result.placements[0].placement,
            Placement::new(0, 0, Rect::new(500, 400), false)
        );
        assert_eq!(result.used_length, 400);
    }

    #[test]
    fn test_no_instances() {
        let result = engine(1220, 60000).solve(&[]).unwrap();
        assert_layout_valid(&result, 0);
        assert_eq!(result.used_length, 0);
        assert_eq!(result.waste_ratio, 0.0);
    }

    #[test]
    fn test_rotation_required_for_wide_piece() {
        let mut instances = expand(1, Rect::new(500, 400), 2, true);
        instances.extend(expand(2, Rect::new(1300, 200), 1, true));
        let result = engine(1220, 60000).solve(&instances).unwrap();
        assert_layout_valid(&result, 3);
        assert!(result.is_complete());
        let wide = result.placement(InstanceId::new(SpecId(2), 0)).unwrap();
        assert!(wide.rotated);
        assert_eq!(wide.rect, Rect::new(200, 1300));
    }

    #[test]
    fn test_wide_piece_unplaced_without_rotation() {
        let mut instances = expand(1, Rect::new(500, 400), 2, false);
        instances.extend(expand(2, Rect::new(1300, 200), 1, false));
        let result = engine(1220, 60000).solve(&instances).unwrap();
        assert_layout_valid(&result, 3);
        assert_eq!(result.unplaced, vec![InstanceId::new(SpecId(2), 0)]);
        assert_eq!(result.used_length, 400);
    }

    #[test]
    fn test_fixed_piece_is_an_obstacle() {
        let mut instances = vec![fixed(1, Placement::new(0, 0, Rect::new(500, 400), false))];
        instances.extend(expand(2, Rect::new(500, 400), 1, false));
        let result = engine(1220, 60000).solve(&instances).unwrap();
        assert_layout_valid(&result, 2);
        let p = result.placement(InstanceId::new(SpecId(2), 0)).unwrap();
        assert!(p.x >= 500 || p.y >= 400);
        assert_eq!(
            result.placement(InstanceId::new(SpecId(1), 0)),
            Some(&Placement::new(0, 0, Rect::new(500, 400), false))
        );
        assert!(result.placements[0].fixed);
    }

    #[test]
    fn test_previous_placements_are_recomputed() {
        let id = InstanceId::new(SpecId(1), 0);
        let mut instance = PieceInstance::pending(id, Rect::new(500, 400), false);
        instance.state = PieceState::Placed(Placement::new(700, 900, Rect::new(500, 400), false));
        let result = engine(1220, 60000).solve(&[instance]).unwrap();
        assert_eq!((result.placements[0].placement.x, result.placements[0].placement.y), (0, 0));
        assert!(!result.placements[0].fixed);
    }

    #[test]
    fn test_overlapping_fixed_pieces_rejected() {
        let instances = vec![
            fixed(1, Placement::new(0, 0, Rect::new(500, 400), false)),
            fixed(2, Placement::new(499, 0, Rect::new(500, 400), false)),
        ];
        assert_eq!(
            engine(1220, 60000).solve(&instances),
            Err(LayoutError::OverlappingFixedPieces {
                first: InstanceId::new(SpecId(1), 0),
                second: InstanceId::new(SpecId(2), 0),
            })
        );
    }

    #[test]
    fn test_touching_fixed_pieces_accepted() {
        let instances = vec![
            fixed(1, Placement::new(0, 0, Rect::new(500, 400), false)),
            fixed(2, Placement::new(500, 0, Rect::new(500, 400), false)),
        ];
        let result = engine(1220, 60000).solve(&instances).unwrap();
        assert_layout_valid(&result, 2);
    }

    #[test]
    fn test_fixed_piece_outside_roll_rejected() {
        let instances = vec![fixed(1, Placement::new(800, 0, Rect::new(500, 400), false))];
        assert_eq!(
            engine(1220, 60000).solve(&instances),
            Err(LayoutError::FixedPieceOutOfBounds(InstanceId::new(SpecId(1), 0)))
        );
        let beyond_length = vec![fixed(1, Placement::new(0, 59800, Rect::new(500, 400), false))];
        assert!(engine(1220, 60000).solve(&beyond_length).is_err());
    }

    #[test]
    fn test_invalid_roll_rejected() {
        assert!(matches!(
            engine(0, 60000).solve(&[]),
            Err(LayoutError::InvalidRollDimensions { .. })
        ));
    }

    #[test]
    fn test_too_many_pieces() {
        let config = LayoutConfig {
            max_pending: 3,
            ..LayoutConfig::default()
        };
        let engine = LayoutEngine::new(Roll::strip(1220), config);
        assert!(engine.solve(&expand(1, Rect::new(10, 10), 3, false)).is_ok());
        assert_eq!(
            engine.solve(&expand(1, Rect::new(10, 10), 4, false)),
            Err(LayoutError::TooManyPieces { count: 4, limit: 3 })
        );
    }

    #[test]
    fn test_fixed_pieces_do_not_count_towards_limit() {
        let config = LayoutConfig {
            max_pending: 1,
            ..LayoutConfig::default()
        };
        let mut instances = vec![fixed(1, Placement::new(0, 0, Rect::new(10, 10), false))];
        instances.extend(expand(2, Rect::new(10, 10), 1, false));
        assert!(LayoutEngine::new(Roll::strip(100), config).solve(&instances).is_ok());
    }

    #[test]
    fn test_taller_pieces_placed_first() {
        let mut instances = expand(1, Rect::new(100, 50), 1, false);
        instances.extend(expand(2, Rect::new(100, 80), 1, false));
        let result = engine(100, 1000).solve(&instances).unwrap();
        assert_eq!(result.placement(InstanceId::new(SpecId(2), 0)).unwrap().y, 0);
        assert_eq!(result.placement(InstanceId::new(SpecId(1), 0)).unwrap().y, 80);
        assert_eq!(result.used_length, 130);
    }

    #[test]
    fn test_capacity_exceeded_reports_unplaced() {
        let result = engine(100, 100)
            .solve(&expand(1, Rect::new(60, 60), 4, false))
            .unwrap();
        assert_layout_valid(&result, 4);
        assert_eq!(result.placements.len(), 1);
        assert_eq!(result.unplaced.len(), 3);
        assert_eq!(result.used_length, 60);
        assert!((result.waste_ratio - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_exact_fit_four_pieces() {
        let result = engine(100, 100)
            .solve(&expand(1, Rect::new(50, 50), 4, false))
            .unwrap();
        assert_layout_valid(&result, 4);
        assert!(result.is_complete());
        assert_eq!(result.used_length, 100);
        assert_eq!(result.waste_ratio, 0.0);
    }

    #[test]
    fn test_deterministic_output() {
        let mut instances = vec![fixed(9, Placement::new(300, 200, Rect::new(400, 300), false))];
        instances.extend(expand(1, Rect::new(800, 600), 3, true));
        instances.extend(expand(2, Rect::new(400, 300), 5, true));
        instances.extend(expand(3, Rect::new(300, 200), 4, false));
        let engine = LayoutEngine::new(Roll::strip(1220), LayoutConfig::default());
        let first = serde_json::to_string(&engine.solve(&instances).unwrap()).unwrap();
        instances.reverse();
        let second = serde_json::to_string(&engine.solve(&instances).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    /// 30 pieces, 6 different sizes on a 1220mm strip.
    #[test]
    fn test_complex_mixed_sizes_strip() {
        let mut instances = Vec::new();
        instances.extend(expand(1, Rect::new(800, 600), 5, true));
        instances.extend(expand(2, Rect::new(400, 300), 8, true));
        instances.extend(expand(3, Rect::new(600, 400), 4, true));
        instances.extend(expand(4, Rect::new(1200, 600), 3, true));
        instances.extend(expand(5, Rect::new(300, 200), 6, true));
        instances.extend(expand(6, Rect::new(500, 500), 4, false));
        assert_eq!(instances.len(), 30);

        let result = LayoutEngine::new(Roll::strip(1220), LayoutConfig::default())
            .solve(&instances)
            .unwrap();
        assert_layout_valid(&result, 30);
        assert!(result.is_complete());

        let min_length = result.placed_area().div_ceil(1220);
        assert!(result.used_length as u64 >= min_length);
        assert!(result.waste_ratio >= 0.0 && result.waste_ratio < 1.0);
    }

    #[test]
    fn test_strategies_all_produce_valid_layouts() {
        let mut instances = expand(1, Rect::new(700, 500), 6, true);
        instances.extend(expand(2, Rect::new(350, 250), 5, true));
        instances.extend(expand(3, Rect::new(450, 450), 4, false));
        for strategy in [
            ScoreStrategy::BestAreaFit,
            ScoreStrategy::BestShortSideFit,
            ScoreStrategy::BestLongSideFit,
        ] {
            let config = LayoutConfig {
                strategy,
                ..LayoutConfig::default()
            };
            let result = LayoutEngine::new(Roll::strip(1220), config)
                .solve(&instances)
                .unwrap();
            assert_layout_valid(&result, 15);
            assert!(result.is_complete());
        }
    }
}
