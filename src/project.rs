use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::layout::{LayoutConfig, LayoutEngine};
use crate::types::{
    InstanceId, LayoutResult, PieceInstance, PieceSpec, PieceState, Placement, Rect, Roll, SpecId,
};

/// A piece as submitted by the caller. Completed pieces carry one fixed
/// position per unit, indexed by instance index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPiece {
    pub rect: Rect,
    pub quantity: u32,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub fixed_positions: Vec<Placement>,
}

impl NewPiece {
    pub fn new(rect: Rect, quantity: u32) -> Self {
        Self {
            rect,
            quantity,
            label: None,
            completed: false,
            fixed_positions: Vec::new(),
        }
    }

    /// A completed piece with one unit per position.
    pub fn completed_at(rect: Rect, fixed_positions: Vec<Placement>) -> Result<Self> {
        Ok(Self {
            rect,
            quantity: quantity_of(fixed_positions.len())?,
            label: None,
            completed: true,
            fixed_positions,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiecePatch {
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// One cutting project: its roll, piece specs, their expanded instances and
/// the layout from the last successful optimization.
///
/// Every mutation works on a copy and re-optimizes before committing, so a
/// failed call leaves the project exactly as it was.
#[derive(Debug, Clone)]
pub struct CuttingProject {
    roll: Roll,
    allow_rotation: bool,
    config: LayoutConfig,
    next_spec_id: u64,
    specs: Vec<PieceSpec>,
    /// Ordered by instance id.
    instances: Vec<PieceInstance>,
    layout: LayoutResult,
}

impl CuttingProject {
    pub fn new(roll: Roll, allow_rotation: bool, config: LayoutConfig) -> Result<Self> {
        roll.validate()?;
        Ok(Self {
            roll,
            allow_rotation,
            config,
            next_spec_id: 1,
            specs: Vec::new(),
            instances: Vec::new(),
            layout: LayoutResult::empty(roll),
        })
    }

    pub fn roll(&self) -> Roll {
        self.roll
    }

    pub fn allow_rotation(&self) -> bool {
        self.allow_rotation
    }

    pub fn specs(&self) -> &[PieceSpec] {
        &self.specs
    }

    pub fn spec(&self, id: SpecId) -> Option<&PieceSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn instances(&self) -> &[PieceInstance] {
        &self.instances
    }

    pub fn instances_of(&self, spec: SpecId) -> impl Iterator<Item = &PieceInstance> {
        self.instances.iter().filter(move |i| i.id.spec == spec)
    }

    pub fn layout(&self) -> &LayoutResult {
        &self.layout
    }

    pub fn add_pieces(&mut self, pieces: Vec<NewPiece>) -> Result<Vec<SpecId>> {
        self.transact(|project| {
            let mut ids = Vec::with_capacity(pieces.len());
            for piece in pieces {
                ids.push(project.insert_piece(piece)?);
            }
            tracing::debug!(added = ids.len(), "pieces added");
            Ok(ids)
        })
    }

    pub fn update_piece(&mut self, id: SpecId, patch: PiecePatch) -> Result<()> {
        self.transact(|project| {
            let idx = project.spec_index(id)?;
            let current = project.specs[idx].clone();
            let rect = patch.rect.unwrap_or(current.rect);
            let quantity = patch.quantity.unwrap_or(current.quantity);
            validate_piece(rect, quantity)?;

            if patch.completed == Some(false) && current.completed {
                project.unfix(idx);
            }
            let resized = rect != current.rect || quantity != current.quantity;
            if resized && project.specs[idx].completed {
                return Err(LayoutError::CompletedPieceLocked(id));
            }

            let spec = &mut project.specs[idx];
            spec.rect = rect;
            spec.quantity = quantity;
            if let Some(label) = patch.label {
                spec.label = Some(label);
            }
            if resized {
                project.check_pending(id, quantity)?;
                project.expand_pending(idx);
            }
            if patch.completed == Some(true) && !project.specs[idx].completed {
                project.fix(idx, &[])?;
            }
            tracing::debug!(spec = %id, resized, "piece updated");
            Ok(())
        })
    }

    /// Flips a spec between completed and pending and returns the new state.
    ///
    /// Completing takes each unit's position from `positions[index]`, falling
    /// back to its last computed placement.
    pub fn toggle_complete(&mut self, id: SpecId, positions: &[Placement]) -> Result<bool> {
        self.transact(|project| {
            let idx = project.spec_index(id)?;
            if project.specs[idx].completed {
                project.unfix(idx);
            } else {
                project.fix(idx, positions)?;
            }
            let completed = project.specs[idx].completed;
            tracing::debug!(spec = %id, completed, "piece completion toggled");
            Ok(completed)
        })
    }

    pub fn remove_piece(&mut self, id: SpecId) -> Result<PieceSpec> {
        self.transact(|project| {
            let idx = project.spec_index(id)?;
            let spec = project.specs.remove(idx);
            project.instances.retain(|i| i.id.spec != id);
            tracing::debug!(spec = %id, "piece removed");
            Ok(spec)
        })
    }

    /// Re-runs the layout engine without changing any piece.
    pub fn reoptimize(&mut self) -> Result<&LayoutResult> {
        let engine = LayoutEngine::new(self.roll, self.config);
        let result = engine.solve(&self.instances)?;
        for instance in &mut self.instances {
            if instance.state.is_fixed() {
                continue;
            }
            instance.state = match result.placement(instance.id) {
                Some(placement) => PieceState::Placed(*placement),
                None => PieceState::Pending,
            };
        }
        self.layout = result;
        Ok(&self.layout)
    }

    fn transact<T>(&mut self, mutate: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut working = self.clone();
        let out = mutate(&mut working)?;
        working.reoptimize()?;
        *self = working;
        Ok(out)
    }

    fn spec_index(&self, id: SpecId) -> Result<usize> {
        self.specs
            .iter()
            .position(|s| s.id == id)
            .ok_or(LayoutError::UnknownPiece(id))
    }

    fn insert_piece(&mut self, piece: NewPiece) -> Result<SpecId> {
        validate_piece(piece.rect, piece.quantity)?;
        let id = SpecId(self.next_spec_id);
        self.next_spec_id += 1;
        self.specs.push(PieceSpec {
            id,
            rect: piece.rect,
            quantity: piece.quantity,
            label: piece.label,
            completed: false,
        });
        let idx = self.specs.len() - 1;
        if piece.completed {
            let supplied = quantity_of(piece.fixed_positions.len())?;
            if supplied < piece.quantity {
                return Err(LayoutError::MissingFixedPosition(InstanceId::new(id, supplied)));
            }
            if supplied > piece.quantity {
                return Err(LayoutError::UnusedFixedPositions(id));
            }
            self.expand_pending(idx);
            self.fix(idx, &piece.fixed_positions)?;
        } else {
            if !piece.fixed_positions.is_empty() {
                return Err(LayoutError::UnusedFixedPositions(id));
            }
            self.check_pending(id, piece.quantity)?;
            self.expand_pending(idx);
        }
        Ok(id)
    }

    /// Fails when giving `spec` `quantity` pending units would exceed the
    /// engine's limit. Runs before expansion so the instances are never built.
    fn check_pending(&self, spec: SpecId, quantity: u32) -> Result<()> {
        let others = self
            .instances
            .iter()
            .filter(|i| i.id.spec != spec && !i.state.is_fixed())
            .count();
        let count = others.saturating_add(quantity as usize);
        if count > self.config.max_pending {
            return Err(LayoutError::TooManyPieces {
                count,
                limit: self.config.max_pending,
            });
        }
        Ok(())
    }

    /// Replaces the spec's instances with `quantity` fresh pending ones.
    fn expand_pending(&mut self, idx: usize) {
        let spec = &self.specs[idx];
        let id = spec.id;
        self.instances.retain(|i| i.id.spec != id);
        self.instances.extend((0..spec.quantity).map(|index| {
            PieceInstance::pending(InstanceId::new(id, index), spec.rect, self.allow_rotation)
        }));
        self.instances.sort_by_key(|i| i.id);
    }

    fn fix(&mut self, idx: usize, positions: &[Placement]) -> Result<()> {
        let spec_id = self.specs[idx].id;
        for instance in self.instances.iter_mut().filter(|i| i.id.spec == spec_id) {
            let placement = match positions.get(instance.id.index as usize) {
                Some(supplied) => {
                    if !supplied.matches(instance.rect) {
                        return Err(LayoutError::FixedPositionMismatch(instance.id));
                    }
                    *supplied
                }
                None => match instance.state {
                    PieceState::Placed(placed) => placed,
                    _ => return Err(LayoutError::MissingFixedPosition(instance.id)),
                },
            };
            instance.state = PieceState::Fixed(placement);
        }
        self.specs[idx].completed = true;
        Ok(())
    }

    fn unfix(&mut self, idx: usize) {
        let spec_id = self.specs[idx].id;
        for instance in self.instances.iter_mut().filter(|i| i.id.spec == spec_id) {
            instance.state = PieceState::Pending;
            instance.rotatable = self.allow_rotation;
        }
        self.specs[idx].completed = false;
    }
}

fn quantity_of(positions: usize) -> Result<u32> {
    u32::try_from(positions).map_err(|_| LayoutError::TooManyPieces {
        count: positions,
        limit: u32::MAX as usize,
    })
}

fn validate_piece(rect: Rect, quantity: u32) -> Result<()> {
    if rect.w == 0 || rect.h == 0 || quantity == 0 {
        return Err(LayoutError::InvalidPieceDimensions {
            width: rect.w,
            height: rect.h,
            quantity,
        });
    }
    Ok(())
}
