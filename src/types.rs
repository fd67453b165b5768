use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::{LayoutError, Result};
use crate::geometry::Region;

/// Length used for the single free rectangle of a roll in strip mode.
pub const STRIP_LENGTH: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn is_square(&self) -> bool {
        self.w == self.h
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Accepts JSON integers as well as integral floats (`400.0`) for millimetre fields.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollLength {
    /// Hard cap: pieces beyond this length are reported as unplaced.
    Bounded(#[serde(deserialize_with = "deserialize_u32_from_number")] u32),
    /// Unbounded strip; only the consumed length is reported.
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    pub length: RollLength,
}

impl Roll {
    pub fn bounded(width: u32, length: u32) -> Self {
        Self {
            width,
            length: RollLength::Bounded(length),
        }
    }

    pub fn strip(width: u32) -> Self {
        Self {
            width,
            length: RollLength::Strip,
        }
    }

    pub fn effective_length(&self) -> u32 {
        match self.length {
            RollLength::Bounded(length) => length,
            RollLength::Strip => STRIP_LENGTH,
        }
    }

    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.effective_length())
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.length == RollLength::Bounded(0) {
            return Err(LayoutError::InvalidRollDimensions {
                width: self.width,
                length: self.effective_length(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Roll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.length {
            RollLength::Bounded(length) => write!(f, "{}x{}", self.width, length),
            RollLength::Strip => write!(f, "{}x∞", self.width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpecId(pub u64);

impl std::fmt::Display for SpecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One physical unit of a spec: `index` runs over `0..quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    pub spec: SpecId,
    pub index: u32,
}

impl InstanceId {
    pub fn new(spec: SpecId, index: u32) -> Self {
        Self { spec, index }
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.spec, self.index)
    }
}

/// A positioned piece. `rect` is the oriented footprint on the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub rect: Rect,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub x: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub y: u32,
    #[serde(default)]
    pub rotated: bool,
}

impl Placement {
    pub fn new(x: u32, y: u32, rect: Rect, rotated: bool) -> Self {
        Self {
            rect,
            x,
            y,
            rotated,
        }
    }

    pub fn region(&self) -> Region {
        Region::new(self.x, self.y, self.rect.w, self.rect.h)
    }

    /// Whether this footprint is `piece` in the orientation the `rotated` flag claims.
    pub fn matches(&self, piece: Rect) -> bool {
        if self.rotated {
            self.rect == piece.rotated()
        } else {
            self.rect == piece
        }
    }
}

/// A user-declared cutting requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceSpec {
    pub id: SpecId,
    pub rect: Rect,
    pub quantity: u32,
    pub label: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "placement", rename_all = "snake_case")]
pub enum PieceState {
    Pending,
    Placed(Placement),
    Fixed(Placement),
}

impl PieceState {
    pub fn placement(&self) -> Option<&Placement> {
        match self {
            PieceState::Pending => None,
            PieceState::Placed(p) | PieceState::Fixed(p) => Some(p),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, PieceState::Fixed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceInstance {
    pub id: InstanceId,
    pub rect: Rect,
    pub rotatable: bool,
    pub state: PieceState,
}

impl PieceInstance {
    pub fn pending(id: InstanceId, rect: Rect, rotatable: bool) -> Self {
        Self {
            id,
            rect,
            rotatable,
            state: PieceState::Pending,
        }
    }

    pub fn fixed(id: InstanceId, rect: Rect, placement: Placement) -> Self {
        Self {
            id,
            rect,
            rotatable: false,
            state: PieceState::Fixed(placement),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePlacement {
    pub id: InstanceId,
    pub placement: Placement,
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub roll: Roll,
    /// Fixed and placed instances, ordered by instance id.
    pub placements: Vec<InstancePlacement>,
    pub used_length: u32,
    /// `1 - piece area / (roll width * used length)`; 0 for an empty layout.
    pub waste_ratio: f64,
    /// Ordered by instance id.
    pub unplaced: Vec<InstanceId>,
}

impl LayoutResult {
    pub fn empty(roll: Roll) -> Self {
        Self {
            roll,
            placements: Vec::new(),
            used_length: 0,
            waste_ratio: 0.0,
            unplaced: Vec::new(),
        }
    }

    pub fn placement(&self, id: InstanceId) -> Option<&Placement> {
        self.placements
            .binary_search_by(|p| p.id.cmp(&id))
            .ok()
            .map(|i| &self.placements[i].placement)
    }

    pub fn placed_area(&self) -> u64 {
        self.placements.iter().map(|p| p.placement.rect.area()).sum()
    }

    pub fn waste_percent(&self) -> f64 {
        self.waste_ratio * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}
