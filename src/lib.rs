pub mod error;
pub mod free_space;
pub mod geometry;
pub mod layout;
pub mod project;
pub mod render;
pub mod selector;
pub mod store;
pub mod types;

pub use error::{LayoutError, Result};
pub use layout::{LayoutConfig, LayoutEngine};
pub use project::{CuttingProject, PiecePatch};
pub use store::ProjectStore;
pub use types::{
    InstanceId, LayoutResult, PieceInstance, PieceSpec, PieceState, Placement, Rect, Roll,
    RollLength, SpecId,
};
