//! Handle-based facade over the NurbsModeler kernel.
//!
//! The GUI creates and edits curves and surfaces through a [`Scene`] and
//! receives cached tessellations to draw.

pub mod handle;
pub mod scene;

pub use handle::{CurveHandle, SurfaceHandle};
pub use scene::{Scene, SceneTessellation};
