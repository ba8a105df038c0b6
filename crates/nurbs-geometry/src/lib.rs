//! NurbsModeler geometry: knot vectors, control nets, NURBS curves and surfaces.

pub mod curve;
pub mod net;
pub mod nurbs;
pub mod surface;

pub use curve::{Curve, NurbsCurve};
pub use net::{ControlGrid, ControlNet, ControlPoint};
pub use nurbs::{KnotScheme, KnotVector};
pub use surface::{Direction, NurbsSurface, Surface};
