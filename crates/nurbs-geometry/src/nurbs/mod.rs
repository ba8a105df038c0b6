//! NURBS core algorithms: knot vectors, basis functions, de Boor evaluation
//! and refinement.

pub mod basis;
pub mod deboor;
pub mod knot;
pub mod refine;

pub use basis::{basis_function_derivatives, basis_functions, evaluate_basis, one_basis_function};
pub use deboor::MAX_DERIVATIVE_ORDER;
pub use knot::{KnotScheme, KnotVector};
