//! NurbsModeler tessellation: curve polylines, surface meshes and caching.

pub mod adaptive;
pub mod cache;
pub mod grid;
pub mod mesh;
pub mod parallel;
pub mod polyline;
pub mod sampler;
pub mod sampling;
pub mod surface;

pub use adaptive::{tessellate_surface_adaptive, tessellate_surface_adaptive_with};
pub use cache::TessellationCache;
pub use grid::tessellate_surface_grid;
pub use mesh::TriangleMesh;
pub use parallel::{tessellate_all_parallel, tessellate_curves_parallel, tessellate_surfaces_parallel};
pub use polyline::{CurveSample, Polyline};
pub use sampler::{tessellate_curve, CurveSampler};
pub use sampling::{Sampling, SurfaceSampling, SURFACE_MAX_DEPTH};
pub use surface::tessellate_surface;
