//! Shared surface-sampling helpers and the tessellation entry point.

use nurbs_core::{KernelError, Result};
use nurbs_geometry::Surface;
use nurbs_math::{Point2, Vector3};

use crate::adaptive::tessellate_surface_adaptive_with;
use crate::grid::tessellate_surface_grid;
use crate::sampling::SurfaceSampling;
use crate::TriangleMesh;

/// Fraction of the domain used to step off a degenerate point.
const NUDGE: f64 = 1e-6;

/// Tessellate `surface` according to `sampling`.
pub fn tessellate_surface<S: Surface + ?Sized>(
    surface: &S,
    sampling: &SurfaceSampling,
) -> Result<TriangleMesh> {
    sampling.validate()?;
    match *sampling {
        SurfaceSampling::Grid { u_divs, v_divs } => tessellate_surface_grid(surface, u_divs, v_divs),
        SurfaceSampling::Adaptive {
            tolerance,
            max_depth,
            initial_divisions,
        } => tessellate_surface_adaptive_with(surface, tolerance, max_depth, initial_divisions),
    }
}

/// Surface normal for a mesh vertex.
///
/// At a degenerate point (a pole, a collapsed edge) the normal is taken a
/// small step towards the middle of the domain. `None` means the caller must
/// fall back to the mesh's face normals.
pub(crate) fn vertex_normal<S: Surface + ?Sized>(surface: &S, u: f64, v: f64) -> Result<Option<Vector3>> {
    match surface.normal_at(u, v) {
        Ok(n) => return Ok(Some(n)),
        Err(KernelError::DegenerateGeometry(_)) => {}
        Err(e) => return Err(e),
    }

    let (u0, u1) = surface.domain_u();
    let (v0, v1) = surface.domain_v();
    let nu = u + (0.5 * (u0 + u1) - u) * NUDGE;
    let nv = v + (0.5 * (v0 + v1) - v) * NUDGE;
    match surface.normal_at(nu, nv) {
        Ok(n) => Ok(Some(n)),
        Err(KernelError::DegenerateGeometry(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parameters remapped to `[0, 1]` over the domain.
pub(crate) fn unit_uv<S: Surface + ?Sized>(surface: &S, u: f64, v: f64) -> Point2 {
    let (u0, u1) = surface.domain_u();
    let (v0, v1) = surface.domain_v();
    Point2::new((u - u0) / (u1 - u0), (v - v0) / (v1 - v0))
}
