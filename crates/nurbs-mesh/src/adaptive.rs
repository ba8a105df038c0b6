//! Adaptive tessellation of parametric surfaces.
//!
//! Recursively subdivides UV patches where the surface deviates from the
//! bilinear patch through its corners, producing finer triangles in curved
//! regions and coarser triangles in flat areas.

use log::debug;
use nurbs_core::{KernelError, Result, Tolerance};
use nurbs_geometry::Surface;
use nurbs_math::{Point3, Vector3};

use crate::sampling::SURFACE_MAX_DEPTH;
use crate::surface::{unit_uv, vertex_normal};
use crate::TriangleMesh;

/// Initial grid divisions per direction.
const INITIAL_DIVISIONS: usize = 4;

/// Collects vertex/index data during recursive subdivision.
struct MeshBuilder<'a, S: Surface + ?Sized> {
    surface: &'a S,
    tolerance: f64,
    max_depth: u32,
    mesh: TriangleMesh,
    missing_normals: Vec<u32>,
    skipped: usize,
}

impl<'a, S: Surface + ?Sized> MeshBuilder<'a, S> {
    fn new(surface: &'a S, tolerance: f64, max_depth: u32) -> Self {
        Self {
            surface,
            tolerance,
            max_depth,
            mesh: TriangleMesh::default(),
            missing_normals: Vec::new(),
            skipped: 0,
        }
    }

    /// Largest distance between the surface and the bilinear patch over its
    /// corners, sampled at the center and the edge midpoints.
    fn deviation(&self, u0: f64, u1: f64, v0: f64, v1: f64) -> Result<f64> {
        let s = self.surface;
        let p00 = s.point_at(u0, v0)?;
        let p10 = s.point_at(u1, v0)?;
        let p01 = s.point_at(u0, v1)?;
        let p11 = s.point_at(u1, v1)?;
        let (um, vm) = ((u0 + u1) * 0.5, (v0 + v1) * 0.5);

        let checks: [(f64, f64, Point3); 5] = [
            (um, vm, (p00 + p10 + p01 + p11) * 0.25),
            (um, v0, (p00 + p10) * 0.5),
            (um, v1, (p01 + p11) * 0.5),
            (u0, vm, (p00 + p01) * 0.5),
            (u1, vm, (p10 + p11) * 0.5),
        ];
        let mut max = 0.0_f64;
        for (u, v, approx) in checks {
            max = max.max(s.point_at(u, v)?.distance(approx));
        }
        Ok(max)
    }

    fn subdivide(&mut self, u0: f64, u1: f64, v0: f64, v1: f64, depth: u32) -> Result<()> {
        if depth < self.max_depth && self.deviation(u0, u1, v0, v1)? > self.tolerance {
            let u_mid = (u0 + u1) * 0.5;
            let v_mid = (v0 + v1) * 0.5;
            self.subdivide(u0, u_mid, v0, v_mid, depth + 1)?;
            self.subdivide(u_mid, u1, v0, v_mid, depth + 1)?;
            self.subdivide(u0, u_mid, v_mid, v1, depth + 1)?;
            self.subdivide(u_mid, u1, v_mid, v1, depth + 1)?;
            Ok(())
        } else {
            self.emit_quad(u0, u1, v0, v1)
        }
    }

    fn emit_quad(&mut self, u0: f64, u1: f64, v0: f64, v1: f64) -> Result<()> {
        let mut corners = [0u32; 4];
        for (slot, &(u, v)) in corners.iter_mut().zip(&[(u0, v0), (u1, v0), (u1, v1), (u0, v1)]) {
            let normal = vertex_normal(self.surface, u, v)?;
            *slot = self.mesh.push_vertex(
                self.surface.point_at(u, v)?,
                normal.unwrap_or(Vector3::ZERO),
                unit_uv(self.surface, u, v),
            );
            if normal.is_none() {
                self.missing_normals.push(*slot);
            }
        }

        let tol = Tolerance::default();
        let [a, b, c, d] = corners;
        if !self.mesh.push_triangle(a, b, c, tol) {
            self.skipped += 1;
        }
        if !self.mesh.push_triangle(a, c, d, tol) {
            self.skipped += 1;
        }
        Ok(())
    }

    fn into_mesh(mut self) -> TriangleMesh {
        self.mesh.smooth_normals_at(&self.missing_normals);
        debug!(
            "adaptive tessellation: {} triangles, {} degenerate skipped",
            self.mesh.triangle_count(),
            self.skipped
        );
        self.mesh
    }
}

/// Split each span between consecutive breakpoints so the whole domain gets
/// roughly `divisions` cells.
fn initial_parameters(breakpoints: &[f64], divisions: usize) -> Vec<f64> {
    let spans = breakpoints.len().saturating_sub(1).max(1);
    let per_span = divisions.div_ceil(spans).max(1);
    let mut params = vec![breakpoints[0]];
    for w in breakpoints.windows(2) {
        for k in 1..=per_span {
            params.push(if k == per_span {
                w[1]
            } else {
                w[0] + (w[1] - w[0]) * k as f64 / per_span as f64
            });
        }
    }
    params
}

/// Adaptively tessellate a parametric surface based on a distance tolerance.
///
/// Uses the default initial grid and depth limit; see
/// [`tessellate_surface_adaptive_with`].
pub fn tessellate_surface_adaptive<S: Surface + ?Sized>(
    surface: &S,
    tolerance: f64,
) -> Result<TriangleMesh> {
    tessellate_surface_adaptive_with(surface, tolerance, SURFACE_MAX_DEPTH, INITIAL_DIVISIONS)
}

/// Adaptively tessellate a parametric surface.
///
/// The algorithm starts from a coarse grid aligned with the knot spans and
/// recursively subdivides each quad where the surface deviates from the
/// bilinear interpolation of its corners by more than `tolerance`.
pub fn tessellate_surface_adaptive_with<S: Surface + ?Sized>(
    surface: &S,
    tolerance: f64,
    max_depth: u32,
    initial_divisions: usize,
) -> Result<TriangleMesh> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(KernelError::Config(format!(
            "surface tolerance must be positive, got {}",
            tolerance
        )));
    }
    let mut breaks_u = surface.breakpoints_u();
    let mut breaks_v = surface.breakpoints_v();
    breaks_u.dedup();
    breaks_v.dedup();
    if breaks_u.len() < 2 || breaks_v.len() < 2 {
        return Err(KernelError::DegenerateGeometry(
            "surface has an empty parameter domain".into(),
        ));
    }
    let us = initial_parameters(&breaks_u, initial_divisions);
    let vs = initial_parameters(&breaks_v, initial_divisions);

    let mut builder = MeshBuilder::new(surface, tolerance, max_depth.min(SURFACE_MAX_DEPTH));
    for u in us.windows(2) {
        for v in vs.windows(2) {
            builder.subdivide(u[0], u[1], v[0], v[1], 0)?;
        }
    }
    Ok(builder.into_mesh())
}
