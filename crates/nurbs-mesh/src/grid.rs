//! Uniform parameter-grid tessellation of surfaces.

use log::debug;
use nurbs_core::{KernelError, Result, Tolerance};
use nurbs_geometry::Surface;
use nurbs_math::Vector3;

use crate::surface::{unit_uv, vertex_normal};
use crate::TriangleMesh;

/// Tessellate a parametric surface by uniform subdivision in the UV domain.
///
/// Generates a `(u_divs+1) * (v_divs+1)` grid of vertices with positions,
/// normals and uvs, connected by at most `u_divs * v_divs * 2` triangles.
/// Triangles that collapse (at poles or collapsed edges) are skipped.
pub fn tessellate_surface_grid<S: Surface + ?Sized>(
    surface: &S,
    u_divs: usize,
    v_divs: usize,
) -> Result<TriangleMesh> {
    if u_divs == 0 || v_divs == 0 {
        return Err(KernelError::Config(format!(
            "grid {}x{} has no cells",
            u_divs, v_divs
        )));
    }
    let (u_min, u_max) = surface.domain_u();
    let (v_min, v_max) = surface.domain_v();

    let u_count = u_divs + 1;
    let v_count = v_divs + 1;

    let mut mesh = TriangleMesh::default();
    let mut missing_normals = Vec::new();
    for i in 0..u_count {
        let u = if i == u_divs {
            u_max
        } else {
            u_min + (u_max - u_min) * i as f64 / u_divs as f64
        };
        for j in 0..v_count {
            let v = if j == v_divs {
                v_max
            } else {
                v_min + (v_max - v_min) * j as f64 / v_divs as f64
            };
            let normal = vertex_normal(surface, u, v)?;
            let index = mesh.push_vertex(
                surface.point_at(u, v)?,
                normal.unwrap_or(Vector3::ZERO),
                unit_uv(surface, u, v),
            );
            if normal.is_none() {
                missing_normals.push(index);
            }
        }
    }

    let tol = Tolerance::default();
    let idx = |ii: usize, jj: usize| -> u32 { (ii * v_count + jj) as u32 };
    let mut skipped = 0;
    for i in 0..u_divs {
        for j in 0..v_divs {
            if !mesh.push_triangle(idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), tol) {
                skipped += 1;
            }
            if !mesh.push_triangle(idx(i, j), idx(i + 1, j + 1), idx(i, j + 1), tol) {
                skipped += 1;
            }
        }
    }
    mesh.smooth_normals_at(&missing_normals);

    debug!(
        "grid tessellation {}x{}: {} triangles, {} degenerate skipped",
        u_divs,
        v_divs,
        mesh.triangle_count(),
        skipped
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nurbs_geometry::NurbsSurface;
    use nurbs_math::dvec3;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn quarter_cylinder() -> NurbsSurface {
        let arc = [
            (dvec3(1.0, 0.0, 0.0), 1.0),
            (dvec3(1.0, 1.0, 0.0), FRAC_1_SQRT_2),
            (dvec3(0.0, 1.0, 0.0), 1.0),
        ];
        NurbsSurface::new(
            2,
            1,
            arc.iter().map(|&(p, _)| vec![p, p + dvec3(0.0, 0.0, 1.0)]).collect(),
            arc.iter().map(|&(_, w)| vec![w, w]).collect(),
        )
        .unwrap()
    }

    /// Flat patch whose u = 0 row collapses to a point.
    fn triangle_patch() -> NurbsSurface {
        NurbsSurface::new(
            1,
            1,
            vec![
                vec![dvec3(0.0, 0.0, 0.0), dvec3(0.0, 0.0, 0.0)],
                vec![dvec3(1.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0)],
            ],
            vec![vec![1.0; 2]; 2],
        )
        .unwrap()
    }

    #[test]
    fn test_grid_counts_and_positions() {
        let s = quarter_cylinder();
        let mesh = tessellate_surface_grid(&s, 8, 2).unwrap();

        assert_eq!(mesh.vertex_count(), 9 * 3);
        assert_eq!(mesh.triangle_count(), 8 * 2 * 2);
        assert_eq!(mesh.uvs.len(), mesh.vertex_count());

        for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
            assert_abs_diff_eq!(p.truncate().length(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-10);
        }
        let last = mesh.uvs[mesh.vertex_count() - 1];
        assert_eq!((last.x, last.y), (1.0, 1.0));
    }

    #[test]
    fn test_indices_valid() {
        let mesh = tessellate_surface_grid(&quarter_cylinder(), 5, 3).unwrap();
        let n = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < n));
    }

    #[test]
    fn test_collapsed_edge_skips_degenerate_triangles() {
        let mesh = tessellate_surface_grid(&triangle_patch(), 4, 4).unwrap();
        // One triangle per cell along the collapsed row has zero area
        assert_eq!(mesh.triangle_count(), 32 - 4);
        assert_abs_diff_eq!(mesh.area(), 0.5, epsilon = 1e-12);

        // Normals at the collapsed row still point along +z
        for n in &mesh.normals {
            assert_abs_diff_eq!(n.z, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_divisions_rejected() {
        assert!(tessellate_surface_grid(&quarter_cylinder(), 0, 3).is_err());
    }
}
