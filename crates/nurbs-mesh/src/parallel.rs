//! Parallel tessellation of independent objects on the rayon pool.

use nurbs_core::Result;
use nurbs_geometry::{Curve, Surface};
use rayon::prelude::*;

use crate::sampler::tessellate_curve;
use crate::sampling::{Sampling, SurfaceSampling};
use crate::surface::tessellate_surface;
use crate::{Polyline, TriangleMesh};

/// Tessellate every curve; results are in input order.
pub fn tessellate_curves_parallel<C: Curve>(curves: &[C], sampling: Sampling) -> Vec<Result<Polyline>> {
    curves
        .par_iter()
        .map(|curve| tessellate_curve(curve, sampling))
        .collect()
}

/// Tessellate every surface; results are in input order.
pub fn tessellate_surfaces_parallel<S: Surface>(
    surfaces: &[S],
    sampling: &SurfaceSampling,
) -> Vec<Result<TriangleMesh>> {
    surfaces
        .par_iter()
        .map(|surface| tessellate_surface(surface, sampling))
        .collect()
}

/// Tessellate curves and surfaces concurrently.
pub fn tessellate_all_parallel<C: Curve, S: Surface>(
    curves: &[C],
    surfaces: &[S],
    sampling: Sampling,
    surface_sampling: &SurfaceSampling,
) -> (Vec<Result<Polyline>>, Vec<Result<TriangleMesh>>) {
    rayon::join(
        || tessellate_curves_parallel(curves, sampling),
        || tessellate_surfaces_parallel(surfaces, surface_sampling),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nurbs_geometry::{KnotScheme, NurbsCurve, NurbsSurface};
    use nurbs_math::dvec3;

    fn curves() -> Vec<NurbsCurve> {
        (1..=6)
            .map(|k| {
                let s = k as f64;
                NurbsCurve::polynomial(
                    2,
                    vec![dvec3(0.0, 0.0, 0.0), dvec3(s, s, 0.0), dvec3(2.0 * s, 0.0, 0.0)],
                    &KnotScheme::Uniform,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let curves = curves();
        let sampling = Sampling::Adaptive {
            tolerance: 1e-3,
            max_depth: 12,
        };
        let parallel = tessellate_curves_parallel(&curves, sampling);
        assert_eq!(parallel.len(), curves.len());
        for (curve, result) in curves.iter().zip(parallel) {
            assert_eq!(result.unwrap(), tessellate_curve(curve, sampling).unwrap());
        }
    }

    #[test]
    fn test_all_parallel() {
        let surfaces = vec![NurbsSurface::new(
            1,
            1,
            vec![
                vec![dvec3(0.0, 0.0, 0.0), dvec3(0.0, 1.0, 0.0)],
                vec![dvec3(1.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0)],
            ],
            vec![vec![1.0; 2]; 2],
        )
        .unwrap()];
        let (polylines, meshes) = tessellate_all_parallel(
            &curves(),
            &surfaces,
            Sampling::Fixed(16),
            &SurfaceSampling::Grid { u_divs: 3, v_divs: 3 },
        );
        assert!(polylines.iter().all(|p| p.as_ref().map_or(false, |p| p.len() == 17)));
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].as_ref().unwrap().triangle_count(), 18);
    }
}
