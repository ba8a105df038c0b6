//! Tensor-product NURBS surfaces.

use log::debug;
use nurbs_core::traits::{BoundingBox, Validate, Versioned};
use nurbs_core::{Generation, KernelError, Result, Tolerance};
use nurbs_math::{HPoint, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::net::{ControlGrid, ControlPoint};
use crate::nurbs::deboor::{rational_surface_derivatives, surface_derivatives, MAX_DERIVATIVE_ORDER};
use crate::nurbs::refine;
use crate::nurbs::{KnotScheme, KnotVector};

/// Trait for parametric surfaces in 3D space.
pub trait Surface: Send + Sync {
    /// Evaluate the surface at parameters `(u, v)`.
    fn point_at(&self, u: f64, v: f64) -> Result<Point3>;

    /// Evaluate the unit surface normal at parameters `(u, v)`.
    fn normal_at(&self, u: f64, v: f64) -> Result<Vector3>;

    /// Return the u-parameter domain `(u_min, u_max)`.
    fn domain_u(&self) -> (f64, f64);

    /// Return the v-parameter domain `(v_min, v_max)`.
    fn domain_v(&self) -> (f64, f64);

    /// Parameters in u where the surface may lose smoothness.
    fn breakpoints_u(&self) -> Vec<f64> {
        let (u0, u1) = self.domain_u();
        vec![u0, u1]
    }

    /// Parameters in v where the surface may lose smoothness.
    fn breakpoints_v(&self) -> Vec<f64> {
        let (v0, v1) = self.domain_v();
        vec![v0, v1]
    }
}

/// Parametric direction of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    U,
    V,
}

/// A NURBS surface over a grid of control points.
///
/// Rows of the grid run along u and are governed by `knots_u`; columns run
/// along v.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNurbsSurface")]
pub struct NurbsSurface {
    knots_u: KnotVector,
    knots_v: KnotVector,
    grid: ControlGrid,
}

#[derive(Deserialize)]
struct RawNurbsSurface {
    knots_u: KnotVector,
    knots_v: KnotVector,
    grid: ControlGrid,
}

impl TryFrom<RawNurbsSurface> for NurbsSurface {
    type Error = KernelError;

    fn try_from(raw: RawNurbsSurface) -> Result<Self> {
        let surface = Self {
            knots_u: raw.knots_u,
            knots_v: raw.knots_v,
            grid: raw.grid,
        };
        surface.check_structure()?;
        Ok(surface)
    }
}

impl NurbsSurface {
    /// Create a surface with uniform clamped knots in both directions.
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        control_points: Vec<Vec<Point3>>,
        weights: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let grid = ControlGrid::new(control_points, weights)?;
        let knots_u = KnotVector::create(degree_u, grid.rows(), &KnotScheme::Uniform)?;
        let knots_v = KnotVector::create(degree_v, grid.cols(), &KnotScheme::Uniform)?;
        Self::from_parts(knots_u, knots_v, grid)
    }

    /// Create a surface from explicit knot sequences.
    pub fn with_knots(
        degree_u: usize,
        degree_v: usize,
        control_points: Vec<Vec<Point3>>,
        weights: Vec<Vec<f64>>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
    ) -> Result<Self> {
        let grid = ControlGrid::new(control_points, weights)?;
        let knots_u = KnotVector::from_knots(degree_u, knots_u, grid.rows())?;
        let knots_v = KnotVector::from_knots(degree_v, knots_v, grid.cols())?;
        Self::from_parts(knots_u, knots_v, grid)
    }

    fn from_parts(knots_u: KnotVector, knots_v: KnotVector, grid: ControlGrid) -> Result<Self> {
        let surface = Self {
            knots_u,
            knots_v,
            grid,
        };
        surface.validate()?;
        Ok(surface)
    }

    pub fn degree_u(&self) -> usize {
        self.knots_u.degree()
    }

    pub fn degree_v(&self) -> usize {
        self.knots_v.degree()
    }

    pub fn knots_u(&self) -> &KnotVector {
        &self.knots_u
    }

    pub fn knots_v(&self) -> &KnotVector {
        &self.knots_v
    }

    pub fn knots(&self, direction: Direction) -> &KnotVector {
        match direction {
            Direction::U => &self.knots_u,
            Direction::V => &self.knots_v,
        }
    }

    pub fn control_grid(&self) -> &ControlGrid {
        &self.grid
    }

    pub fn domain_u(&self) -> (f64, f64) {
        self.knots_u.domain()
    }

    pub fn domain_v(&self) -> (f64, f64) {
        self.knots_v.domain()
    }

    /// Partial derivatives `S(k, l)` for `k <= order_u`, `l <= order_v`.
    ///
    /// `result[0][0]` is the surface point. Orders above
    /// [`MAX_DERIVATIVE_ORDER`] in either direction are refused.
    pub fn derivatives(
        &self,
        u: f64,
        v: f64,
        order_u: usize,
        order_v: usize,
    ) -> Result<Vec<Vec<Vector3>>> {
        let u = self.knots_u.check_parameter(u)?;
        let v = self.knots_v.check_parameter(v)?;
        if order_u.max(order_v) > MAX_DERIVATIVE_ORDER {
            return Err(KernelError::DimensionMismatch(format!(
                "derivative order ({}, {}) exceeds {}",
                order_u, order_v, MAX_DERIVATIVE_ORDER
            )));
        }
        let hders = surface_derivatives(
            &self.knots_u,
            &self.knots_v,
            &self.grid.homogeneous(),
            u,
            v,
            order_u,
            order_v,
        );
        let ders = rational_surface_derivatives(&hders, order_u, order_v).ok_or_else(|| {
            KernelError::DegenerateGeometry(format!(
                "weight function vanishes at ({}, {})",
                u, v
            ))
        })?;
        if ders.iter().flatten().any(|d| !d.is_finite()) {
            return Err(KernelError::DegenerateGeometry(format!(
                "non-finite surface derivative at ({}, {})",
                u, v
            )));
        }
        Ok(ders)
    }

    /// Evaluate the surface point at `(u, v)`.
    pub fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        let ders = self.derivatives(u, v, 0, 0)?;
        Ok(ders[0][0])
    }

    /// The mixed partial derivative of order `(order_u, order_v)`.
    ///
    /// Zero for a non-rational surface once either order passes the degree
    /// in its direction.
    pub fn evaluate_derivative(
        &self,
        u: f64,
        v: f64,
        order_u: usize,
        order_v: usize,
    ) -> Result<Vector3> {
        if (order_u > self.degree_u() || order_v > self.degree_v()) && !self.grid.is_rational() {
            self.knots_u.check_parameter(u)?;
            self.knots_v.check_parameter(v)?;
            return Ok(Vector3::ZERO);
        }
        let ders = self.derivatives(u, v, order_u, order_v)?;
        Ok(ders[order_u][order_v])
    }

    /// Unit normal `Su x Sv` at `(u, v)`.
    pub fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        let ders = self.derivatives(u, v, 1, 1)?;
        ders[1][0].cross(ders[0][1]).try_normalize().ok_or_else(|| {
            KernelError::DegenerateGeometry(format!(
                "partial derivatives are parallel at ({}, {})",
                u, v
            ))
        })
    }

    /// Move control point `(i, j)` in place. O(1).
    pub fn move_point(&mut self, i: usize, j: usize, position: Point3) -> Result<()> {
        self.grid.move_point(i, j, position)?;
        debug!("surface: moved control point ({}, {}) to {:?}", i, j, position);
        Ok(())
    }

    pub fn set_weight(&mut self, i: usize, j: usize, weight: f64) -> Result<()> {
        self.grid.set_weight(i, j, weight)?;
        debug!("surface: weight of control point ({}, {}) set to {}", i, j, weight);
        Ok(())
    }

    /// Insert `value` into the knot vector of `direction` without changing the
    /// shape. Returns the index of the new knot.
    pub fn insert_knot_refine(&mut self, direction: Direction, value: f64) -> Result<usize> {
        let mut index = 0;
        let (knots, lines) = self.map_lines(direction, |kv, line| {
            let (kv, points, i) = refine::insert_knot(kv, line, value)?;
            index = i;
            Ok((kv, points))
        })?;
        self.commit_lines(direction, knots, lines)?;
        debug!("surface: inserted {:?} knot {} at index {}", direction, value, index);
        Ok(index)
    }

    /// Raise the degree in `direction` by one without changing the shape.
    pub fn degree_elevate(&mut self, direction: Direction) -> Result<()> {
        let (knots, lines) = self.map_lines(direction, refine::elevate_degree)?;
        self.commit_lines(direction, knots, lines)?;
        debug!(
            "surface: {:?} degree elevated to {}",
            direction,
            self.knots(direction).degree()
        );
        Ok(())
    }

    /// Apply a curve refinement to every iso-line running along `direction`.
    fn map_lines<F>(&self, direction: Direction, mut op: F) -> Result<(KnotVector, Vec<Vec<HPoint>>)>
    where
        F: FnMut(&KnotVector, &[HPoint]) -> Result<(KnotVector, Vec<HPoint>)>,
    {
        let (rows, cols) = (self.grid.rows(), self.grid.cols());
        let h = self.grid.homogeneous();
        let lines: Vec<Vec<HPoint>> = match direction {
            Direction::U => (0..cols)
                .map(|j| (0..rows).map(|i| h[i * cols + j]).collect())
                .collect(),
            Direction::V => h.chunks(cols).map(<[HPoint]>::to_vec).collect(),
        };

        let source = self.knots(direction);
        let mut refined = None;
        let mut out = Vec::with_capacity(lines.len());
        for line in &lines {
            let (kv, points) = op(source, line)?;
            refined = Some(kv);
            out.push(points);
        }
        let refined =
            refined.ok_or_else(|| KernelError::DimensionMismatch("empty control grid".into()))?;
        Ok((refined, out))
    }

    fn commit_lines(
        &mut self,
        direction: Direction,
        knots: KnotVector,
        lines: Vec<Vec<HPoint>>,
    ) -> Result<()> {
        let len = lines.first().map_or(0, Vec::len);
        let (rows, cols, points) = match direction {
            Direction::U => {
                let mut points = Vec::with_capacity(len * lines.len());
                for i in 0..len {
                    for line in &lines {
                        points.push(ControlPoint::from_homogeneous(line[i])?);
                    }
                }
                (len, lines.len(), points)
            }
            Direction::V => {
                let rows = lines.len();
                let points = lines
                    .into_iter()
                    .flatten()
                    .map(ControlPoint::from_homogeneous)
                    .collect::<Result<Vec<_>>>()?;
                (rows, len, points)
            }
        };

        match direction {
            Direction::U => self.knots_u = knots,
            Direction::V => self.knots_v = knots,
        }
        self.grid.replace(rows, cols, points);
        Ok(())
    }
}

impl NurbsSurface {
    /// Degrees and knot counts agree with the grid in both directions.
    fn check_structure(&self) -> Result<()> {
        for (kv, count) in [
            (&self.knots_u, self.grid.rows()),
            (&self.knots_v, self.grid.cols()),
        ] {
            if kv.degree() < 1 || kv.degree() >= count {
                return Err(KernelError::InvalidDegree {
                    degree: kv.degree(),
                    control_points: count,
                });
            }
            if kv.control_point_count() != count {
                return Err(KernelError::DimensionMismatch(format!(
                    "{} knots for {} control points of degree {}",
                    kv.len(),
                    count,
                    kv.degree()
                )));
            }
        }
        Ok(())
    }
}

impl Validate for NurbsSurface {
    fn validate(&self) -> Result<()> {
        self.check_structure()?;
        if self.grid.is_degenerate(Tolerance::default()) {
            return Err(KernelError::DegenerateGeometry(
                "all control points coincide".into(),
            ));
        }
        Ok(())
    }
}

impl Versioned for NurbsSurface {
    fn generation(&self) -> Generation {
        self.grid.generation()
    }
}

impl BoundingBox for NurbsSurface {
    type Point = Point3;

    fn bounding_box(&self) -> (Point3, Point3) {
        self.grid.bounding_box()
    }
}

impl Surface for NurbsSurface {
    fn point_at(&self, u: f64, v: f64) -> Result<Point3> {
        self.evaluate(u, v)
    }

    fn normal_at(&self, u: f64, v: f64) -> Result<Vector3> {
        self.normal(u, v)
    }

    fn domain_u(&self) -> (f64, f64) {
        self.knots_u.domain()
    }

    fn domain_v(&self) -> (f64, f64) {
        self.knots_v.domain()
    }

    fn breakpoints_u(&self) -> Vec<f64> {
        self.knots_u.breakpoints()
    }

    fn breakpoints_v(&self) -> Vec<f64> {
        self.knots_v.breakpoints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nurbs_math::dvec3;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn flat_patch() -> NurbsSurface {
        NurbsSurface::new(
            1,
            1,
            vec![
                vec![dvec3(0.0, 0.0, 0.0), dvec3(0.0, 1.0, 0.0)],
                vec![dvec3(1.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0)],
            ],
            vec![vec![1.0; 2]; 2],
        )
        .unwrap()
    }

    /// Quarter cylinder of radius 1 and height 2: u runs around the arc.
    fn quarter_cylinder() -> NurbsSurface {
        let arc = [
            (dvec3(1.0, 0.0, 0.0), 1.0),
            (dvec3(1.0, 1.0, 0.0), FRAC_1_SQRT_2),
            (dvec3(0.0, 1.0, 0.0), 1.0),
        ];
        let points = arc
            .iter()
            .map(|&(p, _)| vec![p, p + dvec3(0.0, 0.0, 2.0)])
            .collect();
        let weights = arc.iter().map(|&(_, w)| vec![w, w]).collect();
        NurbsSurface::new(2, 1, points, weights).unwrap()
    }

    /// Bicubic bump with varied weights.
    fn wavy() -> NurbsSurface {
        let mut points = Vec::new();
        let mut weights = Vec::new();
        for i in 0..5 {
            let mut row = Vec::new();
            let mut wrow = Vec::new();
            for j in 0..4 {
                let (x, y) = (i as f64, j as f64);
                row.push(dvec3(x, y, (x * 0.9).sin() * (y * 1.1).cos()));
                wrow.push(1.0 + 0.25 * ((i + 2 * j) % 3) as f64);
            }
            points.push(row);
            weights.push(wrow);
        }
        NurbsSurface::new(3, 2, points, weights).unwrap()
    }

    fn assert_same_shape(a: &NurbsSurface, b: &NurbsSurface) {
        for i in 0..=20 {
            for j in 0..=20 {
                let (u, v) = (i as f64 / 20.0, j as f64 / 20.0);
                let d = a.evaluate(u, v).unwrap().distance(b.evaluate(u, v).unwrap());
                assert!(d < 1e-9, "shapes differ by {} at ({}, {})", d, u, v);
            }
        }
    }

    #[test]
    fn test_bilinear_evaluation_and_normal() {
        let s = flat_patch();
        let p = s.evaluate(0.25, 0.75).unwrap();
        assert_abs_diff_eq!(p.x, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.75, epsilon = 1e-12);

        let n = s.normal(0.5, 0.5).unwrap();
        assert_abs_diff_eq!(n.z, 1.0, epsilon = 1e-12);
        assert_eq!(s.domain_u(), (0.0, 1.0));
    }

    #[test]
    fn test_construction_errors() {
        let points = vec![vec![dvec3(0.0, 0.0, 0.0), dvec3(1.0, 0.0, 0.0)]; 2];
        assert!(matches!(
            NurbsSurface::new(2, 1, points.clone(), vec![vec![1.0; 2]; 2]),
            Err(KernelError::InvalidDegree { .. })
        ));
        assert!(matches!(
            NurbsSurface::new(1, 1, points, vec![vec![1.0, 0.0]; 2]),
            Err(KernelError::InvalidWeight(_))
        ));
        assert!(matches!(
            NurbsSurface::new(1, 1, vec![vec![dvec3(1.0, 1.0, 1.0); 2]; 2], vec![vec![1.0; 2]; 2]),
            Err(KernelError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_out_of_domain() {
        let s = flat_patch();
        assert!(matches!(
            s.evaluate(1.1, 0.5),
            Err(KernelError::OutOfDomain { .. })
        ));
        assert!(s.normal(0.5, -0.5).is_err());
    }

    #[test]
    fn test_quarter_cylinder_is_exact() {
        let s = quarter_cylinder();
        for i in 0..=10 {
            for j in 0..=4 {
                let (u, v) = (i as f64 / 10.0, j as f64 / 4.0);
                let p = s.evaluate(u, v).unwrap();
                assert_abs_diff_eq!(p.truncate().length(), 1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(p.z, 2.0 * v, epsilon = 1e-12);

                // Normal is radial
                let n = s.normal(u, v).unwrap();
                assert_abs_diff_eq!(n.z, 0.0, epsilon = 1e-10);
                assert_abs_diff_eq!(n.truncate().perp_dot(p.truncate()), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_degenerate_normal() {
        // Row 0 collapses to a single point, so Sv vanishes along u = 0
        let s = NurbsSurface::new(
            1,
            1,
            vec![
                vec![dvec3(0.0, 0.0, 0.0), dvec3(0.0, 0.0, 0.0)],
                vec![dvec3(1.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0)],
            ],
            vec![vec![1.0; 2]; 2],
        )
        .unwrap();
        assert!(s.evaluate(0.0, 0.5).is_ok());
        assert!(matches!(
            s.normal(0.0, 0.5),
            Err(KernelError::DegenerateGeometry(_))
        ));
        assert!(s.normal(0.5, 0.5).is_ok());
    }

    #[test]
    fn test_partials_match_finite_differences() {
        let s = wavy();
        let h = 1e-5;
        for &(u, v) in &[(0.2, 0.3), (0.6, 0.7), (0.9, 0.1)] {
            let su = s.evaluate_derivative(u, v, 1, 0).unwrap();
            let fd_u = (s.evaluate(u + h, v).unwrap() - s.evaluate(u - h, v).unwrap()) / (2.0 * h);
            assert_abs_diff_eq!((su - fd_u).length(), 0.0, epsilon = 1e-5);

            let sv = s.evaluate_derivative(u, v, 0, 1).unwrap();
            let fd_v = (s.evaluate(u, v + h).unwrap() - s.evaluate(u, v - h).unwrap()) / (2.0 * h);
            assert_abs_diff_eq!((sv - fd_v).length(), 0.0, epsilon = 1e-5);

            let suv = s.evaluate_derivative(u, v, 1, 1).unwrap();
            let fd_uv = (s.evaluate_derivative(u, v + h, 1, 0).unwrap()
                - s.evaluate_derivative(u, v - h, 1, 0).unwrap())
                / (2.0 * h);
            assert_abs_diff_eq!((suv - fd_uv).length(), 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_partial_orders_above_degree() {
        let flat = flat_patch();
        assert_eq!(flat.evaluate_derivative(0.5, 0.5, 2, 0).unwrap(), Vector3::ZERO);
        assert_eq!(
            flat.evaluate_derivative(0.5, 0.5, usize::MAX, usize::MAX).unwrap(),
            Vector3::ZERO
        );
        assert!(flat.evaluate_derivative(2.0, 0.5, usize::MAX, 0).is_err());

        // The rational arc direction keeps nonzero partials past its degree
        let cylinder = quarter_cylinder();
        assert!(cylinder.evaluate_derivative(0.5, 0.5, 3, 0).unwrap().length() > 1e-3);
        assert_abs_diff_eq!(
            cylinder.evaluate_derivative(0.5, 0.5, 0, 2).unwrap().length(),
            0.0,
            epsilon = 1e-9
        );
        assert!(matches!(
            cylinder.evaluate_derivative(0.5, 0.5, 0, usize::MAX),
            Err(KernelError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_knot_insertion_preserves_shape() {
        let original = wavy();
        let mut refined = original.clone();

        let index = refined.insert_knot_refine(Direction::U, 0.4).unwrap();
        assert_eq!(refined.knots_u().knots()[index], 0.4);
        assert_eq!(refined.control_grid().rows(), 6);
        assert_eq!(refined.control_grid().cols(), 4);
        assert_same_shape(&original, &refined);

        refined.insert_knot_refine(Direction::V, 0.25).unwrap();
        assert_eq!(refined.control_grid().cols(), 5);
        assert_same_shape(&original, &refined);
        assert!(refined.generation() > original.generation());
    }

    #[test]
    fn test_degree_elevation_preserves_shape() {
        let original = wavy();
        let mut elevated = original.clone();
        elevated.degree_elevate(Direction::V).unwrap();
        assert_eq!(elevated.degree_v(), 3);
        assert_eq!(elevated.control_grid().cols(), 6);
        assert_same_shape(&original, &elevated);

        elevated.degree_elevate(Direction::U).unwrap();
        assert_eq!(elevated.degree_u(), 4);
        assert_same_shape(&original, &elevated);
    }

    #[test]
    fn test_deserialize_checks_grid_and_knots() {
        let surface = quarter_cylinder();
        let valid = serde_json::to_value(&surface).unwrap();
        let back: NurbsSurface = serde_json::from_value(valid.clone()).unwrap();
        assert_eq!(back, surface);

        let mut short_grid = valid.clone();
        short_grid["grid"]["rows"] = serde_json::json!(4);
        let err = serde_json::from_value::<NurbsSurface>(short_grid).unwrap_err();
        assert!(err.to_string().contains("do not fill a 4x2 grid"));

        let mut wrong_v = valid.clone();
        wrong_v["knots_v"] = serde_json::json!({ "degree": 1, "knots": [0.0, 0.0, 0.5, 1.0, 1.0] });
        assert!(serde_json::from_value::<NurbsSurface>(wrong_v).is_err());

        let mut zero_weight = valid;
        zero_weight["grid"]["points"][0]["weight"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<NurbsSurface>(zero_weight).is_err());
    }

    #[test]
    fn test_failed_edits_leave_surface_untouched() {
        let mut s = NurbsSurface::with_knots(
            1,
            1,
            vec![
                vec![dvec3(0.0, 0.0, 0.0), dvec3(0.0, 1.0, 0.0)],
                vec![dvec3(1.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0)],
                vec![dvec3(2.0, 0.0, 1.0), dvec3(2.0, 1.0, 1.0)],
            ],
            vec![vec![1.0; 2]; 3],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        let before = s.clone();

        // Unclamped in u
        assert!(matches!(
            s.degree_elevate(Direction::U),
            Err(KernelError::InvalidKnotVector(_))
        ));
        assert!(s.set_weight(0, 0, 0.0).is_err());
        assert!(s.move_point(5, 0, dvec3(0.0, 0.0, 0.0)).is_err());
        assert!(s.insert_knot_refine(Direction::V, 3.0).is_err());
        assert_eq!(s, before);

        s.degree_elevate(Direction::V).unwrap();
        assert_eq!(s.degree_v(), 2);
    }
}
