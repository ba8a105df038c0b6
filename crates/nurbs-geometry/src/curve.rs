//! NURBS curves.

use log::debug;
use nurbs_core::traits::{BoundingBox, Validate, Versioned};
use nurbs_core::{Generation, KernelError, Result, Tolerance};
use nurbs_math::{from_homogeneous, HPoint, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::net::{ControlNet, ControlPoint};
use crate::nurbs::deboor::{self, rational_curve_derivatives, MAX_DERIVATIVE_ORDER};
use crate::nurbs::refine;
use crate::nurbs::{KnotScheme, KnotVector};

/// Trait for parametric curves in 3D space.
pub trait Curve: Send + Sync {
    /// Evaluate the curve at parameter `t`.
    fn point_at(&self, t: f64) -> Result<Point3>;

    /// Evaluate the tangent vector at parameter `t`.
    fn tangent_at(&self, t: f64) -> Result<Vector3>;

    /// Return the parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// Parameters where the curve may lose smoothness; always includes the
    /// domain ends. Samplers never step across one without sampling it.
    fn breakpoints(&self) -> Vec<f64> {
        let (t0, t1) = self.domain();
        vec![t0, t1]
    }

    /// Whether the curve is closed (start == end).
    fn is_closed(&self) -> bool {
        false
    }
}

/// A NURBS (Non-Uniform Rational B-Spline) curve.
///
/// Owns its knot vector and control polygon; all edits go through methods that
/// validate first and commit only on success.
///
/// Deserialized curves are checked for a consistent degree and knot count; a
/// collapsed polygon is accepted since edits can produce one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNurbsCurve")]
pub struct NurbsCurve {
    knots: KnotVector,
    net: ControlNet,
}

#[derive(Deserialize)]
struct RawNurbsCurve {
    knots: KnotVector,
    net: ControlNet,
}

impl TryFrom<RawNurbsCurve> for NurbsCurve {
    type Error = KernelError;

    fn try_from(raw: RawNurbsCurve) -> Result<Self> {
        let curve = Self {
            knots: raw.knots,
            net: raw.net,
        };
        curve.check_structure()?;
        Ok(curve)
    }
}

impl NurbsCurve {
    /// Create a curve with a clamped knot vector built from `scheme`.
    pub fn new(
        degree: usize,
        control_points: Vec<Point3>,
        weights: Vec<f64>,
        scheme: &KnotScheme,
    ) -> Result<Self> {
        let net = ControlNet::new(control_points, weights)?;
        let knots = KnotVector::create(degree, net.len(), scheme)?;
        Self::from_parts(knots, net)
    }

    /// Create a curve from an explicit knot sequence.
    pub fn with_knots(
        degree: usize,
        control_points: Vec<Point3>,
        weights: Vec<f64>,
        knots: Vec<f64>,
    ) -> Result<Self> {
        let net = ControlNet::new(control_points, weights)?;
        let knots = KnotVector::from_knots(degree, knots, net.len())?;
        Self::from_parts(knots, net)
    }

    /// Non-rational B-spline: every weight is one.
    pub fn polynomial(degree: usize, control_points: Vec<Point3>, scheme: &KnotScheme) -> Result<Self> {
        let weights = vec![1.0; control_points.len()];
        Self::new(degree, control_points, weights, scheme)
    }

    /// Exact quarter of the unit circle in the XY plane, from (1,0) to (0,1).
    pub fn quarter_circle() -> Self {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let points = vec![
            ControlPoint::unweighted(Point3::new(1.0, 0.0, 0.0)),
            ControlPoint {
                position: Point3::new(1.0, 1.0, 0.0),
                weight: w,
            },
            ControlPoint::unweighted(Point3::new(0.0, 1.0, 0.0)),
        ];
        Self {
            knots: KnotVector::bezier(2),
            net: ControlNet::from_points(points),
        }
    }

    fn from_parts(knots: KnotVector, net: ControlNet) -> Result<Self> {
        let curve = Self { knots, net };
        curve.validate()?;
        Ok(curve)
    }

    pub fn degree(&self) -> usize {
        self.knots.degree()
    }

    pub fn knots(&self) -> &KnotVector {
        &self.knots
    }

    pub fn control_net(&self) -> &ControlNet {
        &self.net
    }

    pub fn control_point_count(&self) -> usize {
        self.net.len()
    }

    pub fn domain(&self) -> (f64, f64) {
        self.knots.domain()
    }

    /// Evaluate the curve point at `t`.
    pub fn evaluate(&self, t: f64) -> Result<Point3> {
        let t = self.knots.check_parameter(t)?;
        let h = deboor::curve_point(&self.knots, &self.net.homogeneous(), t);
        project(h, t)
    }

    /// Evaluate with the de Boor triangle instead of the basis sum.
    ///
    /// Slower, but an independent algorithm; useful to cross-check results.
    pub fn evaluate_de_boor(&self, t: f64) -> Result<Point3> {
        let t = self.knots.check_parameter(t)?;
        let h = deboor::de_boor(&self.knots, &self.net.homogeneous(), t);
        project(h, t)
    }

    /// All derivatives `C(0)..=C(order)` at `t`, via the rational quotient rule.
    ///
    /// Orders above [`MAX_DERIVATIVE_ORDER`] are refused.
    pub fn derivatives(&self, t: f64, order: usize) -> Result<Vec<Vector3>> {
        let t = self.knots.check_parameter(t)?;
        if order > MAX_DERIVATIVE_ORDER {
            return Err(KernelError::DimensionMismatch(format!(
                "derivative order {} exceeds {}",
                order, MAX_DERIVATIVE_ORDER
            )));
        }
        let hders = deboor::curve_derivatives(&self.knots, &self.net.homogeneous(), t, order);
        let ders = rational_curve_derivatives(&hders, order).ok_or_else(|| {
            KernelError::DegenerateGeometry(format!("weight function vanishes at t={}", t))
        })?;
        if ders.iter().any(|d| !d.is_finite()) {
            return Err(KernelError::DegenerateGeometry(format!(
                "non-finite derivative at t={}",
                t
            )));
        }
        Ok(ders)
    }

    /// The `order`-th derivative at `t`; order 0 is the point itself.
    ///
    /// Derivatives of a non-rational curve above its degree are zero for any
    /// order. Rational curves are limited to [`MAX_DERIVATIVE_ORDER`].
    pub fn evaluate_derivative(&self, t: f64, order: usize) -> Result<Vector3> {
        if order > self.degree() && !self.net.is_rational() {
            self.knots.check_parameter(t)?;
            return Ok(Vector3::ZERO);
        }
        let ders = self.derivatives(t, order)?;
        Ok(ders[order])
    }

    /// Unit tangent at `t`.
    pub fn tangent(&self, t: f64) -> Result<Vector3> {
        let d = self.evaluate_derivative(t, 1)?;
        d.try_normalize().ok_or_else(|| {
            KernelError::DegenerateGeometry(format!("zero-length tangent at t={}", t))
        })
    }

    /// Curvature `|C' x C''| / |C'|^3` at `t`.
    pub fn curvature(&self, t: f64) -> Result<f64> {
        let ders = self.derivatives(t, 2)?;
        let speed = ders[1].length();
        if speed < Tolerance::EPSILON {
            return Err(KernelError::DegenerateGeometry(format!(
                "zero-length tangent at t={}",
                t
            )));
        }
        Ok(ders[1].cross(ders[2]).length() / speed.powi(3))
    }

    /// Move control point `index`.
    ///
    /// O(1). A move that collapses the polygon is allowed; tangents and
    /// normals then report `DegenerateGeometry`.
    pub fn move_point(&mut self, index: usize, position: Point3) -> Result<()> {
        self.net.move_point(index, position)?;
        debug!("curve: moved control point {} to {:?}", index, position);
        Ok(())
    }

    /// Change the weight of control point `index`.
    pub fn set_weight(&mut self, index: usize, weight: f64) -> Result<()> {
        self.net.set_weight(index, weight)?;
        debug!("curve: weight of control point {} set to {}", index, weight);
        Ok(())
    }

    /// Insert `value` into the knot vector without changing the shape.
    ///
    /// Returns the index of the new knot.
    pub fn insert_knot_refine(&mut self, value: f64) -> Result<usize> {
        let (knots, points, index) = refine::insert_knot(&self.knots, &self.net.homogeneous(), value)?;
        self.commit(knots, points)?;
        debug!("curve: inserted knot {} at index {}", value, index);
        Ok(index)
    }

    /// Insert `value` `times` times. Either every insertion succeeds or none does.
    pub fn insert_knot_refine_times(&mut self, value: f64, times: usize) -> Result<()> {
        self.refine_knots(&vec![value; times])
    }

    /// Insert several knots at once.
    pub fn refine_knots(&mut self, values: &[f64]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let (knots, points) = refine::refine_knots(&self.knots, &self.net.homogeneous(), values)?;
        self.commit(knots, points)?;
        debug!("curve: refined with {} knots", values.len());
        Ok(())
    }

    /// Raise the degree by one without changing the shape.
    pub fn degree_elevate(&mut self) -> Result<()> {
        let (knots, points) = refine::elevate_degree(&self.knots, &self.net.homogeneous())?;
        self.commit(knots, points)?;
        debug!("curve: degree elevated to {}", self.degree());
        Ok(())
    }

    /// Change the degree and regenerate a uniform clamped knot vector.
    ///
    /// Unlike [`degree_elevate`](Self::degree_elevate) this keeps the control
    /// points and therefore changes the shape.
    pub fn set_degree(&mut self, degree: usize) -> Result<()> {
        let knots = KnotVector::create(degree, self.net.len(), &KnotScheme::Uniform)?;
        self.knots = knots;
        self.net.mark_dirty();
        debug!("curve: degree set to {}", degree);
        Ok(())
    }

    /// Replace the knot vector, keeping degree and control points.
    pub fn set_knots(&mut self, knots: Vec<f64>) -> Result<()> {
        let knots = KnotVector::from_knots(self.degree(), knots, self.net.len())?;
        self.knots = knots;
        self.net.mark_dirty();
        debug!("curve: knot vector replaced");
        Ok(())
    }

    /// Reverse the parameter direction; the point set is unchanged.
    pub fn reverse(&mut self) {
        let mut points = self.net.points().to_vec();
        points.reverse();
        self.knots = self.knots.reversed();
        self.net.replace(points);
    }

    fn commit(&mut self, knots: KnotVector, homogeneous: Vec<HPoint>) -> Result<()> {
        let points = homogeneous
            .into_iter()
            .map(ControlPoint::from_homogeneous)
            .collect::<Result<Vec<_>>>()?;
        if knots.control_point_count() != points.len() {
            return Err(KernelError::DimensionMismatch(format!(
                "refinement produced {} points for {} expected",
                points.len(),
                knots.control_point_count()
            )));
        }
        self.knots = knots;
        self.net.replace(points);
        Ok(())
    }
}

fn project(h: HPoint, t: f64) -> Result<Point3> {
    match from_homogeneous(h) {
        Some((p, _)) if p.is_finite() => Ok(p),
        _ => Err(KernelError::DegenerateGeometry(format!(
            "curve evaluation is undefined at t={}",
            t
        ))),
    }
}

impl NurbsCurve {
    /// Degree and knot count agree with the control polygon.
    fn check_structure(&self) -> Result<()> {
        let degree = self.degree();
        let count = self.net.len();
        if degree < 1 || degree >= count {
            return Err(KernelError::InvalidDegree {
                degree,
                control_points: count,
            });
        }
        if self.knots.control_point_count() != count {
            return Err(KernelError::DimensionMismatch(format!(
                "{} knots for {} control points of degree {}",
                self.knots.len(),
                count,
                degree
            )));
        }
        Ok(())
    }
}

impl Validate for NurbsCurve {
    fn validate(&self) -> Result<()> {
        self.check_structure()?;
        if self.net.is_degenerate(Tolerance::default()) {
            return Err(KernelError::DegenerateGeometry(
                "all control points coincide".into(),
            ));
        }
        Ok(())
    }
}

impl Versioned for NurbsCurve {
    fn generation(&self) -> Generation {
        self.net.generation()
    }
}

impl BoundingBox for NurbsCurve {
    type Point = Point3;

    /// Bounds of the control polygon, which contain the curve.
    fn bounding_box(&self) -> (Point3, Point3) {
        self.net.bounding_box()
    }
}

impl Curve for NurbsCurve {
    fn point_at(&self, t: f64) -> Result<Point3> {
        self.evaluate(t)
    }

    fn tangent_at(&self, t: f64) -> Result<Vector3> {
        self.evaluate_derivative(t, 1)
    }

    fn domain(&self) -> (f64, f64) {
        self.knots.domain()
    }

    fn breakpoints(&self) -> Vec<f64> {
        self.knots.breakpoints()
    }

    fn is_closed(&self) -> bool {
        let pts = self.net.points();
        self.knots.is_clamped()
            && pts.len() > 1
            && Tolerance::default()
                .is_zero(pts[0].position.distance(pts[pts.len() - 1].position))
    }
}
