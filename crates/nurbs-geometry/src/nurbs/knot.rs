//! Knot vectors: construction, validation, span lookup and insertion.

use nurbs_core::{KernelError, Result, Tolerance};
use nurbs_math::Point3;
use serde::{Deserialize, Serialize};

/// How the interior knots of a clamped knot vector are placed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum KnotScheme {
    /// Equally spaced interior knots on `[0, 1]`.
    #[default]
    Uniform,
    /// Interior knots averaged from one parameter per control point.
    ///
    /// The parameters must be non-decreasing and span `[0, 1]`; build them
    /// with [`KnotScheme::chord_length`] or [`KnotScheme::centripetal`].
    Averaged(Vec<f64>),
}

impl KnotScheme {
    /// Parameters proportional to the accumulated length of the control polygon.
    pub fn chord_length(points: &[Point3]) -> Self {
        Self::from_polygon(points, 1.0)
    }

    /// Parameters proportional to the accumulated square root of leg lengths.
    pub fn centripetal(points: &[Point3]) -> Self {
        Self::from_polygon(points, 0.5)
    }

    fn from_polygon(points: &[Point3], exponent: f64) -> Self {
        let legs: Vec<f64> = points
            .windows(2)
            .map(|w| w[0].distance(w[1]).powf(exponent))
            .collect();
        let total: f64 = legs.iter().sum();
        if !(total.is_finite() && total > Tolerance::EPSILON) {
            return Self::Uniform;
        }
        // Coincident points repeat a parameter and stack the averaged knots
        if legs.iter().any(|&leg| leg / total <= Tolerance::DEFAULT_LINEAR) {
            return Self::Uniform;
        }

        let mut params = Vec::with_capacity(points.len());
        params.push(0.0);
        let mut acc = 0.0;
        for leg in &legs {
            acc += leg;
            params.push(acc / total);
        }
        if let Some(last) = params.last_mut() {
            *last = 1.0;
        }
        Self::Averaged(params)
    }
}

/// A non-decreasing knot sequence together with the degree it serves.
///
/// The number of control points it supports is implied by
/// `knots.len() - degree - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKnotVector")]
pub struct KnotVector {
    degree: usize,
    knots: Vec<f64>,
}

#[derive(Deserialize)]
struct RawKnotVector {
    degree: usize,
    knots: Vec<f64>,
}

impl TryFrom<RawKnotVector> for KnotVector {
    type Error = KernelError;

    fn try_from(raw: RawKnotVector) -> Result<Self> {
        let count = raw
            .degree
            .checked_add(1)
            .and_then(|order| raw.knots.len().checked_sub(order))
            .ok_or_else(|| {
                KernelError::InvalidKnotVector(format!(
                    "{} knots cannot carry degree {}",
                    raw.knots.len(),
                    raw.degree
                ))
            })?;
        Self::from_knots(raw.degree, raw.knots, count)
    }
}

impl KnotVector {
    /// Build a clamped knot vector for `control_point_count` control points.
    pub fn create(degree: usize, control_point_count: usize, scheme: &KnotScheme) -> Result<Self> {
        check_degree(degree, control_point_count)?;

        let p = degree;
        let n = control_point_count - 1;
        let m = n + p + 1;
        let mut knots = vec![0.0; m + 1];

        match scheme {
            KnotScheme::Uniform => {
                let interior = (m - 2 * p) as f64;
                for (i, k) in knots.iter_mut().enumerate() {
                    *k = if i <= p {
                        0.0
                    } else if i >= m - p {
                        1.0
                    } else {
                        (i - p) as f64 / interior
                    };
                }
            }
            KnotScheme::Averaged(params) => {
                if params.len() != control_point_count {
                    return Err(KernelError::DimensionMismatch(format!(
                        "{} parameters for {} control points",
                        params.len(),
                        control_point_count
                    )));
                }
                if params.windows(2).any(|w| !(w[0] <= w[1])) {
                    return Err(KernelError::InvalidKnotVector(
                        "scheme parameters must be non-decreasing".into(),
                    ));
                }
                for k in knots.iter_mut().skip(m - p) {
                    *k = 1.0;
                }
                for j in 1..=(n - p) {
                    let sum: f64 = params[j..j + p].iter().sum();
                    knots[j + p] = sum / p as f64;
                }
            }
        }

        let kv = Self { degree, knots };
        kv.validate(control_point_count)?;
        Ok(kv)
    }

    /// Adopt an explicit knot sequence after validating it.
    pub fn from_knots(degree: usize, knots: Vec<f64>, control_point_count: usize) -> Result<Self> {
        check_degree(degree, control_point_count)?;
        let kv = Self { degree, knots };
        kv.validate(control_point_count)?;
        Ok(kv)
    }

    /// Single-span clamped vector on `[0, 1]` (a Bezier segment).
    pub(crate) fn bezier(degree: usize) -> Self {
        let mut knots = vec![0.0; degree + 1];
        knots.extend(std::iter::repeat(1.0).take(degree + 1));
        Self { degree, knots }
    }

    fn validate(&self, control_point_count: usize) -> Result<()> {
        let p = self.degree;
        let expected = control_point_count + p + 1;
        if self.knots.len() != expected {
            return Err(KernelError::InvalidKnotVector(format!(
                "expected {} knots for {} control points of degree {}, got {}",
                expected,
                control_point_count,
                p,
                self.knots.len()
            )));
        }
        if let Some(bad) = self.knots.iter().find(|k| !k.is_finite()) {
            return Err(KernelError::InvalidKnotVector(format!(
                "knot {} is not finite",
                bad
            )));
        }
        if let Some(i) = self.knots.windows(2).position(|w| w[0] > w[1]) {
            return Err(KernelError::InvalidKnotVector(format!(
                "knots decrease at index {}: {} > {}",
                i,
                self.knots[i],
                self.knots[i + 1]
            )));
        }

        let (min, max) = self.domain();
        if !(max > min) {
            return Err(KernelError::InvalidKnotVector(format!(
                "empty parameter domain [{}, {}]",
                min, max
            )));
        }

        for (value, mult) in self.runs() {
            let at_end = value <= min || value >= max;
            let limit = if at_end { p + 1 } else { p };
            if mult > limit {
                return Err(KernelError::InvalidKnotVector(format!(
                    "knot {} has multiplicity {} (limit {})",
                    value, mult, limit
                )));
            }
        }
        Ok(())
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn control_point_count(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Valid parameter range `(knot[degree], knot[n + 1])`.
    pub fn domain(&self) -> (f64, f64) {
        let p = self.degree;
        (self.knots[p], self.knots[self.knots.len() - p - 1])
    }

    /// Check that `t` lies in the domain, snapping values within the
    /// parametric tolerance of an end onto that end.
    pub fn check_parameter(&self, t: f64) -> Result<f64> {
        let (min, max) = self.domain();
        let tol = Tolerance::DEFAULT_PARAMETRIC * (max - min).abs().max(1.0);
        if t.is_nan() || t < min - tol || t > max + tol {
            return Err(KernelError::out_of_domain(t, (min, max)));
        }
        Ok(t.clamp(min, max))
    }

    /// Index `i` with `knot[i] <= t < knot[i + 1]`.
    ///
    /// The upper end of the domain maps to the last non-empty span. The result
    /// always lies in `[degree, control_point_count - 1]`. Parameters outside
    /// the domain are clamped; callers check the domain first.
    pub fn find_span(&self, t: f64) -> usize {
        let p = self.degree;
        let n = self.control_point_count() - 1;
        let knots = &self.knots;

        if t >= knots[n + 1] {
            let mut span = n;
            while span > p && knots[span] >= knots[n + 1] {
                span -= 1;
            }
            return span;
        }

        // Largest i in [p, n] with knots[i] <= t.
        let count = knots[p..=n].partition_point(|&k| k <= t);
        p + count.saturating_sub(1)
    }

    /// Number of times `value` occurs in the knot vector.
    pub fn multiplicity(&self, value: f64) -> usize {
        let tol = Tolerance::default_precision();
        self.knots
            .iter()
            .filter(|&&k| tol.parametric_eq(k, value))
            .count()
    }

    /// Whether both ends repeat `degree + 1` times.
    pub fn is_clamped(&self) -> bool {
        let p = self.degree;
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        self.knots[..=p].iter().all(|&k| k == first)
            && self.knots[self.knots.len() - p - 1..].iter().all(|&k| k == last)
    }

    /// Distinct knot values with their multiplicities, in order.
    pub fn runs(&self) -> Vec<(f64, usize)> {
        let mut runs: Vec<(f64, usize)> = Vec::new();
        for &k in &self.knots {
            match runs.last_mut() {
                Some((value, mult)) if *value == k => *mult += 1,
                _ => runs.push((k, 1)),
            }
        }
        runs
    }

    /// Distinct knot values strictly inside the domain.
    pub fn distinct_interior(&self) -> Vec<f64> {
        let (min, max) = self.domain();
        self.runs()
            .into_iter()
            .map(|(value, _)| value)
            .filter(|&v| v > min && v < max)
            .collect()
    }

    /// Domain breakpoints: the domain ends and every distinct interior knot.
    pub fn breakpoints(&self) -> Vec<f64> {
        let (min, max) = self.domain();
        let mut points = vec![min];
        points.extend(self.distinct_interior());
        points.push(max);
        points
    }

    /// Affinely remap the knots so the domain becomes `[0, 1]`.
    ///
    /// The curve shape is unchanged; only its parametrization is rescaled.
    pub fn normalized(&self) -> Self {
        let (min, max) = self.domain();
        let scale = max - min;
        let knots = self.knots.iter().map(|&k| (k - min) / scale).collect();
        Self {
            degree: self.degree,
            knots,
        }
    }

    /// Insert `value`, keeping the sequence sorted, and return its index.
    ///
    /// The caller is responsible for adding the matching control point; on its
    /// own this leaves a vector for `control_point_count + 1` points.
    pub fn insert_knot(&mut self, value: f64) -> Result<usize> {
        let value = self.check_parameter(value)?;
        let (min, max) = self.domain();
        if value <= min || value >= max {
            return Err(KernelError::InvalidKnotVector(format!(
                "knot {} lies on the domain boundary",
                value
            )));
        }
        // Snap onto an existing knot so near-duplicates do not form tiny spans
        let tol = Tolerance::default_precision();
        let value = self
            .knots
            .iter()
            .copied()
            .find(|&k| tol.parametric_eq(k, value))
            .unwrap_or(value);

        let mult = self.multiplicity(value);
        if mult >= self.degree {
            return Err(KernelError::InvalidKnotVector(format!(
                "knot {} already has multiplicity {}",
                value, mult
            )));
        }

        let index = self.knots.partition_point(|&k| k <= value);
        self.knots.insert(index, value);
        Ok(index)
    }

    /// Knot vector of the same curve after raising the degree by one: every
    /// distinct knot gains one multiplicity.
    pub(crate) fn elevated(&self) -> Self {
        let mut knots = Vec::with_capacity(self.knots.len() + self.runs().len());
        for (value, mult) in self.runs() {
            knots.extend(std::iter::repeat(value).take(mult + 1));
        }
        Self {
            degree: self.degree + 1,
            knots,
        }
    }

    /// Mirror the knots so the parameter runs the other way over the same domain.
    pub(crate) fn reversed(&self) -> Self {
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        let knots = self.knots.iter().rev().map(|&k| first + last - k).collect();
        Self {
            degree: self.degree,
            knots,
        }
    }
}

fn check_degree(degree: usize, control_point_count: usize) -> Result<()> {
    if degree < 1 || degree >= control_point_count {
        return Err(KernelError::InvalidDegree {
            degree,
            control_points: control_point_count,
        });
    }
    Ok(())
}
