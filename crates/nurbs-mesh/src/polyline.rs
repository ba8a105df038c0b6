use nurbs_core::Result;
use nurbs_geometry::Curve;
use nurbs_math::{Aabb3, Point3, Vector3};

/// One curve sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub parameter: f64,
    pub point: Point3,
}

/// Ordered samples of a curve, ready to be drawn as a line strip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point3>,
    pub parameters: Vec<f64>,
    /// Unit tangents, one per point, when requested.
    pub tangents: Option<Vec<Vector3>>,
}

impl FromIterator<CurveSample> for Polyline {
    fn from_iter<I: IntoIterator<Item = CurveSample>>(iter: I) -> Self {
        let (parameters, points) = iter.into_iter().map(|s| (s.parameter, s.point)).unzip();
        Self {
            points,
            parameters,
            tangents: None,
        }
    }
}

impl Polyline {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn samples(&self) -> impl Iterator<Item = CurveSample> + '_ {
        self.parameters
            .iter()
            .zip(&self.points)
            .map(|(&parameter, &point)| CurveSample { parameter, point })
    }

    /// Sum of the segment lengths.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    pub fn bounding_box(&self) -> Option<Aabb3> {
        Aabb3::from_points(self.points.iter().copied())
    }

    /// Attach the curve's unit tangents at every sample parameter.
    ///
    /// Where the derivative vanishes the tangent is the direction of the
    /// adjacent segment.
    pub fn with_tangents<C: Curve + ?Sized>(mut self, curve: &C) -> Result<Self> {
        let mut tangents = Vec::with_capacity(self.points.len());
        for (i, &t) in self.parameters.iter().enumerate() {
            let d = curve.tangent_at(t)?;
            let tangent = d.try_normalize().unwrap_or_else(|| self.segment_direction(i));
            tangents.push(tangent);
        }
        self.tangents = Some(tangents);
        Ok(self)
    }

    fn segment_direction(&self, i: usize) -> Vector3 {
        let n = self.points.len();
        if n < 2 {
            return Vector3::ZERO;
        }
        let (a, b) = if i + 1 < n { (i, i + 1) } else { (i - 1, i) };
        (self.points[b] - self.points[a]).normalize_or_zero()
    }

    /// Largest distance between the curve and the polyline, sampled at the
    /// quarter points of every segment's parameter interval.
    pub fn max_chordal_deviation<C: Curve + ?Sized>(&self, curve: &C) -> Result<f64> {
        let mut max = 0.0_f64;
        for i in 0..self.segment_count() {
            let d = interval_deviation(
                curve,
                (self.parameters[i], self.points[i]),
                (self.parameters[i + 1], self.points[i + 1]),
            )?;
            max = max.max(d);
        }
        Ok(max)
    }
}

/// Check positions inside an interval, as fractions of its length.
pub(crate) const CHECK_FRACTIONS: [f64; 3] = [0.25, 0.5, 0.75];

/// Max distance from the curve samples on `[t0, t1]` to the chord between the
/// two end samples.
pub(crate) fn interval_deviation<C: Curve + ?Sized>(
    curve: &C,
    (t0, p0): (f64, Point3),
    (t1, p1): (f64, Point3),
) -> Result<f64> {
    let mut max = 0.0_f64;
    for f in CHECK_FRACTIONS {
        let p = curve.point_at(t0 + (t1 - t0) * f)?;
        max = max.max(distance_to_segment(p, p0, p1));
    }
    Ok(max)
}

pub(crate) fn distance_to_segment(p: Point3, a: Point3, b: Point3) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let s = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * s)
}
