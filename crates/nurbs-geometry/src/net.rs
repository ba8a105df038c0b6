//! Control points and the nets that own them.
//!
//! Nets validate every edit and bump their [`Generation`] on success, so
//! anything derived from them can tell when it has gone stale.

use std::fmt;

use nurbs_core::traits::{BoundingBox, Versioned};
use nurbs_core::{Generation, KernelError, Result, Tolerance};
use nurbs_math::{from_homogeneous, to_homogeneous, Aabb3, HPoint, Point3};
use serde::{Deserialize, Serialize};

/// A control point with its rational weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawControlPoint")]
pub struct ControlPoint {
    pub position: Point3,
    pub weight: f64,
}

#[derive(Deserialize)]
struct RawControlPoint {
    position: Point3,
    weight: f64,
}

impl TryFrom<RawControlPoint> for ControlPoint {
    type Error = KernelError;

    fn try_from(raw: RawControlPoint) -> Result<Self> {
        Self::new(raw.position, raw.weight)
    }
}

impl ControlPoint {
    pub fn new(position: Point3, weight: f64) -> Result<Self> {
        check_weight(weight)?;
        check_position(position)?;
        Ok(Self { position, weight })
    }

    /// Unit-weight control point.
    pub fn unweighted(position: Point3) -> Self {
        Self {
            position,
            weight: 1.0,
        }
    }

    pub fn homogeneous(&self) -> HPoint {
        to_homogeneous(self.position, self.weight)
    }

    pub fn from_homogeneous(h: HPoint) -> Result<Self> {
        let (position, weight) = from_homogeneous(h).ok_or_else(|| {
            KernelError::DegenerateGeometry("control point with vanishing weight".into())
        })?;
        Self::new(position, weight)
    }
}

impl fmt::Display for ControlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.3}, w={:.3})",
            self.position.x, self.position.y, self.position.z, self.weight
        )
    }
}

fn check_weight(weight: f64) -> Result<()> {
    if !(weight.is_finite() && weight > 0.0) {
        return Err(KernelError::InvalidWeight(weight));
    }
    Ok(())
}

fn check_position(position: Point3) -> Result<()> {
    if !position.is_finite() {
        return Err(KernelError::DegenerateGeometry(format!(
            "non-finite control point position {:?}",
            position
        )));
    }
    Ok(())
}

/// True when some weight differs from the first one.
fn has_varying_weights(points: &[ControlPoint]) -> bool {
    match points.split_first() {
        Some((first, rest)) => rest
            .iter()
            .any(|cp| (cp.weight - first.weight).abs() > Tolerance::DEFAULT_PARAMETRIC * first.weight),
        None => false,
    }
}

fn all_coincident(points: &[ControlPoint], tol: Tolerance) -> bool {
    Aabb3::from_points(points.iter().map(|cp| cp.position))
        .map(|bb| tol.is_zero(bb.diagonal()))
        .unwrap_or(true)
}

/// Ordered control polygon of a curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawControlNet")]
pub struct ControlNet {
    points: Vec<ControlPoint>,
    #[serde(skip)]
    generation: Generation,
}

#[derive(Deserialize)]
struct RawControlNet {
    points: Vec<ControlPoint>,
}

impl TryFrom<RawControlNet> for ControlNet {
    type Error = KernelError;

    fn try_from(raw: RawControlNet) -> Result<Self> {
        if raw.points.is_empty() {
            return Err(KernelError::DimensionMismatch("empty control net".into()));
        }
        Ok(Self::from_points(raw.points))
    }
}

impl ControlNet {
    pub fn new(positions: Vec<Point3>, weights: Vec<f64>) -> Result<Self> {
        if positions.len() != weights.len() {
            return Err(KernelError::DimensionMismatch(format!(
                "{} control points but {} weights",
                positions.len(),
                weights.len()
            )));
        }
        let points = positions
            .into_iter()
            .zip(weights)
            .map(|(p, w)| ControlPoint::new(p, w))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_points(points))
    }

    pub(crate) fn from_points(points: Vec<ControlPoint>) -> Self {
        Self {
            points,
            generation: Generation::INITIAL,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Result<&ControlPoint> {
        self.points.get(index).ok_or(KernelError::IndexOutOfRange {
            index,
            len: self.points.len(),
        })
    }

    pub fn positions(&self) -> impl Iterator<Item = Point3> + '_ {
        self.points.iter().map(|cp| cp.position)
    }

    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|cp| cp.weight)
    }

    /// Weighted points `(w*P, w)` in order.
    pub fn homogeneous(&self) -> Vec<HPoint> {
        self.points.iter().map(ControlPoint::homogeneous).collect()
    }

    /// Move one control point. O(1); marks dependent tessellations dirty.
    pub fn move_point(&mut self, index: usize, position: Point3) -> Result<()> {
        check_position(position)?;
        let len = self.points.len();
        let cp = self
            .points
            .get_mut(index)
            .ok_or(KernelError::IndexOutOfRange { index, len })?;
        cp.position = position;
        self.generation.bump();
        Ok(())
    }

    /// Change one weight; rejects zero, negative and non-finite values.
    pub fn set_weight(&mut self, index: usize, weight: f64) -> Result<()> {
        check_weight(weight)?;
        let len = self.points.len();
        let cp = self
            .points
            .get_mut(index)
            .ok_or(KernelError::IndexOutOfRange { index, len })?;
        cp.weight = weight;
        self.generation.bump();
        Ok(())
    }

    /// Swap in a whole new polygon (refinement results).
    pub(crate) fn replace(&mut self, points: Vec<ControlPoint>) {
        self.points = points;
        self.generation.bump();
    }

    /// Record a change made to data that lives next to the net (the knots).
    pub(crate) fn mark_dirty(&mut self) {
        self.generation.bump();
    }

    /// Whether every control point coincides within `tol`.
    pub fn is_degenerate(&self, tol: Tolerance) -> bool {
        all_coincident(&self.points, tol)
    }

    /// Whether the weights differ, so the geometry is genuinely rational.
    pub fn is_rational(&self) -> bool {
        has_varying_weights(&self.points)
    }
}

impl Versioned for ControlNet {
    fn generation(&self) -> Generation {
        self.generation
    }
}

impl BoundingBox for ControlNet {
    type Point = Point3;

    fn bounding_box(&self) -> (Point3, Point3) {
        let bb = Aabb3::from_points(self.positions())
            .unwrap_or(Aabb3::new(Point3::ZERO, Point3::ZERO));
        (bb.min, bb.max)
    }
}

/// Row-major grid of control points for a surface.
///
/// Row index `i` runs along u, column index `j` along v.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawControlGrid")]
pub struct ControlGrid {
    rows: usize,
    cols: usize,
    points: Vec<ControlPoint>,
    #[serde(skip)]
    generation: Generation,
}

#[derive(Deserialize)]
struct RawControlGrid {
    rows: usize,
    cols: usize,
    points: Vec<ControlPoint>,
}

impl TryFrom<RawControlGrid> for ControlGrid {
    type Error = KernelError;

    fn try_from(raw: RawControlGrid) -> Result<Self> {
        let RawControlGrid { rows, cols, points } = raw;
        if rows == 0 || cols == 0 || rows.checked_mul(cols) != Some(points.len()) {
            return Err(KernelError::DimensionMismatch(format!(
                "{} control points do not fill a {}x{} grid",
                points.len(),
                rows,
                cols
            )));
        }
        Ok(Self::from_points(rows, cols, points))
    }
}

impl ControlGrid {
    pub fn new(positions: Vec<Vec<Point3>>, weights: Vec<Vec<f64>>) -> Result<Self> {
        let rows = positions.len();
        let cols = positions.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(KernelError::DimensionMismatch("empty control grid".into()));
        }
        if weights.len() != rows {
            return Err(KernelError::DimensionMismatch(format!(
                "{} rows of control points but {} rows of weights",
                rows,
                weights.len()
            )));
        }

        let mut points = Vec::with_capacity(rows * cols);
        for (i, (row, wrow)) in positions.into_iter().zip(weights).enumerate() {
            if row.len() != cols || wrow.len() != cols {
                return Err(KernelError::DimensionMismatch(format!(
                    "row {} has {} points and {} weights, expected {}",
                    i,
                    row.len(),
                    wrow.len(),
                    cols
                )));
            }
            for (p, w) in row.into_iter().zip(wrow) {
                points.push(ControlPoint::new(p, w)?);
            }
        }
        Ok(Self::from_points(rows, cols, points))
    }

    pub(crate) fn from_points(rows: usize, cols: usize, points: Vec<ControlPoint>) -> Self {
        debug_assert_eq!(points.len(), rows * cols);
        Self {
            rows,
            cols,
            points,
            generation: Generation::INITIAL,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    fn index(&self, i: usize, j: usize) -> Result<usize> {
        if i >= self.rows {
            return Err(KernelError::IndexOutOfRange {
                index: i,
                len: self.rows,
            });
        }
        if j >= self.cols {
            return Err(KernelError::IndexOutOfRange {
                index: j,
                len: self.cols,
            });
        }
        Ok(i * self.cols + j)
    }

    pub fn get(&self, i: usize, j: usize) -> Result<&ControlPoint> {
        let idx = self.index(i, j)?;
        Ok(&self.points[idx])
    }

    pub fn row(&self, i: usize) -> Result<&[ControlPoint]> {
        if i >= self.rows {
            return Err(KernelError::IndexOutOfRange {
                index: i,
                len: self.rows,
            });
        }
        Ok(&self.points[i * self.cols..(i + 1) * self.cols])
    }

    pub fn column(&self, j: usize) -> Result<Vec<ControlPoint>> {
        if j >= self.cols {
            return Err(KernelError::IndexOutOfRange {
                index: j,
                len: self.cols,
            });
        }
        Ok(self.points.iter().skip(j).step_by(self.cols).copied().collect())
    }

    /// Weighted points in row-major order.
    pub fn homogeneous(&self) -> Vec<HPoint> {
        self.points.iter().map(ControlPoint::homogeneous).collect()
    }

    pub fn move_point(&mut self, i: usize, j: usize, position: Point3) -> Result<()> {
        check_position(position)?;
        let idx = self.index(i, j)?;
        self.points[idx].position = position;
        self.generation.bump();
        Ok(())
    }

    pub fn set_weight(&mut self, i: usize, j: usize, weight: f64) -> Result<()> {
        check_weight(weight)?;
        let idx = self.index(i, j)?;
        self.points[idx].weight = weight;
        self.generation.bump();
        Ok(())
    }

    pub(crate) fn replace(&mut self, rows: usize, cols: usize, points: Vec<ControlPoint>) {
        debug_assert_eq!(points.len(), rows * cols);
        self.rows = rows;
        self.cols = cols;
        self.points = points;
        self.generation.bump();
    }

    pub fn is_degenerate(&self, tol: Tolerance) -> bool {
        all_coincident(&self.points, tol)
    }

    pub fn is_rational(&self) -> bool {
        has_varying_weights(&self.points)
    }
}

impl Versioned for ControlGrid {
    fn generation(&self) -> Generation {
        self.generation
    }
}

impl BoundingBox for ControlGrid {
    type Point = Point3;

    fn bounding_box(&self) -> (Point3, Point3) {
        let bb = Aabb3::from_points(self.points.iter().map(|cp| cp.position))
            .unwrap_or(Aabb3::new(Point3::ZERO, Point3::ZERO));
        (bb.min, bb.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nurbs_math::dvec3;

    fn square_net() -> ControlNet {
        ControlNet::new(
            vec![
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(1.0, 1.0, 0.0),
                dvec3(0.0, 1.0, 0.0),
            ],
            vec![1.0; 4],
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(matches!(
            ControlNet::new(vec![dvec3(0.0, 0.0, 0.0)], vec![1.0, 2.0]),
            Err(KernelError::DimensionMismatch(_))
        ));
        assert!(matches!(
            ControlNet::new(vec![dvec3(0.0, 0.0, 0.0)], vec![0.0]),
            Err(KernelError::InvalidWeight(_))
        ));
        assert!(matches!(
            ControlNet::new(vec![dvec3(f64::NAN, 0.0, 0.0)], vec![1.0]),
            Err(KernelError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_move_point_bumps_generation() {
        let mut net = square_net();
        let g0 = net.generation();
        net.move_point(2, dvec3(2.0, 2.0, 0.0)).unwrap();
        assert_eq!(net.get(2).unwrap().position, dvec3(2.0, 2.0, 0.0));
        assert!(net.generation() > g0);

        let g1 = net.generation();
        assert!(matches!(
            net.move_point(9, dvec3(0.0, 0.0, 0.0)),
            Err(KernelError::IndexOutOfRange { index: 9, len: 4 })
        ));
        assert_eq!(net.generation(), g1);
    }

    #[test]
    fn test_set_weight_rejects_non_positive() {
        let mut net = square_net();
        let before = net.clone();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                net.set_weight(1, bad),
                Err(KernelError::InvalidWeight(_))
            ));
        }
        assert_eq!(net, before);

        net.set_weight(1, 2.5).unwrap();
        assert_eq!(net.get(1).unwrap().weight, 2.5);
        assert_eq!(net.homogeneous()[1], HPoint::new(2.5, 0.0, 0.0, 2.5));
    }

    #[test]
    fn test_degenerate_and_bounds() {
        let net = square_net();
        assert!(!net.is_degenerate(Tolerance::default()));
        assert_eq!(net.bounding_box(), (dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0)));

        let collapsed = ControlNet::new(vec![dvec3(1.0, 2.0, 3.0); 3], vec![1.0; 3]).unwrap();
        assert!(collapsed.is_degenerate(Tolerance::default()));
    }

    #[test]
    fn test_display() {
        let cp = ControlPoint::new(dvec3(1.0, 0.5, 0.0), 0.7071).unwrap();
        assert_eq!(cp.to_string(), "(1.000, 0.500, 0.000, w=0.707)");
    }

    #[test]
    fn test_homogeneous_round_trip_rejects_zero_weight() {
        let cp = ControlPoint::new(dvec3(1.0, 2.0, 3.0), 0.5).unwrap();
        assert_eq!(ControlPoint::from_homogeneous(cp.homogeneous()).unwrap(), cp);
        assert!(ControlPoint::from_homogeneous(HPoint::new(1.0, 1.0, 1.0, 0.0)).is_err());
    }

    fn grid_3x2() -> ControlGrid {
        ControlGrid::new(
            vec![
                vec![dvec3(0.0, 0.0, 0.0), dvec3(0.0, 1.0, 0.0)],
                vec![dvec3(1.0, 0.0, 1.0), dvec3(1.0, 1.0, 1.0)],
                vec![dvec3(2.0, 0.0, 0.0), dvec3(2.0, 1.0, 0.0)],
            ],
            vec![vec![1.0; 2]; 3],
        )
        .unwrap()
    }

    #[test]
    fn test_grid_accessors() {
        let grid = grid_3x2();
        assert_eq!((grid.rows(), grid.cols()), (3, 2));
        assert_eq!(grid.row(1).unwrap()[1].position, dvec3(1.0, 1.0, 1.0));
        let col = grid.column(0).unwrap();
        assert_eq!(col.len(), 3);
        assert_eq!(col[2].position, dvec3(2.0, 0.0, 0.0));
        assert_eq!(grid.get(2, 1).unwrap().position, dvec3(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_grid_bounds_fail_fast() {
        let mut grid = grid_3x2();
        assert!(matches!(grid.row(3), Err(KernelError::IndexOutOfRange { .. })));
        assert!(matches!(grid.column(2), Err(KernelError::IndexOutOfRange { .. })));
        assert!(grid.get(0, 5).is_err());
        assert!(grid.move_point(3, 0, dvec3(0.0, 0.0, 0.0)).is_err());
        assert!(matches!(
            grid.set_weight(0, 0, -2.0),
            Err(KernelError::InvalidWeight(_))
        ));
        assert_eq!(grid.generation(), Generation::INITIAL);
    }

    #[test]
    fn test_grid_rejects_ragged_rows() {
        let result = ControlGrid::new(
            vec![vec![dvec3(0.0, 0.0, 0.0); 2], vec![dvec3(1.0, 0.0, 0.0); 3]],
            vec![vec![1.0; 2], vec![1.0; 3]],
        );
        assert!(matches!(result, Err(KernelError::DimensionMismatch(_))));
    }
}
