//! Homogeneous (weighted) coordinates for rational geometry.
//!
//! A control point `P` with weight `w` is lifted to `(w*P, w)`. Knot
//! insertion and degree elevation are linear in this space, which is why
//! refinement works on `HPoint`s and projects back afterwards.

use glam::DVec4;

use crate::Point3;

/// Weighted point `(w*x, w*y, w*z, w)`.
pub type HPoint = DVec4;

pub fn to_homogeneous(point: Point3, weight: f64) -> HPoint {
    (point * weight).extend(weight)
}

/// Project a homogeneous point back to 3D.
///
/// Returns `None` when the weight vanishes.
pub fn from_homogeneous(h: HPoint) -> Option<(Point3, f64)> {
    let w = h.w;
    if w.abs() < nurbs_core::Tolerance::EPSILON {
        return None;
    }
    Some((h.truncate() / w, w))
}
