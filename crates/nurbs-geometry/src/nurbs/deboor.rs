//! De Boor evaluation of B-spline and NURBS geometry in homogeneous space.
//!
//! Rational curves and surfaces are evaluated as polynomial B-splines over
//! weighted control points `(w*P, w)`; the quotient rule then projects the
//! homogeneous derivatives back to 3D.

use nurbs_core::{guarded_div, Tolerance};
use nurbs_math::{binomial, HPoint, Vector3};

use super::basis::{basis_function_derivatives, basis_functions};
use super::knot::KnotVector;

/// Evaluate a homogeneous B-spline curve point at `t` by weighted basis sum.
pub fn curve_point(kv: &KnotVector, control_points: &[HPoint], t: f64) -> HPoint {
    let p = kv.degree();
    let span = kv.find_span(t);
    let basis = basis_functions(span, t, p, kv.knots());

    basis
        .iter()
        .enumerate()
        .fold(HPoint::ZERO, |acc, (i, &b)| acc + b * control_points[span - p + i])
}

/// Highest derivative order the rational quotient rule is evaluated to.
///
/// Homogeneous derivatives vanish above the degree but rational ones do
/// not, so rational results beyond this order are refused by callers.
pub const MAX_DERIVATIVE_ORDER: usize = 32;

/// Homogeneous curve derivatives `A(k)` for `k = 0..=min(order, degree)`.
pub fn curve_derivatives(
    kv: &KnotVector,
    control_points: &[HPoint],
    t: f64,
    order: usize,
) -> Vec<HPoint> {
    let p = kv.degree();
    let span = kv.find_span(t);
    let ders = basis_function_derivatives(span, t, p, kv.knots(), order);

    ders.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold(HPoint::ZERO, |acc, (j, &d)| acc + d * control_points[span - p + j])
        })
        .collect()
}

/// Apply the rational quotient rule to homogeneous curve derivatives,
/// producing `C(0)..=C(order)`.
///
/// `C(k) = (A(k) - sum_{i=1..k} C(k,i) w(i) C(k-i)) / w(0)`
///
/// Entries missing from `homogeneous` are taken as zero. Returns `None`
/// when the weight function vanishes.
pub fn rational_curve_derivatives(homogeneous: &[HPoint], order: usize) -> Option<Vec<Vector3>> {
    let w0 = homogeneous.first()?.w;
    if w0.abs() < Tolerance::EPSILON {
        return None;
    }
    let a = |k: usize| homogeneous.get(k).copied().unwrap_or(HPoint::ZERO);

    let mut ck: Vec<Vector3> = Vec::with_capacity(order.saturating_add(1));
    for k in 0..=order {
        let mut v = a(k).truncate();
        for i in 1..=k {
            v -= binomial(k, i) * a(i).w * ck[k - i];
        }
        ck.push(v / w0);
    }
    Some(ck)
}

/// Homogeneous surface derivatives `A[k][l]` for `k <= min(order_u, p)` and
/// `l <= min(order_v, q)`.
///
/// `control_points` is row-major with `kv_v.control_point_count()` columns;
/// rows run along u.
pub fn surface_derivatives(
    kv_u: &KnotVector,
    kv_v: &KnotVector,
    control_points: &[HPoint],
    u: f64,
    v: f64,
    order_u: usize,
    order_v: usize,
) -> Vec<Vec<HPoint>> {
    let (p, q) = (kv_u.degree(), kv_v.degree());
    let cols = kv_v.control_point_count();

    let span_u = kv_u.find_span(u);
    let span_v = kv_v.find_span(v);
    let ders_u = basis_function_derivatives(span_u, u, p, kv_u.knots(), order_u);
    let ders_v = basis_function_derivatives(span_v, v, q, kv_v.knots(), order_v);

    let mut skl = vec![vec![HPoint::ZERO; ders_v.len()]; ders_u.len()];
    for (k, row_u) in ders_u.iter().enumerate() {
        // Contract the u-direction first, one temporary per v index
        let temp: Vec<HPoint> = (0..=q)
            .map(|s| {
                let col = span_v - q + s;
                row_u.iter().enumerate().fold(HPoint::ZERO, |acc, (r, &nu)| {
                    acc + nu * control_points[(span_u - p + r) * cols + col]
                })
            })
            .collect();

        for (l, row_v) in ders_v.iter().enumerate() {
            skl[k][l] = row_v
                .iter()
                .zip(&temp)
                .fold(HPoint::ZERO, |acc, (&nv, &t)| acc + nv * t);
        }
    }
    skl
}

/// Apply the two-variable rational quotient rule to homogeneous surface
/// derivatives, producing `S[k][l]` for `k <= order_u`, `l <= order_v`.
///
/// Entries missing from `homogeneous` are taken as zero. Returns `None`
/// when the weight function vanishes.
pub fn rational_surface_derivatives(
    homogeneous: &[Vec<HPoint>],
    order_u: usize,
    order_v: usize,
) -> Option<Vec<Vec<Vector3>>> {
    let w0 = homogeneous.first()?.first()?.w;
    if w0.abs() < Tolerance::EPSILON {
        return None;
    }
    let a = |k: usize, l: usize| {
        homogeneous
            .get(k)
            .and_then(|row| row.get(l))
            .copied()
            .unwrap_or(HPoint::ZERO)
    };
    let w = |k: usize, l: usize| a(k, l).w;

    let mut skl = vec![vec![Vector3::ZERO; order_v.saturating_add(1)]; order_u.saturating_add(1)];
    for k in 0..=order_u {
        for l in 0..=order_v {
            let mut v = a(k, l).truncate();
            for j in 1..=l {
                v -= binomial(l, j) * w(0, j) * skl[k][l - j];
            }
            for i in 1..=k {
                v -= binomial(k, i) * w(i, 0) * skl[k - i][l];
                let mut v2 = Vector3::ZERO;
                for j in 1..=l {
                    v2 += binomial(l, j) * w(i, j) * skl[k - i][l - j];
                }
                v -= binomial(k, i) * v2;
            }
            skl[k][l] = v / w0;
        }
    }
    Some(skl)
}

/// Evaluate the blossom (polar form) of the polynomial piece on `span`.
///
/// With every argument equal to `t` this is the classic de Boor algorithm.
/// `args` must hold exactly `degree` values.
pub fn blossom(kv: &KnotVector, control_points: &[HPoint], span: usize, args: &[f64]) -> HPoint {
    let p = kv.degree();
    let knots = kv.knots();
    debug_assert_eq!(args.len(), p);

    let mut d: Vec<HPoint> = control_points[span - p..=span].to_vec();
    for (r, &x) in args.iter().enumerate() {
        let r = r + 1;
        for j in (r..=p).rev() {
            let i = span - p + j;
            let alpha = guarded_div(x - knots[i], knots[i + p + 1 - r] - knots[i]);
            d[j] = (1.0 - alpha) * d[j - 1] + alpha * d[j];
        }
    }
    d[p]
}

/// De Boor evaluation of a homogeneous curve point at `t`.
pub fn de_boor(kv: &KnotVector, control_points: &[HPoint], t: f64) -> HPoint {
    let span = kv.find_span(t);
    let args = vec![t; kv.degree()];
    blossom(kv, control_points, span, &args)
}
