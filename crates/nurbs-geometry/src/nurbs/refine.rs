//! Shape-preserving refinement of homogeneous control polygons.
//!
//! Both operations are pure: they return a new knot vector and control
//! polygon and leave their inputs alone, so callers can commit the result
//! atomically.

use nurbs_core::{guarded_div, KernelError, Result};
use nurbs_math::HPoint;

use super::deboor::blossom;
use super::knot::KnotVector;

/// Insert `value` once (Boehm's algorithm).
///
/// Returns the refined knot vector, the new control polygon and the index of
/// the inserted knot.
pub fn insert_knot(
    kv: &KnotVector,
    control_points: &[HPoint],
    value: f64,
) -> Result<(KnotVector, Vec<HPoint>, usize)> {
    check_polygon(kv, control_points)?;

    let mut refined = kv.clone();
    let index = refined.insert_knot(value)?;
    let value = refined.knots()[index];

    let p = kv.degree();
    let knots = kv.knots();
    let k = index - 1;

    let mut new_points = Vec::with_capacity(control_points.len() + 1);
    new_points.extend_from_slice(&control_points[..=k - p]);
    for i in (k - p + 1)..=k {
        let alpha = guarded_div(value - knots[i], knots[i + p] - knots[i]);
        new_points.push((1.0 - alpha) * control_points[i - 1] + alpha * control_points[i]);
    }
    new_points.extend_from_slice(&control_points[k..]);

    Ok((refined, new_points, index))
}

/// Insert every value of `values` (in any order), one at a time.
pub fn refine_knots(
    kv: &KnotVector,
    control_points: &[HPoint],
    values: &[f64],
) -> Result<(KnotVector, Vec<HPoint>)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut current = (kv.clone(), control_points.to_vec());
    for &value in &sorted {
        let (next_kv, next_points, _) = insert_knot(&current.0, &current.1, value)?;
        current = (next_kv, next_points);
    }
    Ok(current)
}

/// Raise the degree by one without changing the shape.
///
/// Each control point of the elevated curve is the blossom of the elevated
/// polynomial piece at its knot arguments; the elevated blossom is the mean of
/// the original blossom over every way of dropping one argument.
pub fn elevate_degree(kv: &KnotVector, control_points: &[HPoint]) -> Result<(KnotVector, Vec<HPoint>)> {
    check_polygon(kv, control_points)?;
    if !kv.is_clamped() {
        return Err(KernelError::InvalidKnotVector(
            "degree elevation requires a clamped knot vector".into(),
        ));
    }

    let p = kv.degree();
    let elevated = kv.elevated();
    let new_knots = elevated.knots();
    let count = elevated.control_point_count();
    let (_, max) = kv.domain();

    let mut new_points = Vec::with_capacity(count);
    let mut args = Vec::with_capacity(p);
    for i in 0..count {
        // Q_i is the blossom of any piece on a non-empty span in [i, i + p + 1]
        let lo = i.max(p + 1);
        let hi = (i + p + 1).min(count - 1);
        let piece = (lo..=hi)
            .find(|&j| new_knots[j] < new_knots[j + 1])
            .ok_or_else(|| {
                KernelError::DegenerateGeometry(format!(
                    "no non-empty span supports elevated control point {}",
                    i
                ))
            })?;
        let span = kv.find_span(new_knots[piece].min(max));

        let full = &new_knots[i + 1..=i + p + 1];
        let mut sum = HPoint::ZERO;
        for skip in 0..=p {
            args.clear();
            args.extend(
                full.iter()
                    .enumerate()
                    .filter(|&(idx, _)| idx != skip)
                    .map(|(_, &x)| x),
            );
            sum += blossom(kv, control_points, span, &args);
        }
        new_points.push(sum / (p + 1) as f64);
    }

    Ok((elevated, new_points))
}

fn check_polygon(kv: &KnotVector, control_points: &[HPoint]) -> Result<()> {
    if kv.control_point_count() != control_points.len() {
        return Err(KernelError::DimensionMismatch(format!(
            "knot vector expects {} control points, got {}",
            kv.control_point_count(),
            control_points.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nurbs::deboor::curve_point;
    use crate::nurbs::knot::KnotScheme;
    use approx::assert_abs_diff_eq;
    use nurbs_math::{dvec4, from_homogeneous};

    fn sample_curve() -> (KnotVector, Vec<HPoint>) {
        let kv = KnotVector::create(3, 6, &KnotScheme::Uniform).unwrap();
        let cps = vec![
            dvec4(0.0, 0.0, 0.0, 1.0),
            dvec4(1.0, 2.0, 0.5, 1.0) * 2.0,
            dvec4(3.0, 3.0, -1.0, 1.0) * 0.5,
            dvec4(4.0, 0.0, 1.0, 1.0),
            dvec4(5.0, -1.0, 0.0, 1.0) * 1.5,
            dvec4(6.0, 1.0, 2.0, 1.0),
        ];
        (kv, cps)
    }

    fn assert_same_shape(a: (&KnotVector, &[HPoint]), b: (&KnotVector, &[HPoint])) {
        for s in 0..=200 {
            let t = s as f64 / 200.0;
            let (pa, _) = from_homogeneous(curve_point(a.0, a.1, t)).unwrap();
            let (pb, _) = from_homogeneous(curve_point(b.0, b.1, t)).unwrap();
            assert_abs_diff_eq!(pa.distance(pb), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_insert_knot_preserves_shape() {
        let (kv, cps) = sample_curve();
        let (kv2, cps2, index) = insert_knot(&kv, &cps, 0.4).unwrap();
        assert_eq!(cps2.len(), cps.len() + 1);
        assert_eq!(kv2.knots()[index], 0.4);
        assert_same_shape((&kv, &cps), (&kv2, &cps2));
    }

    #[test]
    fn test_insert_existing_knot_up_to_degree() {
        let (kv, cps) = sample_curve();
        let third = 1.0 / 3.0;
        assert_eq!(kv.multiplicity(third), 1);
        let (kv2, cps2) = refine_knots(&kv, &cps, &[third, third]).unwrap();
        assert_eq!(kv2.multiplicity(third), 3);
        assert_eq!(cps2.len(), cps.len() + 2);
        assert_same_shape((&kv, &cps), (&kv2, &cps2));

        // A fourth copy would exceed the degree
        assert!(matches!(
            insert_knot(&kv2, &cps2, third),
            Err(KernelError::InvalidKnotVector(_))
        ));
    }

    #[test]
    fn test_insert_knot_rejects_mismatched_polygon() {
        let (kv, cps) = sample_curve();
        assert!(matches!(
            insert_knot(&kv, &cps[..4], 0.5),
            Err(KernelError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_elevate_degree_preserves_shape() {
        let (kv, cps) = sample_curve();
        let (kv2, cps2) = elevate_degree(&kv, &cps).unwrap();
        assert_eq!(kv2.degree(), 4);
        assert_eq!(cps2.len(), kv2.control_point_count());
        assert_same_shape((&kv, &cps), (&kv2, &cps2));
    }

    #[test]
    fn test_elevate_bezier() {
        // Quadratic Bezier elevates to the classic cubic control polygon
        let kv = KnotVector::create(2, 3, &KnotScheme::Uniform).unwrap();
        let cps = vec![
            dvec4(0.0, 0.0, 0.0, 1.0),
            dvec4(3.0, 3.0, 0.0, 1.0),
            dvec4(6.0, 0.0, 0.0, 1.0),
        ];
        let (kv2, cps2) = elevate_degree(&kv, &cps).unwrap();
        assert_eq!(kv2.knots(), &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_abs_diff_eq!((cps2[1] - dvec4(2.0, 2.0, 0.0, 1.0)).length(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((cps2[2] - dvec4(4.0, 2.0, 0.0, 1.0)).length(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_elevate_with_repeated_interior_knot() {
        let kv = KnotVector::from_knots(
            2,
            vec![0.0, 0.0, 0.0, 0.3, 0.6, 0.6, 1.0, 1.0, 1.0],
            6,
        )
        .unwrap();
        let cps: Vec<HPoint> = (0..6)
            .map(|i| {
                let f = i as f64;
                let w = 1.0 + 0.3 * (f * 0.7).sin();
                dvec4(f * w, (f * f * 0.3) * w, 0.0, w)
            })
            .collect();
        let (kv2, cps2) = elevate_degree(&kv, &cps).unwrap();
        assert_eq!(kv2.multiplicity(0.6), 3);
        assert_same_shape((&kv, &cps), (&kv2, &cps2));
    }
}
