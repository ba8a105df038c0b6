use std::f64::consts::FRAC_1_SQRT_2;

use approx::assert_abs_diff_eq;
use nurbs_core::traits::Versioned;
use nurbs_geometry::nurbs::{evaluate_basis, one_basis_function};
use nurbs_geometry::{Curve, KnotScheme, KnotVector, NurbsCurve};
use nurbs_math::{dvec3, Point3};

fn full_circle() -> NurbsCurve {
    let w = FRAC_1_SQRT_2;
    let points = vec![
        dvec3(1.0, 0.0, 0.0),
        dvec3(1.0, 1.0, 0.0),
        dvec3(0.0, 1.0, 0.0),
        dvec3(-1.0, 1.0, 0.0),
        dvec3(-1.0, 0.0, 0.0),
        dvec3(-1.0, -1.0, 0.0),
        dvec3(0.0, -1.0, 0.0),
        dvec3(1.0, -1.0, 0.0),
        dvec3(1.0, 0.0, 0.0),
    ];
    let weights = vec![1.0, w, 1.0, w, 1.0, w, 1.0, w, 1.0];
    let knots = vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0];
    NurbsCurve::with_knots(2, points, weights, knots).unwrap()
}

fn zigzag(n: usize) -> Vec<Point3> {
    (0..n)
        .map(|i| dvec3(i as f64, if i % 2 == 0 { 0.0 } else { 1.5 }, 0.1 * i as f64))
        .collect()
}

#[test]
fn test_basis_partition_of_unity() {
    let kv = KnotVector::create(3, 7, &KnotScheme::Uniform).unwrap();
    for k in 0..=40 {
        let t = k as f64 / 40.0;
        let values: Vec<f64> = (0..7)
            .map(|i| one_basis_function(i, t, 3, kv.knots()))
            .collect();
        assert!(values.iter().all(|&v| v >= -1e-14));
        assert_abs_diff_eq!(values.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

        // The span evaluation agrees with the single-function evaluation
        let (span, local) = evaluate_basis(&kv, t);
        for (j, v) in local.iter().enumerate() {
            assert_abs_diff_eq!(*v, values[span - 3 + j], epsilon = 1e-12);
        }
    }
}

#[test]
fn test_chord_length_knots() {
    let points = vec![
        dvec3(0.0, 0.0, 0.0),
        dvec3(1.0, 0.0, 0.0),
        dvec3(3.0, 0.0, 0.0),
        dvec3(4.0, 0.0, 0.0),
    ];
    let scheme = KnotScheme::chord_length(&points);
    assert_eq!(scheme, KnotScheme::Averaged(vec![0.0, 0.25, 0.75, 1.0]));
    let curve = NurbsCurve::polynomial(2, points, &scheme).unwrap();
    assert_eq!(curve.knots().knots(), &[0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]);
    assert_eq!(curve.domain(), (0.0, 1.0));
}

#[test]
fn test_repeated_points_still_build_a_curve() {
    // A doubled point gives a zero-length leg
    let points = vec![
        dvec3(0.0, 0.0, 0.0),
        dvec3(0.0, 0.0, 0.0),
        dvec3(1.0, 0.0, 0.0),
        dvec3(1.0, 1.0, 0.0),
    ];
    for scheme in [KnotScheme::chord_length(&points), KnotScheme::centripetal(&points)] {
        assert_eq!(scheme, KnotScheme::Uniform);
        let curve = NurbsCurve::polynomial(1, points.clone(), &scheme).unwrap();
        assert_eq!(curve.knots().knots(), &[0.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0]);
        let end = curve.evaluate(1.0).unwrap();
        assert_abs_diff_eq!(end.distance(dvec3(1.0, 1.0, 0.0)), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_full_circle() {
    let circle = full_circle();
    assert!(circle.is_closed());
    assert_eq!(circle.breakpoints(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);

    for k in 0..=64 {
        let t = k as f64 / 64.0;
        let p = circle.evaluate(t).unwrap();
        assert_abs_diff_eq!(p.length(), 1.0, epsilon = 1e-12);
    }
    let top = circle.evaluate(0.25).unwrap();
    assert_abs_diff_eq!(top.distance(dvec3(0.0, 1.0, 0.0)), 0.0, epsilon = 1e-12);
    let left = circle.evaluate(0.5).unwrap();
    assert_abs_diff_eq!(left.distance(dvec3(-1.0, 0.0, 0.0)), 0.0, epsilon = 1e-12);
}

#[test]
fn test_circle_survives_refinement() {
    let mut circle = full_circle();
    let reference: Vec<Point3> = (0..=32)
        .map(|k| circle.evaluate(k as f64 / 32.0).unwrap())
        .collect();

    circle.refine_knots(&[0.1, 0.6, 0.6]).unwrap();
    circle.degree_elevate().unwrap();
    assert_eq!(circle.degree(), 3);

    for (k, expected) in reference.iter().enumerate() {
        let p = circle.evaluate(k as f64 / 32.0).unwrap();
        assert!(p.distance(*expected) < 1e-9, "t = {}", k as f64 / 32.0);
    }
}

#[test]
fn test_generation_counts_successful_edits() {
    let mut curve = NurbsCurve::polynomial(3, zigzag(6), &KnotScheme::Uniform).unwrap();
    let g0 = curve.generation();

    curve.move_point(2, dvec3(2.0, 3.0, 0.0)).unwrap();
    let g1 = curve.generation();
    assert!(g1 > g0);

    assert!(curve.set_weight(2, f64::NAN).is_err());
    assert!(curve.insert_knot_refine(-0.5).is_err());
    assert_eq!(curve.generation(), g1);

    curve.insert_knot_refine(0.4).unwrap();
    assert!(curve.generation() > g1);
}

#[test]
fn test_unclamped_curve_cannot_be_elevated() {
    let mut curve = NurbsCurve::with_knots(
        2,
        zigzag(4),
        vec![1.0; 4],
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    )
    .unwrap();
    assert_eq!(curve.domain(), (2.0, 4.0));
    let before = curve.clone();
    assert!(curve.degree_elevate().is_err());
    assert_eq!(curve, before);

    // Knot insertion works on any valid vector
    curve.insert_knot_refine(3.0).unwrap();
    assert_eq!(curve.control_point_count(), 5);
}
