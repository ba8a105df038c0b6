//! B-spline basis functions via the Cox-de Boor recurrence.
//!
//! All knot-difference denominators go through [`guarded_div`], so zero-width
//! spans contribute zero instead of producing NaN.

use nurbs_core::guarded_div;

use super::knot::KnotVector;

/// Compute the non-vanishing basis functions at parameter `t`.
///
/// Returns `degree + 1` values N_{span-degree,degree}(t) through
/// N_{span,degree}(t).
///
/// # Arguments
/// * `span` - The knot span index (from [`KnotVector::find_span`])
/// * `t` - Parameter value
/// * `degree` - Degree of the basis
/// * `knots` - The knot sequence
pub fn basis_functions(span: usize, t: f64, degree: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];

    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;

        for r in 0..j {
            let temp = guarded_div(n[r], right[r + 1] + left[j - r]);
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }

        n[j] = saved;
    }

    n
}

/// Compute basis functions and their derivatives up to `max_order`.
///
/// Returns a table `ders` where `ders[k][j]` is the k-th derivative of
/// N_{span-degree+j,degree}(t). Derivatives above `degree` vanish
/// identically, so the table stops at `min(max_order, degree)`.
pub fn basis_function_derivatives(
    span: usize,
    t: f64,
    degree: usize,
    knots: &[f64],
    max_order: usize,
) -> Vec<Vec<f64>> {
    let p = degree;

    // ndu: upper triangle holds basis values, lower triangle knot differences
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];

    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;

        for r in 0..j {
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = guarded_div(ndu[r][j - 1], ndu[j][r]);

            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let top = max_order.min(p);
    let mut ders = vec![vec![0.0; p + 1]; top + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = vec![vec![0.0; p + 1]; 2];

    for r in 0..=p {
        let mut s1 = 0usize;
        let mut s2 = 1usize;
        a[0][0] = 1.0;

        for k in 1..=top {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;

            if rk >= 0 {
                let rk = rk as usize;
                a[s2][0] = guarded_div(a[s1][0], ndu[pk + 1][rk]);
                d = a[s2][0] * ndu[rk][pk];
            }

            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r as isize - 1 <= pk as isize { k - 1 } else { p - r };

            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = guarded_div(a[s1][j] - a[s1][j - 1], ndu[pk + 1][idx]);
                d += a[s2][j] * ndu[idx][pk];
            }

            if r <= pk {
                a[s2][k] = guarded_div(-a[s1][k - 1], ndu[pk + 1][r]);
                d += a[s2][k] * ndu[r][pk];
            }

            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    // Multiply through by p! / (p - k)!
    let mut factor = p as f64;
    for k in 1..=top {
        for val in &mut ders[k] {
            *val *= factor;
        }
        factor *= (p - k) as f64;
    }

    ders
}

/// Evaluate the single basis function N_{i,degree}(t).
///
/// Slower than [`basis_functions`] but handy when one function is plotted on
/// its own, e.g. in a knot editor.
pub fn one_basis_function(i: usize, t: f64, degree: usize, knots: &[f64]) -> f64 {
    let p = degree;
    let m = knots.len() - 1;

    // Right end of the domain belongs to the last non-empty function
    if (i == 0 && t == knots[0]) || (i == m - p - 1 && t == knots[m]) {
        return 1.0;
    }
    if t < knots[i] || t >= knots[i + p + 1] {
        return 0.0;
    }

    let mut n: Vec<f64> = (0..=p)
        .map(|j| {
            if knots[i + j] <= t && t < knots[i + j + 1] {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    for k in 1..=p {
        let mut saved = if n[0] == 0.0 {
            0.0
        } else {
            guarded_div((t - knots[i]) * n[0], knots[i + k] - knots[i])
        };
        for j in 0..(p - k + 1) {
            let u_left = knots[i + j + 1];
            let u_right = knots[i + j + k + 1];
            if n[j + 1] == 0.0 {
                n[j] = saved;
                saved = 0.0;
            } else {
                let temp = guarded_div(n[j + 1], u_right - u_left);
                n[j] = saved + (u_right - t) * temp;
                saved = (t - u_left) * temp;
            }
        }
    }
    n[0]
}

/// Basis values at `t` for a knot vector, locating the span first.
///
/// Returns `(span, values)`.
pub fn evaluate_basis(kv: &KnotVector, t: f64) -> (usize, Vec<f64>) {
    let span = kv.find_span(t);
    (span, basis_functions(span, t, kv.degree(), kv.knots()))
}
