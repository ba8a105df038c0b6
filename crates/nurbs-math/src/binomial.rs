/// Binomial coefficient `C(n, k)` as a float.
///
/// Computed multiplicatively; exact for the small orders used by derivative
/// and degree elevation formulas.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut c = 1.0;
    for i in 0..k {
        c = c * (n - i) as f64 / (i + 1) as f64;
    }
    c.round()
}
