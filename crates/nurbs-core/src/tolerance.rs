/// Global and local tolerance management for geometric computations.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Linear tolerance for distance comparisons (in model units)
    pub linear: f64,
    /// Tolerance on parameter values (knots, curve parameters)
    pub parametric: f64,
}

impl Tolerance {
    pub const DEFAULT_LINEAR: f64 = 1e-9;
    pub const DEFAULT_PARAMETRIC: f64 = 1e-12;

    /// Denominators below this magnitude are treated as zero.
    pub const EPSILON: f64 = 1e-15;

    pub fn new(linear: f64, parametric: f64) -> Self {
        Self { linear, parametric }
    }

    pub fn default_precision() -> Self {
        Self {
            linear: Self::DEFAULT_LINEAR,
            parametric: Self::DEFAULT_PARAMETRIC,
        }
    }

    /// Check if a value is zero within linear tolerance
    pub fn is_zero(self, v: f64) -> bool {
        v.abs() < self.linear
    }

    /// Check if two parameter values coincide
    pub fn parametric_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.parametric
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::default_precision()
    }
}

/// Divide `num` by `den`, yielding zero when the denominator vanishes.
///
/// This is the convention for knot-difference ratios in the basis recurrence:
/// a zero-width span contributes nothing.
#[inline]
pub fn guarded_div(num: f64, den: f64) -> f64 {
    if den.abs() < Tolerance::EPSILON {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_div() {
        assert_eq!(guarded_div(1.0, 0.0), 0.0);
        assert_eq!(guarded_div(1.0, 4.0), 0.25);
    }

    #[test]
    fn test_comparisons() {
        let tol = Tolerance::default();
        assert!(tol.is_zero(1e-10));
        assert!(!tol.is_zero(1e-8));
        assert!(tol.parametric_eq(0.5, 0.5 + 1e-13));
        assert!(!tol.parametric_eq(0.5, 0.5 + 1e-9));
        assert_eq!(Tolerance::new(1e-6, 0.0).linear, 1e-6);
    }
}
