//! Sampling settings for curves and surfaces.

use nurbs_core::{KernelError, Result, TessellationConfig};

/// Depth limit for adaptive surface subdivision; each level quadruples the
/// worst-case quad count.
pub const SURFACE_MAX_DEPTH: u32 = 8;

/// How a curve is turned into samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// `count` equal parameter steps, `count + 1` samples.
    Fixed(usize),
    /// Bisect until every interval is within `tolerance` of its chord.
    Adaptive { tolerance: f64, max_depth: u32 },
}

impl Default for Sampling {
    fn default() -> Self {
        Self::fixed_from_config(&TessellationConfig::default())
    }
}

impl Sampling {
    /// Fixed resolution from the configured segment count.
    pub fn fixed_from_config(config: &TessellationConfig) -> Self {
        Self::Fixed(config.resolution)
    }

    /// Adaptive sampling with the configured tolerance and depth.
    pub fn adaptive_from_config(config: &TessellationConfig) -> Self {
        Self::Adaptive {
            tolerance: config.tolerance,
            max_depth: config.max_depth,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Fixed(0) => Err(KernelError::Config(
                "fixed sampling needs at least one segment".into(),
            )),
            Self::Adaptive { tolerance, .. } if !(tolerance.is_finite() && tolerance > 0.0) => {
                Err(KernelError::Config(format!(
                    "sampling tolerance must be positive, got {}",
                    tolerance
                )))
            }
            _ => Ok(()),
        }
    }
}

/// How a surface is turned into triangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceSampling {
    /// Uniform parameter grid.
    Grid { u_divs: usize, v_divs: usize },
    /// Quadtree refinement of an initial grid.
    Adaptive {
        tolerance: f64,
        max_depth: u32,
        initial_divisions: usize,
    },
}

impl Default for SurfaceSampling {
    fn default() -> Self {
        Self::from_config(&TessellationConfig::default())
    }
}

impl SurfaceSampling {
    pub fn from_config(config: &TessellationConfig) -> Self {
        Self::Adaptive {
            tolerance: config.tolerance,
            max_depth: config.max_depth.min(SURFACE_MAX_DEPTH),
            initial_divisions: config.initial_divisions,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Grid { u_divs, v_divs } if u_divs == 0 || v_divs == 0 => Err(
                KernelError::Config(format!("grid {}x{} has no cells", u_divs, v_divs)),
            ),
            Self::Adaptive { tolerance, .. } if !(tolerance.is_finite() && tolerance > 0.0) => {
                Err(KernelError::Config(format!(
                    "surface tolerance must be positive, got {}",
                    tolerance
                )))
            }
            Self::Adaptive {
                initial_divisions: 0,
                ..
            } => Err(KernelError::Config(
                "initial_divisions must be at least 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        assert_eq!(Sampling::default(), Sampling::Fixed(200));
        assert_eq!(
            Sampling::adaptive_from_config(&TessellationConfig::default()),
            Sampling::Adaptive {
                tolerance: 1e-3,
                max_depth: 12
            }
        );
        assert_eq!(
            SurfaceSampling::default(),
            SurfaceSampling::Adaptive {
                tolerance: 1e-3,
                max_depth: SURFACE_MAX_DEPTH,
                initial_divisions: 4
            }
        );
    }

    #[test]
    fn test_validate() {
        assert!(Sampling::Fixed(0).validate().is_err());
        assert!(Sampling::Adaptive {
            tolerance: 0.0,
            max_depth: 4
        }
        .validate()
        .is_err());
        assert!(SurfaceSampling::Grid { u_divs: 3, v_divs: 0 }
            .validate()
            .is_err());
        assert!(SurfaceSampling::default().validate().is_ok());
    }
}
