//! Kernel configuration: tolerances and tessellation defaults.
//!
//! Every field has a default, so a partial JSON document only overrides what
//! it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::tolerance::Tolerance;

/// Tessellation defaults used when a caller does not pass explicit settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationConfig {
    /// Maximum chordal deviation for adaptive sampling (model units)
    pub tolerance: f64,
    /// Recursion limit for adaptive subdivision
    pub max_depth: u32,
    /// Segment count for fixed-resolution curve sampling
    pub resolution: usize,
    /// Initial grid divisions per direction for adaptive surface tessellation
    pub initial_divisions: usize,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_depth: 12,
            resolution: 200,
            initial_divisions: 4,
        }
    }
}

impl TessellationConfig {
    fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(KernelError::Config(format!(
                "tessellation tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.resolution == 0 {
            return Err(KernelError::Config("resolution must be at least 1".into()));
        }
        if self.initial_divisions == 0 {
            return Err(KernelError::Config(
                "initial_divisions must be at least 1".into(),
            ));
        }
        if self.max_depth > 32 {
            return Err(KernelError::Config(format!(
                "max_depth {} exceeds the limit of 32",
                self.max_depth
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub tolerance: Tolerance,
    pub tessellation: TessellationConfig,
}

impl KernelConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.linear.is_finite() && self.tolerance.linear > 0.0) {
            return Err(KernelError::Config(format!(
                "linear tolerance must be positive, got {}",
                self.tolerance.linear
            )));
        }
        if !(self.tolerance.parametric.is_finite() && self.tolerance.parametric >= 0.0) {
            return Err(KernelError::Config(format!(
                "parametric tolerance must be non-negative, got {}",
                self.tolerance.parametric
            )));
        }
        self.tessellation.validate()
    }
}
