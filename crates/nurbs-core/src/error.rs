use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("Invalid degree {degree} for {control_points} control points")]
    InvalidDegree { degree: usize, control_points: usize },

    #[error("Invalid weight {0}: weights must be positive and finite")]
    InvalidWeight(f64),

    #[error("Parameter {value} outside domain [{min}, {max}]")]
    OutOfDomain { value: f64, min: f64, max: f64 },

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid knot vector: {0}")]
    InvalidKnotVector(String),

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KernelError {
    pub fn out_of_domain(value: f64, (min, max): (f64, f64)) -> Self {
        Self::OutOfDomain { value, min, max }
    }

    /// Whether this error was raised by an edit that failed validation, as
    /// opposed to a query or lookup.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidDegree { .. }
                | Self::InvalidWeight(_)
                | Self::InvalidKnotVector(_)
                | Self::DimensionMismatch(_)
                | Self::DegenerateGeometry(_)
        )
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
