pub mod config;
pub mod error;
pub mod generation;
pub mod tolerance;
pub mod traits;

pub use config::{KernelConfig, TessellationConfig};
pub use error::{KernelError, Result};
pub use generation::Generation;
pub use tolerance::{guarded_div, Tolerance};
