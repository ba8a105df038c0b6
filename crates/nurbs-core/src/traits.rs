use crate::error::Result;
use crate::generation::Generation;

/// Validate structural integrity of a geometric entity.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Compute an axis-aligned bounding box.
pub trait BoundingBox {
    type Point;
    fn bounding_box(&self) -> (Self::Point, Self::Point);
}

/// Objects whose edits are tracked by a generation counter.
///
/// Derived artifacts (tessellations) remember the generation they were built
/// from and are stale once it moves on.
pub trait Versioned {
    fn generation(&self) -> Generation;
}
