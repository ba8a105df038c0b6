pub mod aabb;
pub mod binomial;
pub mod homogeneous;

pub use glam::{dvec3, dvec4, DVec2, DVec3, DVec4};
pub use aabb::Aabb3;
pub use binomial::binomial;
pub use homogeneous::{from_homogeneous, to_homogeneous, HPoint};

pub type Point2 = DVec2;
pub type Point3 = DVec3;
pub type Vector3 = DVec3;
