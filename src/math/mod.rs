//! Integer geometry helpers

pub mod aabb;
pub mod transform;

pub use aabb::BlockBox;
pub use transform::Transform;
