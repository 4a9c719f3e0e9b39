//! Math primitives shared by the software city crates.
//!
//! Everything in here is plain data: no device, no scene state.

mod aabb;
mod color;
mod frustum;
mod plane;

pub use aabb::Aabb;
pub use color::{ParseColorError, RgbColor};
pub use frustum::Frustum;
pub use plane::Plane;

/// Tolerance used for floating point comparisons across the workspace.
pub const EPSILON: f32 = 1e-5;
