//! Math type aliases and helper functions.
//!
//! Provides precision-aware simulation types over nalgebra: `f64` by
//! default, `f32` behind the `f32` feature.

pub use nalgebra;

/// Simulation scalar type. `f64` by default, `f32` with the `f32` feature.
#[cfg(not(feature = "f32"))]
pub type Real = f64;

/// Simulation scalar type. `f32` with the `f32` feature.
#[cfg(feature = "f32")]
pub type Real = f32;

/// 3D vector.
pub type Vector3 = nalgebra::Vector3<Real>;

/// 3D point.
pub type Point3 = nalgebra::Point3<Real>;

/// 3x3 matrix.
pub type Matrix3 = nalgebra::Matrix3<Real>;

/// 3D rotation (unit quaternion).
pub type UnitQuaternion = nalgebra::UnitQuaternion<Real>;

/// Rigid transform: rotation followed by translation.
///
/// This is what the engine stores per body (world pose) and per collision
/// shape (local-to-body offset). Composition and inversion come from
/// nalgebra's isometry type.
pub type Transform = nalgebra::Isometry3<Real>;

// ===== Helper functions =====

/// Build a transform from a translation, with identity rotation.
pub fn transform_from_translation(translation: Vector3) -> Transform {
    Transform::translation(translation.x, translation.y, translation.z)
}

/// Build a transform from a translation and a rotation.
pub fn transform_from_parts(translation: Vector3, rotation: UnitQuaternion) -> Transform {
    Transform::from_parts(translation.into(), rotation)
}

/// Create a rotation from an angle around the X axis.
pub fn rotation_x(angle: Real) -> UnitQuaternion {
    UnitQuaternion::from_axis_angle(&nalgebra::Vector3::x_axis(), angle)
}

/// Create a rotation from an angle around the Y axis.
pub fn rotation_y(angle: Real) -> UnitQuaternion {
    UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angle)
}

/// Create a rotation from an angle around the Z axis.
pub fn rotation_z(angle: Real) -> UnitQuaternion {
    UnitQuaternion::from_axis_angle(&nalgebra::Vector3::z_axis(), angle)
}
