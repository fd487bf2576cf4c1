//! # CopperFern Engine Core
//!
//! Core crate for CopperFern Engine basic utilities: simulation math
//! aliases, bounding volumes, and profiling instrumentation.

pub mod aabb;
pub mod math;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
