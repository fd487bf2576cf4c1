//! # CopperFern Collision
//!
//! Broad-phase collision detection for the CopperFern engine.
//!
//! Each simulation step, the broad phase scans the registered collision
//! shapes and produces a conservative, deduplicated set of potentially
//! overlapping shape pairs for the narrow phase to examine. The work is
//! carried by three layers:
//!
//! - [`DynamicAabbTree`] — an incrementally balanced tree of fattened
//!   bounding boxes with overlap and ray queries
//! - [`BroadPhaseSystem`] — tracks moved shapes, refreshes world-space
//!   bounds from body transforms, and emits the overlapping-pair stream
//! - [`CollisionWorld`] — owns the entity allocator, the component columns,
//!   and the broad phase; the surface the rest of the engine talks to
//!
//! Shape pose lives in columnar component stores ([`components`]); shape
//! geometry is shared and immutable for the duration of a step
//! ([`CollisionShape`] behind an `Arc`).

pub mod broad_phase;
pub mod components;
pub mod config;
pub mod proxy_shape;
pub mod ray;
pub mod shape;
pub mod world;

pub use broad_phase::{BroadPhaseSystem, DynamicAabbTree, OverlapHandler, NULL_NODE};
pub use config::BroadPhaseConfig;
pub use proxy_shape::{ProxyShape, ProxyShapeMut};
pub use ray::{Ray, RaycastInfo, RaycastTest};
pub use shape::{CollisionShape, ShapeHit};
pub use world::CollisionWorld;

pub use copperfern_core::aabb::Aabb;
pub use copperfern_ecs::Entity;
