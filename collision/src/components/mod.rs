//! Columnar component stores keyed by entity.
//!
//! Each store keeps its data in dense parallel arrays with an entity→row
//! map, so the per-step loops iterate contiguous memory. Removal is
//! swap-remove: the last row moves into the vacated slot and the map is
//! patched, which keeps rows dense at the cost of row-order stability.

mod body;
mod proxy_shape;
mod transform;

pub use body::BodyComponents;
pub use proxy_shape::ProxyShapeComponents;
pub use transform::TransformComponents;
