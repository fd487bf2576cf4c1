//! Broad-phase tuning constants.

use copperfern_core::math::Real;

/// Tunable constants of the broad phase.
///
/// The defaults are the values the engine ships with; they are safe for
/// scenes measured in meters. All of them only affect performance and
/// hysteresis, never correctness of the emitted pair set.
#[derive(Debug, Clone, Copy)]
pub struct BroadPhaseConfig {
    /// Margin added on every side of a shape's bounds when it is stored in
    /// the tree. Small motions inside the margin do not re-insert the leaf.
    pub aabb_margin: Real,
    /// Factor applied to a shape's per-step displacement when stretching
    /// its stored bounds along the direction of motion. Only used when
    /// [`predict_displacement`](Self::predict_displacement) is set.
    pub displacement_multiplier: Real,
    /// Initial number of node slots in the tree arena.
    pub initial_node_capacity: usize,
    /// Stretch stored bounds along each shape's displacement so that fast
    /// movers re-insert less often. Off by default: callers that want it
    /// must supply displacements through
    /// [`BroadPhaseSystem::update_proxy_shapes_with`](crate::BroadPhaseSystem::update_proxy_shapes_with).
    pub predict_displacement: bool,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        Self {
            aabb_margin: 0.08,
            displacement_multiplier: 2.0,
            initial_node_capacity: 8,
            predict_displacement: false,
        }
    }
}
