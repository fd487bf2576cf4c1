//! World transforms per body.

use std::collections::HashMap;

use copperfern_core::math::Transform;
use copperfern_ecs::Entity;

/// Columnar store of per-body world transforms.
#[derive(Default)]
pub struct TransformComponents {
    entities: Vec<Entity>,
    transforms: Vec<Transform>,
    rows: HashMap<Entity, usize>,
}

impl TransformComponents {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transform for a body entity.
    pub fn insert(&mut self, body: Entity, transform: Transform) {
        debug_assert!(!self.rows.contains_key(&body));
        self.rows.insert(body, self.entities.len());
        self.entities.push(body);
        self.transforms.push(transform);
    }

    /// Removes the transform of a body entity, if present.
    pub fn remove(&mut self, body: Entity) {
        let Some(row) = self.rows.remove(&body) else {
            return;
        };
        let last = self.entities.len() - 1;
        if row != last {
            let moved = self.entities[last];
            self.entities.swap(row, last);
            self.transforms.swap(row, last);
            self.rows.insert(moved, row);
        }
        self.entities.pop();
        self.transforms.pop();
    }

    /// The world transform of a body.
    ///
    /// Panics if the body has no transform; passing an unregistered or
    /// stale entity is a caller bug.
    pub fn transform(&self, body: Entity) -> &Transform {
        &self.transforms[self.rows[&body]]
    }

    /// The world transform of a body, or `None` if it has none.
    pub fn get(&self, body: Entity) -> Option<&Transform> {
        self.rows.get(&body).map(|&row| &self.transforms[row])
    }

    /// Replaces the world transform of a body.
    pub fn set_transform(&mut self, body: Entity, transform: Transform) {
        let row = self.rows[&body];
        self.transforms[row] = transform;
    }

    /// Number of stored transforms.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copperfern_core::math::{transform_from_translation, Vector3};
    use copperfern_ecs::EntityAllocator;

    #[test]
    fn insert_get_set() {
        let mut alloc = EntityAllocator::new();
        let mut store = TransformComponents::new();
        let body = alloc.allocate();

        store.insert(body, transform_from_translation(Vector3::new(1.0, 0.0, 0.0)));
        assert_eq!(store.transform(body).translation.vector.x, 1.0);

        store.set_transform(body, transform_from_translation(Vector3::new(2.0, 0.0, 0.0)));
        assert_eq!(store.transform(body).translation.vector.x, 2.0);
    }

    #[test]
    fn swap_remove_keeps_remaining_rows_reachable() {
        let mut alloc = EntityAllocator::new();
        let mut store = TransformComponents::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        for (i, e) in [a, b, c].into_iter().enumerate() {
            store.insert(e, transform_from_translation(Vector3::new(i as _, 0.0, 0.0)));
        }

        store.remove(a);
        assert_eq!(store.len(), 2);
        assert!(store.get(a).is_none());
        assert_eq!(store.transform(b).translation.vector.x, 1.0);
        assert_eq!(store.transform(c).translation.vector.x, 2.0);
    }
}
