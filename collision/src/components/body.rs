//! Activity flags per body.

use std::collections::HashMap;

use copperfern_ecs::Entity;

/// Columnar store of per-body activity state.
///
/// An inactive body is invisible to raycasts; a sleeping body is merely at
/// rest and is woken by the proxy view whenever one of its shapes is
/// repositioned. Putting bodies to sleep is the job of a layer above this
/// crate; here the flags are only stored and consumed.
#[derive(Default)]
pub struct BodyComponents {
    entities: Vec<Entity>,
    active: Vec<bool>,
    sleeping: Vec<bool>,
    rows: HashMap<Entity, usize>,
}

impl BodyComponents {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a body, initially active and awake.
    pub fn insert(&mut self, body: Entity) {
        debug_assert!(!self.rows.contains_key(&body));
        self.rows.insert(body, self.entities.len());
        self.entities.push(body);
        self.active.push(true);
        self.sleeping.push(false);
    }

    /// Removes a body, if present.
    pub fn remove(&mut self, body: Entity) {
        let Some(row) = self.rows.remove(&body) else {
            return;
        };
        let last = self.entities.len() - 1;
        if row != last {
            let moved = self.entities[last];
            self.entities.swap(row, last);
            self.active.swap(row, last);
            self.sleeping.swap(row, last);
            self.rows.insert(moved, row);
        }
        self.entities.pop();
        self.active.pop();
        self.sleeping.pop();
    }

    /// Whether the body participates in queries.
    pub fn is_active(&self, body: Entity) -> bool {
        self.active[self.rows[&body]]
    }

    /// Sets the active flag.
    pub fn set_active(&mut self, body: Entity, active: bool) {
        let row = self.rows[&body];
        self.active[row] = active;
    }

    /// Whether the body is asleep.
    pub fn is_sleeping(&self, body: Entity) -> bool {
        self.sleeping[self.rows[&body]]
    }

    /// Sets the sleeping flag.
    pub fn set_sleeping(&mut self, body: Entity, sleeping: bool) {
        let row = self.rows[&body];
        self.sleeping[row] = sleeping;
    }

    /// Whether the body is registered.
    pub fn contains(&self, body: Entity) -> bool {
        self.rows.contains_key(&body)
    }
}
