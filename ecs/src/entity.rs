/// A lightweight entity identifier with generational index.
///
/// Entities are represented as a 32-bit slot index + 32-bit generation,
/// packed into a single `u64`. The generation prevents ABA problems when
/// entity slots are recycled: a handle to a despawned entity never compares
/// equal to the handle of the entity that later reuses its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    id: u64,
}

impl Entity {
    /// Creates a new entity from an index and generation.
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self {
            id: (generation as u64) << 32 | index as u64,
        }
    }

    /// Returns the index portion of the entity ID.
    pub fn index(&self) -> u32 {
        self.id as u32
    }

    /// Returns the generation portion of the entity ID.
    pub fn generation(&self) -> u32 {
        (self.id >> 32) as u32
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}:{})", self.index(), self.generation())
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}:{})", self.index(), self.generation())
    }
}

/// Per-slot bookkeeping for [`EntityAllocator`].
struct Slot {
    generation: u32,
    alive: bool,
}

/// Allocates and recycles entity IDs with generational tracking.
///
/// When an entity is deallocated, its slot joins a LIFO free list and its
/// generation is bumped. The next allocation reuses the slot under the new
/// generation, so outstanding handles to the old entity go stale rather
/// than aliasing the new one.
#[derive(Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    /// Free list of recyclable indices (LIFO stack).
    free_list: Vec<u32>,
    /// Number of currently alive entities.
    count: u32,
}

impl EntityAllocator {
    /// Creates a new empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new entity, reusing a recycled slot if available.
    pub fn allocate(&mut self) -> Entity {
        self.count += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            Entity::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                alive: true,
            });
            Entity::new(index, 0)
        }
    }

    /// Deallocates an entity. Returns false if it was already dead or the
    /// handle's generation is stale.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        let index = entity.index();
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return false;
        };
        if !slot.alive || slot.generation != entity.generation() {
            return false;
        }

        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
        self.count -= 1;
        true
    }

    /// Returns whether the entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Returns the number of alive entities.
    pub fn count(&self) -> u32 {
        self.count
    }
}
