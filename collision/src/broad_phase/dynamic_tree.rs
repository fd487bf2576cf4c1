//! Incrementally balanced tree of fattened bounding boxes.

use copperfern_core::aabb::Aabb;
use copperfern_core::math::{Point3, Real, Vector3};

use crate::config::BroadPhaseConfig;
use crate::ray::Ray;

/// Node id meaning "no node".
pub const NULL_NODE: i32 = -1;

/// A node slot in the tree arena.
///
/// `parent_or_next` is the parent id while the slot is allocated and the
/// next free slot while it sits on the free list; `height == -1` marks a
/// free slot, so the two uses never overlap.
#[derive(Debug, Clone)]
struct TreeNode<T> {
    parent_or_next: i32,
    children: [i32; 2],
    height: i32,
    aabb: Aabb,
    payload: Option<T>,
}

impl<T> TreeNode<T> {
    fn free(next: i32) -> Self {
        Self {
            parent_or_next: next,
            children: [NULL_NODE; 2],
            height: -1,
            aabb: Aabb::new(Point3::origin(), Point3::origin()),
            payload: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children[0] == NULL_NODE
    }
}

/// A dynamic tree of axis-aligned bounding boxes with arbitrary leaf
/// payloads.
///
/// Leaves store bounds fattened by a fixed margin, so an object that moves
/// a little each step usually stays inside its stored box and costs
/// nothing. When it escapes, the leaf is pulled out and re-inserted along
/// the cheapest path by surface-area cost, and the affected ancestors are
/// rebalanced with AVL-style rotations. Overlap and ray queries prune on
/// the stored boxes and run in expected logarithmic time.
///
/// Given the same operation sequence and configuration, the tree shape is
/// fully deterministic.
pub struct DynamicAabbTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: i32,
    free_list: i32,
    margin: Real,
    displacement_multiplier: Real,
    predict_displacement: bool,
}

impl<T> DynamicAabbTree<T> {
    /// Creates an empty tree configured by `config`.
    pub fn new(config: &BroadPhaseConfig) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NULL_NODE,
            free_list: NULL_NODE,
            margin: config.aabb_margin,
            displacement_multiplier: config.displacement_multiplier,
            predict_displacement: config.predict_displacement,
        };
        tree.grow_arena(config.initial_node_capacity.max(1));
        tree
    }

    /// Adds a leaf for `aabb` (fattened by the margin) holding `payload`.
    /// Returns the new leaf's node id.
    pub fn add_object(&mut self, aabb: &Aabb, payload: T) -> i32 {
        let leaf = self.allocate_node();
        let node = &mut self.nodes[leaf as usize];
        node.aabb = aabb.fattened(self.margin);
        node.payload = Some(payload);
        self.insert_leaf(leaf);
        leaf
    }

    /// Removes a leaf and rebalances the ancestors it leaves behind.
    pub fn remove_object(&mut self, node_id: i32) {
        debug_assert!(self.is_leaf_id(node_id));
        self.remove_leaf(node_id);
        self.release_node(node_id);
    }

    /// Refreshes a leaf's bounds after its object moved.
    ///
    /// When the new tight `aabb` (stretched along `displacement` if motion
    /// prediction is configured) still fits in the stored fattened box,
    /// nothing changes and `false` is returned. Otherwise the leaf is
    /// re-inserted under freshly fattened bounds and `true` is returned.
    pub fn update_object(&mut self, node_id: i32, aabb: &Aabb, displacement: &Vector3) -> bool {
        debug_assert!(self.is_leaf_id(node_id));

        let target = if self.predict_displacement {
            aabb.extended_toward(&(displacement * self.displacement_multiplier))
        } else {
            *aabb
        };
        if self.nodes[node_id as usize].aabb.contains(&target) {
            return false;
        }

        self.remove_leaf(node_id);
        self.nodes[node_id as usize].aabb = target.fattened(self.margin);
        self.insert_leaf(node_id);
        true
    }

    /// The fattened bounds stored on a leaf.
    pub fn fat_aabb(&self, node_id: i32) -> &Aabb {
        debug_assert!(self.is_allocated_id(node_id));
        &self.nodes[node_id as usize].aabb
    }

    /// The payload stored on a leaf.
    pub fn payload(&self, node_id: i32) -> &T {
        debug_assert!(self.is_leaf_id(node_id));
        self.nodes[node_id as usize]
            .payload
            .as_ref()
            .expect("payload queried on a non-leaf node")
    }

    /// Calls `callback` with the id of every leaf whose stored bounds
    /// overlap `query`.
    pub fn report_overlaps(&self, query: &Aabb, mut callback: impl FnMut(i32)) {
        let mut stack: Vec<i32> = Vec::with_capacity(64);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if !node.aabb.overlaps(query) {
                continue;
            }
            if node.is_leaf() {
                callback(id);
            } else {
                stack.push(node.children[1]);
                stack.push(node.children[0]);
            }
        }
    }

    /// Casts a ray through the tree, pruning subtrees whose bounds the
    /// (possibly already clipped) segment misses.
    ///
    /// For every candidate leaf, `callback` receives the leaf id and the
    /// current clipped ray, and answers with a fraction: negative ignores
    /// the leaf, `0` terminates the traversal, and a value in `(0, 1]`
    /// clips the segment for everything visited afterwards.
    pub fn raycast(&self, ray: &Ray, mut callback: impl FnMut(i32, &Ray) -> Real) {
        let mut max_fraction = ray.max_fraction;
        let mut stack: Vec<i32> = Vec::with_capacity(64);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if !node.aabb.raycast_segment(&ray.point1, &ray.point2, max_fraction) {
                continue;
            }
            if node.is_leaf() {
                let clipped = Ray::with_max_fraction(ray.point1, ray.point2, max_fraction);
                let fraction = callback(id, &clipped);
                if fraction == 0.0 {
                    return;
                }
                if fraction > 0.0 {
                    max_fraction = fraction;
                }
            } else {
                stack.push(node.children[1]);
                stack.push(node.children[0]);
            }
        }
    }

    // ---- Node arena ----

    fn allocate_node(&mut self) -> i32 {
        if self.free_list == NULL_NODE {
            let len = self.nodes.len();
            self.grow_arena(len * 2);
        }
        let id = self.free_list;
        let node = &mut self.nodes[id as usize];
        self.free_list = node.parent_or_next;
        node.parent_or_next = NULL_NODE;
        node.children = [NULL_NODE; 2];
        node.height = 0;
        id
    }

    fn release_node(&mut self, id: i32) {
        let node = &mut self.nodes[id as usize];
        node.payload = None;
        node.children = [NULL_NODE; 2];
        node.height = -1;
        node.parent_or_next = self.free_list;
        self.free_list = id;
    }

    /// Extends the arena to `new_len` slots, threading the new slots onto
    /// the free list.
    fn grow_arena(&mut self, new_len: usize) {
        let old_len = self.nodes.len();
        debug_assert!(self.free_list == NULL_NODE && new_len > old_len);
        self.nodes.reserve(new_len - old_len);
        for i in old_len..new_len {
            let next = if i + 1 < new_len {
                (i + 1) as i32
            } else {
                NULL_NODE
            };
            self.nodes.push(TreeNode::free(next));
        }
        self.free_list = old_len as i32;
    }

    fn is_allocated_id(&self, id: i32) -> bool {
        id >= 0 && (id as usize) < self.nodes.len() && self.nodes[id as usize].height >= 0
    }

    fn is_leaf_id(&self, id: i32) -> bool {
        self.is_allocated_id(id) && self.nodes[id as usize].is_leaf()
    }

    // ---- Structure maintenance ----

    /// Walks from the root to the cheapest sibling for `leaf` by surface
    /// area, splices a new parent in above it, and rebalances upward.
    fn insert_leaf(&mut self, leaf: i32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent_or_next = NULL_NODE;
            return;
        }

        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let node = &self.nodes[index as usize];
            let child1 = node.children[0];
            let child2 = node.children[1];

            let area = node.aabb.surface_area();
            let combined_area = node.aabb.union(&leaf_aabb).surface_area();

            // Cost of pairing the new leaf with this whole subtree.
            let cost = 2.0 * combined_area;
            // Growth this node suffers no matter which child we descend to.
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost1 = self.descend_cost(child1, &leaf_aabb) + inheritance_cost;
            let cost2 = self.descend_cost(child2, &leaf_aabb) + inheritance_cost;

            if cost < cost1 && cost < cost2 {
                break;
            }
            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;
        let sibling_aabb = self.nodes[sibling as usize].aabb;
        let sibling_height = self.nodes[sibling as usize].height;
        let old_parent = self.nodes[sibling as usize].parent_or_next;

        let new_parent = self.allocate_node();
        {
            let node = &mut self.nodes[new_parent as usize];
            node.parent_or_next = old_parent;
            node.children = [sibling, leaf];
            node.height = sibling_height + 1;
            node.aabb = sibling_aabb.union(&leaf_aabb);
        }
        self.nodes[sibling as usize].parent_or_next = new_parent;
        self.nodes[leaf as usize].parent_or_next = new_parent;

        if old_parent != NULL_NODE {
            let slot = if self.nodes[old_parent as usize].children[0] == sibling {
                0
            } else {
                1
            };
            self.nodes[old_parent as usize].children[slot] = new_parent;
        } else {
            self.root = new_parent;
        }

        self.refresh_upward(new_parent);
    }

    /// Cost of descending into `child` while carrying `leaf_aabb`: the
    /// union's area, minus the child's current area when the child is a
    /// subtree we would merely pass through.
    fn descend_cost(&self, child: i32, leaf_aabb: &Aabb) -> Real {
        let node = &self.nodes[child as usize];
        let combined = node.aabb.union(leaf_aabb).surface_area();
        if node.is_leaf() {
            combined
        } else {
            combined - node.aabb.surface_area()
        }
    }

    /// Detaches a leaf: its parent collapses into the sibling, and the
    /// ancestors are refreshed and rebalanced.
    fn remove_leaf(&mut self, leaf: i32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent_or_next;
        let parent_node = &self.nodes[parent as usize];
        let sibling = if parent_node.children[0] == leaf {
            parent_node.children[1]
        } else {
            parent_node.children[0]
        };
        let grandparent = parent_node.parent_or_next;

        if grandparent != NULL_NODE {
            let slot = if self.nodes[grandparent as usize].children[0] == parent {
                0
            } else {
                1
            };
            self.nodes[grandparent as usize].children[slot] = sibling;
            self.nodes[sibling as usize].parent_or_next = grandparent;
            self.release_node(parent);
            self.refresh_upward(grandparent);
        } else {
            self.root = sibling;
            self.nodes[sibling as usize].parent_or_next = NULL_NODE;
            self.release_node(parent);
        }
    }

    /// Walks from `index` to the root, rebalancing each node and
    /// recomputing its height and enclosing bounds.
    fn refresh_upward(&mut self, mut index: i32) {
        while index != NULL_NODE {
            index = self.balance(index);

            let node = &self.nodes[index as usize];
            let child1 = node.children[0];
            let child2 = node.children[1];
            debug_assert!(child1 != NULL_NODE && child2 != NULL_NODE);

            let height1 = self.nodes[child1 as usize].height;
            let height2 = self.nodes[child2 as usize].height;
            let aabb = self.nodes[child1 as usize]
                .aabb
                .union(&self.nodes[child2 as usize].aabb);

            let node = &mut self.nodes[index as usize];
            node.height = 1 + height1.max(height2);
            node.aabb = aabb;
            index = node.parent_or_next;
        }
    }

    /// Restores the AVL balance condition at `a` if its subtrees' heights
    /// differ by two, returning the id now occupying `a`'s position.
    fn balance(&mut self, a: i32) -> i32 {
        let node = &self.nodes[a as usize];
        if node.is_leaf() || node.height < 2 {
            return a;
        }
        let child1 = node.children[0];
        let child2 = node.children[1];
        let imbalance = self.nodes[child2 as usize].height - self.nodes[child1 as usize].height;

        if imbalance > 1 {
            self.rotate_up(a, child2, child1)
        } else if imbalance < -1 {
            self.rotate_up(a, child1, child2)
        } else {
            a
        }
    }

    /// Rotates `lifted` (a child of `a`) into `a`'s position. The taller of
    /// `lifted`'s children stays under it; the shorter one becomes `a`'s
    /// child in the slot `lifted` vacated. `kept` is `a`'s other child.
    /// Only internal nodes change parentage; leaves keep ids and payloads.
    fn rotate_up(&mut self, a: i32, lifted: i32, kept: i32) -> i32 {
        let grandchild1 = self.nodes[lifted as usize].children[0];
        let grandchild2 = self.nodes[lifted as usize].children[1];
        let lifted_slot = if self.nodes[a as usize].children[0] == lifted {
            0
        } else {
            1
        };

        // The lifted node takes a's place under a's parent.
        let grandparent = self.nodes[a as usize].parent_or_next;
        self.nodes[lifted as usize].children[0] = a;
        self.nodes[lifted as usize].parent_or_next = grandparent;
        self.nodes[a as usize].parent_or_next = lifted;
        if grandparent != NULL_NODE {
            let slot = if self.nodes[grandparent as usize].children[0] == a {
                0
            } else {
                1
            };
            self.nodes[grandparent as usize].children[slot] = lifted;
        } else {
            self.root = lifted;
        }

        let (stays, moves_down) =
            if self.nodes[grandchild1 as usize].height > self.nodes[grandchild2 as usize].height {
                (grandchild1, grandchild2)
            } else {
                (grandchild2, grandchild1)
            };
        self.nodes[lifted as usize].children[1] = stays;
        self.nodes[a as usize].children[lifted_slot] = moves_down;
        self.nodes[moves_down as usize].parent_or_next = a;

        // a is now the deeper node: refresh it first, then the lifted node.
        let a_aabb = self.nodes[kept as usize]
            .aabb
            .union(&self.nodes[moves_down as usize].aabb);
        let a_height = 1 + self.nodes[kept as usize]
            .height
            .max(self.nodes[moves_down as usize].height);
        self.nodes[a as usize].aabb = a_aabb;
        self.nodes[a as usize].height = a_height;

        let lifted_aabb = a_aabb.union(&self.nodes[stays as usize].aabb);
        let lifted_height = 1 + a_height.max(self.nodes[stays as usize].height);
        self.nodes[lifted as usize].aabb = lifted_aabb;
        self.nodes[lifted as usize].height = lifted_height;

        lifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DynamicAabbTree<u32> {
        DynamicAabbTree::new(&BroadPhaseConfig::default())
    }

    fn unit_cube_at(x: Real, y: Real, z: Real) -> Aabb {
        Aabb::from_center_half_extents(Point3::new(x, y, z), Vector3::new(0.5, 0.5, 0.5))
    }

    /// Deterministic pseudo-random generator for stress tests.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn real_in(&mut self, lo: Real, hi: Real) -> Real {
            let unit = (self.next() >> 11) as Real / (1u64 << 53) as Real;
            lo + unit * (hi - lo)
        }
    }

    impl<T> DynamicAabbTree<T> {
        /// Audits every structural invariant: parent/child agreement,
        /// heights, AVL balance, enclosure, and free-list accounting.
        fn assert_well_formed(&self) {
            if self.root != NULL_NODE {
                assert_eq!(self.nodes[self.root as usize].parent_or_next, NULL_NODE);
                self.assert_subtree(self.root);
            }

            let mut free = 0usize;
            let mut cursor = self.free_list;
            while cursor != NULL_NODE {
                let node = &self.nodes[cursor as usize];
                assert_eq!(node.height, -1);
                assert!(node.payload.is_none());
                free += 1;
                assert!(free <= self.nodes.len(), "free list cycle");
                cursor = node.parent_or_next;
            }
            let allocated = self.nodes.iter().filter(|n| n.height >= 0).count();
            assert_eq!(allocated + free, self.nodes.len());
        }

        fn assert_subtree(&self, id: i32) {
            let node = &self.nodes[id as usize];
            if node.is_leaf() {
                assert_eq!(node.height, 0);
                assert_eq!(node.children[1], NULL_NODE);
                assert!(node.payload.is_some());
                return;
            }

            let child1 = node.children[0];
            let child2 = node.children[1];
            assert_eq!(self.nodes[child1 as usize].parent_or_next, id);
            assert_eq!(self.nodes[child2 as usize].parent_or_next, id);

            let height1 = self.nodes[child1 as usize].height;
            let height2 = self.nodes[child2 as usize].height;
            assert_eq!(node.height, 1 + height1.max(height2));
            assert!((height1 - height2).abs() <= 1, "unbalanced at node {id}");

            assert!(node.aabb.contains(&self.nodes[child1 as usize].aabb));
            assert!(node.aabb.contains(&self.nodes[child2 as usize].aabb));

            self.assert_subtree(child1);
            self.assert_subtree(child2);
        }

        fn collect_leaves(&self) -> Vec<i32> {
            let mut leaves = Vec::new();
            for (i, node) in self.nodes.iter().enumerate() {
                if node.height == 0 {
                    leaves.push(i as i32);
                }
            }
            leaves
        }
    }

    #[test]
    fn add_and_query_three_leaves() {
        let mut tree = tree();
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let b = tree.add_object(&unit_cube_at(5.0, 0.0, 0.0), 1);
        let c = tree.add_object(&unit_cube_at(10.0, 0.0, 0.0), 2);
        tree.assert_well_formed();

        let mut hits = Vec::new();
        tree.report_overlaps(&unit_cube_at(5.0, 0.0, 0.0), |id| hits.push(id));
        assert_eq!(hits, vec![b]);

        let mut all = Vec::new();
        tree.report_overlaps(
            &Aabb::new(Point3::new(-20.0, -1.0, -1.0), Point3::new(20.0, 1.0, 1.0)),
            |id| all.push(id),
        );
        all.sort_unstable();
        assert_eq!(all, vec![a, b, c]);

        assert_eq!(*tree.payload(a), 0);
        assert_eq!(*tree.payload(c), 2);
    }

    #[test]
    fn fat_aabb_carries_margin() {
        let mut tree = tree();
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let fat = tree.fat_aabb(a);
        assert!((fat.min.x - (-0.58)).abs() < 1e-9);
        assert!((fat.max.x - 0.58).abs() < 1e-9);
    }

    #[test]
    fn update_within_margin_is_structural_noop() {
        let mut tree = tree();
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let arena_len = tree.nodes.len();
        let fat_before = *tree.fat_aabb(a);

        let moved = unit_cube_at(0.05, 0.0, 0.0);
        assert!(!tree.update_object(a, &moved, &Vector3::zeros()));
        assert_eq!(tree.nodes.len(), arena_len);
        assert_eq!(*tree.fat_aabb(a), fat_before);
    }

    #[test]
    fn update_outside_margin_reinserts() {
        let mut tree = tree();
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 7);
        let _b = tree.add_object(&unit_cube_at(5.0, 0.0, 0.0), 8);

        let moved = unit_cube_at(0.5, 0.0, 0.0);
        assert!(tree.update_object(a, &moved, &Vector3::zeros()));
        tree.assert_well_formed();
        assert_eq!(*tree.payload(a), 7);
        assert!(tree.fat_aabb(a).contains(&moved));

        let mut hits = Vec::new();
        tree.report_overlaps(&unit_cube_at(0.5, 0.0, 0.0), |id| hits.push(id));
        assert_eq!(hits, vec![a]);
    }

    #[test]
    fn displacement_prediction_stretches_bounds() {
        let mut config = BroadPhaseConfig::default();
        config.predict_displacement = true;
        let mut tree: DynamicAabbTree<u32> = DynamicAabbTree::new(&config);
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);

        // Re-insert with a displacement; the new fat box must cover the
        // predicted travel (2x multiplier) plus the margin.
        assert!(tree.update_object(
            a,
            &unit_cube_at(1.0, 0.0, 0.0),
            &Vector3::new(0.25, 0.0, 0.0)
        ));
        let fat = tree.fat_aabb(a);
        assert!(fat.max.x >= 1.5 + 0.5 + 0.08 - 1e-9);
        // The trailing side only carries the margin.
        assert!((fat.min.x - (1.0 - 0.5 - 0.08)).abs() < 1e-9);
    }

    #[test]
    fn remove_collapses_parent() {
        let mut tree = tree();
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let b = tree.add_object(&unit_cube_at(5.0, 0.0, 0.0), 1);
        let c = tree.add_object(&unit_cube_at(10.0, 0.0, 0.0), 2);

        tree.remove_object(b);
        tree.assert_well_formed();

        let mut all = Vec::new();
        tree.report_overlaps(
            &Aabb::new(Point3::new(-20.0, -1.0, -1.0), Point3::new(20.0, 1.0, 1.0)),
            |id| all.push(id),
        );
        all.sort_unstable();
        assert_eq!(all, vec![a, c]);
    }

    #[test]
    fn freed_slots_are_reused_lifo() {
        let mut tree = tree();
        let _a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let b = tree.add_object(&unit_cube_at(5.0, 0.0, 0.0), 1);
        tree.remove_object(b);

        let c = tree.add_object(&unit_cube_at(6.0, 0.0, 0.0), 2);
        assert_eq!(c, b);
        tree.assert_well_formed();
    }

    #[test]
    fn arena_growth_preserves_structure() {
        let mut config = BroadPhaseConfig::default();
        config.initial_node_capacity = 2;
        let mut tree: DynamicAabbTree<u32> = DynamicAabbTree::new(&config);
        for i in 0..64 {
            tree.add_object(&unit_cube_at(i as Real * 3.0, 0.0, 0.0), i);
        }
        tree.assert_well_formed();
        assert_eq!(tree.collect_leaves().len(), 64);
    }

    #[test]
    fn identical_operation_sequences_build_identical_trees() {
        let build = || {
            let mut tree = DynamicAabbTree::new(&BroadPhaseConfig::default());
            let mut rng = XorShift(0x1dea_f00d);
            let mut ids = Vec::new();
            for i in 0..50u32 {
                let x = rng.real_in(0.0, 40.0);
                let y = rng.real_in(0.0, 40.0);
                ids.push(tree.add_object(&unit_cube_at(x, y, 0.0), i));
            }
            for id in ids.iter().step_by(3) {
                tree.remove_object(*id);
            }
            tree
        };

        let t1 = build();
        let t2 = build();
        assert_eq!(t1.root, t2.root);
        assert_eq!(t1.nodes.len(), t2.nodes.len());
        for (n1, n2) in t1.nodes.iter().zip(t2.nodes.iter()) {
            assert_eq!(n1.height, n2.height);
            assert_eq!(n1.children, n2.children);
            assert_eq!(n1.parent_or_next, n2.parent_or_next);
        }
    }

    #[test]
    fn random_churn_keeps_invariants_and_query_completeness() {
        let mut tree = tree();
        let mut rng = XorShift(0xc0ff_ee11);

        let mut leaves = Vec::new();
        for i in 0..1000u32 {
            let center = Point3::new(
                rng.real_in(0.0, 100.0),
                rng.real_in(0.0, 100.0),
                rng.real_in(0.0, 100.0),
            );
            let aabb = Aabb::from_center_half_extents(center, Vector3::new(0.5, 0.5, 0.5));
            leaves.push(tree.add_object(&aabb, i));
        }
        tree.assert_well_formed();

        for pair in leaves.chunks(2) {
            tree.remove_object(pair[0]);
        }
        tree.assert_well_formed();

        let survivors: Vec<i32> = tree.collect_leaves();
        assert_eq!(survivors.len(), 500);

        // Query completeness: tree answers must match a brute-force scan of
        // the stored (fattened) leaf boxes.
        for _ in 0..10 {
            let center = Point3::new(
                rng.real_in(0.0, 100.0),
                rng.real_in(0.0, 100.0),
                rng.real_in(0.0, 100.0),
            );
            let query = Aabb::from_center_half_extents(center, Vector3::new(8.0, 8.0, 8.0));

            let mut reported = Vec::new();
            tree.report_overlaps(&query, |id| reported.push(id));
            reported.sort_unstable();

            let mut expected: Vec<i32> = survivors
                .iter()
                .copied()
                .filter(|&id| tree.fat_aabb(id).overlaps(&query))
                .collect();
            expected.sort_unstable();
            assert_eq!(reported, expected);
        }
    }

    #[test]
    fn raycast_visits_leaves_along_segment() {
        let mut tree = tree();
        let a = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let b = tree.add_object(&unit_cube_at(3.0, 0.0, 0.0), 1);
        let c = tree.add_object(&unit_cube_at(6.0, 0.0, 0.0), 2);
        let _off = tree.add_object(&unit_cube_at(0.0, 10.0, 0.0), 3);

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let mut visited = Vec::new();
        tree.raycast(&ray, |id, _| {
            visited.push(id);
            -1.0
        });
        visited.sort_unstable();
        assert_eq!(visited, vec![a, b, c]);
    }

    #[test]
    fn raycast_shortening_prunes_farther_leaves() {
        let mut tree = tree();
        let near = tree.add_object(&unit_cube_at(0.0, 0.0, 0.0), 0);
        let _mid = tree.add_object(&unit_cube_at(3.0, 0.0, 0.0), 1);
        let _far = tree.add_object(&unit_cube_at(6.0, 0.0, 0.0), 2);

        // Clipping to fraction 0.5 ends the segment at x = 0: everything
        // past the first cube is out of reach afterwards.
        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0));
        let mut visited = Vec::new();
        tree.raycast(&ray, |id, current| {
            visited.push(id);
            if id == near {
                0.5
            } else {
                assert!(current.max_fraction > 0.5);
                -1.0
            }
        });

        let near_pos = visited.iter().position(|&id| id == near).unwrap();
        assert_eq!(near_pos + 1, visited.len(), "leaves visited after clip");
    }

    #[test]
    fn raycast_zero_fraction_terminates() {
        let mut tree = tree();
        for i in 0..8 {
            tree.add_object(&unit_cube_at(i as Real * 2.0, 0.0, 0.0), i);
        }
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Point3::new(30.0, 0.0, 0.0));
        let mut calls = 0;
        tree.raycast(&ray, |_, _| {
            calls += 1;
            0.0
        });
        assert_eq!(calls, 1);
    }
}
