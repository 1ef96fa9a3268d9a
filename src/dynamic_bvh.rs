//! Dynamic AABB Tree
//!
//! A self-balancing binary tree of fat AABBs backing the broad phase.
//!
//! # Features
//!
//! - **O(log n) updates**: insert, remove, and move without rebuilds
//! - **Surface-area heuristic**: insertion descends toward the cheapest
//!   sibling, measured by perimeter growth
//! - **Fat AABBs**: proxies are stored with a constant margin plus a
//!   displacement-predicted extension, so jitter causes no tree churn and
//!   fast movers get a larger envelope
//! - **Tree rotations**: one AVL-style rotation per ancestor keeps queries
//!   O(log n)
//! - **Pooled nodes**: the free list reuses the parent field with height −1
//!   as the free sentinel; the pool doubles when exhausted
//!
//! Author: Moroya Sakamoto

use crate::collider::{Aabb, RayCastInput};
use crate::math::Vec2;
use crate::tuning::{AABB_EXTENSION, AABB_MULTIPLIER};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Null node sentinel
pub const NULL_NODE: u32 = u32::MAX;

/// A node in the dynamic AABB tree
#[derive(Clone, Debug)]
pub struct TreeNode {
    /// Fat AABB (enlarged beyond the tight bounds)
    pub aabb: Aabb,
    /// Proxy payload for leaves
    pub user_data: u32,
    /// Parent index while live; next free index while on the free list
    pub parent_or_next: u32,
    /// Left child (NULL_NODE for leaves)
    pub child1: u32,
    /// Right child (NULL_NODE for leaves)
    pub child2: u32,
    /// 0 for leaves, −1 for free nodes
    pub height: i32,
    /// Set when the proxy moved since the last broad-phase pass
    pub moved: bool,
}

impl TreeNode {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Dynamic AABB tree with pooled nodes
pub struct DynamicTree {
    nodes: Vec<TreeNode>,
    root: u32,
    free_list: u32,
    node_count: usize,
}

impl DynamicTree {
    /// Create an empty tree with a small warm pool
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NULL_NODE,
            free_list: NULL_NODE,
            node_count: 0,
        };
        tree.grow_pool(16);
        tree
    }

    /// Extend the pool and thread the new nodes onto the free list
    fn grow_pool(&mut self, new_capacity: usize) {
        let old_capacity = self.nodes.len();
        debug_assert!(new_capacity > old_capacity);
        self.nodes.reserve(new_capacity - old_capacity);
        for i in old_capacity..new_capacity {
            let next = if i + 1 < new_capacity {
                (i + 1) as u32
            } else {
                self.free_list
            };
            self.nodes.push(TreeNode {
                aabb: Aabb::default(),
                user_data: NULL_NODE,
                parent_or_next: next,
                child1: NULL_NODE,
                child2: NULL_NODE,
                height: -1,
                moved: false,
            });
        }
        self.free_list = old_capacity as u32;
    }

    fn allocate_node(&mut self) -> u32 {
        if self.free_list == NULL_NODE {
            debug_assert_eq!(self.node_count, self.nodes.len());
            self.grow_pool(self.nodes.len() * 2);
        }

        let node_id = self.free_list;
        let node = &mut self.nodes[node_id as usize];
        self.free_list = node.parent_or_next;
        node.parent_or_next = NULL_NODE;
        node.child1 = NULL_NODE;
        node.child2 = NULL_NODE;
        node.height = 0;
        node.user_data = NULL_NODE;
        node.moved = false;
        self.node_count += 1;
        node_id
    }

    fn free_node(&mut self, node_id: u32) {
        debug_assert!((node_id as usize) < self.nodes.len());
        debug_assert!(self.node_count > 0);
        let node = &mut self.nodes[node_id as usize];
        node.parent_or_next = self.free_list;
        node.height = -1;
        self.free_list = node_id;
        self.node_count -= 1;
    }

    // ========================================================================
    // Proxy interface
    // ========================================================================

    /// Insert a proxy. The stored AABB is the tight AABB fattened by the
    /// constant extension.
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: u32) -> u32 {
        let proxy_id = self.allocate_node();

        let r = Vec2::new(AABB_EXTENSION, AABB_EXTENSION);
        self.nodes[proxy_id as usize].aabb = Aabb::new(aabb.min - r, aabb.max + r);
        self.nodes[proxy_id as usize].user_data = user_data;
        self.nodes[proxy_id as usize].height = 0;
        self.nodes[proxy_id as usize].moved = true;

        self.insert_leaf(proxy_id);
        proxy_id
    }

    /// Remove a proxy
    pub fn destroy_proxy(&mut self, proxy_id: u32) {
        debug_assert!((proxy_id as usize) < self.nodes.len());
        debug_assert!(self.nodes[proxy_id as usize].is_leaf());

        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Move a proxy to a new tight AABB with the displacement the body
    /// covered this step.
    ///
    /// Returns false without touching the tree when the stored fat AABB
    /// still contains the tight bounds and is not wastefully oversized.
    pub fn move_proxy(&mut self, proxy_id: u32, aabb: Aabb, displacement: Vec2) -> bool {
        debug_assert!((proxy_id as usize) < self.nodes.len());
        debug_assert!(self.nodes[proxy_id as usize].is_leaf());

        // Extend in the direction of motion
        let r = Vec2::new(AABB_EXTENSION, AABB_EXTENSION);
        let mut fat_aabb = Aabb::new(aabb.min - r, aabb.max + r);
        let d = displacement * AABB_MULTIPLIER;
        if d.x < 0.0 {
            fat_aabb.min.x += d.x;
        } else {
            fat_aabb.max.x += d.x;
        }
        if d.y < 0.0 {
            fat_aabb.min.y += d.y;
        } else {
            fat_aabb.max.y += d.y;
        }

        let tree_aabb = self.nodes[proxy_id as usize].aabb;
        if tree_aabb.contains(&aabb) {
            // The proxy still fits. Only rebuild when the stored box has
            // grown far beyond what the new bounds justify.
            let huge = Aabb::new(
                fat_aabb.min - r * 4.0,
                fat_aabb.max + r * 4.0,
            );
            if huge.contains(&tree_aabb) {
                return false;
            }
        }

        self.remove_leaf(proxy_id);
        self.nodes[proxy_id as usize].aabb = fat_aabb;
        self.insert_leaf(proxy_id);
        self.nodes[proxy_id as usize].moved = true;
        true
    }

    /// Proxy payload
    #[inline]
    pub fn user_data(&self, proxy_id: u32) -> u32 {
        self.nodes[proxy_id as usize].user_data
    }

    /// Stored (fat) AABB of a proxy
    #[inline]
    pub fn fat_aabb(&self, proxy_id: u32) -> Aabb {
        self.nodes[proxy_id as usize].aabb
    }

    /// Whether the proxy moved since the flag was last cleared
    #[inline]
    pub fn was_moved(&self, proxy_id: u32) -> bool {
        self.nodes[proxy_id as usize].moved
    }

    /// Clear the moved flag after a broad-phase pass consumed it
    #[inline]
    pub fn clear_moved(&mut self, proxy_id: u32) {
        self.nodes[proxy_id as usize].moved = false;
    }

    /// Number of live proxies and internal nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Height of the tree (0 when empty)
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Visit every proxy whose fat AABB overlaps `aabb`. The callback
    /// returns false to stop early.
    pub fn query<F: FnMut(u32) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        let mut stack: Vec<u32> = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id as usize];
            if !node.aabb.intersects(aabb) {
                continue;
            }

            if node.is_leaf() {
                if !callback(node_id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Ray cast against the proxies. The callback receives the clipped input
    /// and the proxy id; its return value shortens the ray (0 stops the
    /// query, values in (0, max_fraction] become the new max fraction, and
    /// anything else leaves the ray unchanged).
    pub fn ray_cast<F: FnMut(&RayCastInput, u32) -> f32>(
        &self,
        input: &RayCastInput,
        mut callback: F,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let mut r = p2 - p1;
        if r.normalize() == 0.0 {
            return;
        }

        // v is perpendicular to the segment; |dot(v, c - p1)| > dot(|v|, h)
        // separates a box from the ray line.
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;

        let mut segment_aabb = {
            let t = p1 + (p2 - p1) * max_fraction;
            Aabb::new(p1.min(t), p1.max(t))
        };

        let mut stack: Vec<u32> = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id as usize];
            if !node.aabb.intersects(&segment_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1: input.p1,
                    p2: input.p2,
                    max_fraction,
                };

                let value = callback(&sub_input, node_id);
                if value == 0.0 {
                    // The client terminated the cast
                    return;
                }
                if value > 0.0 {
                    // Shorten the ray
                    max_fraction = value;
                    let t = p1 + (p2 - p1) * max_fraction;
                    segment_aabb = Aabb::new(p1.min(t), p1.max(t));
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Shift the coordinate origin of every stored AABB by -offset
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in &mut self.nodes {
            if node.height >= 0 {
                node.aabb.min -= new_origin;
                node.aabb.max -= new_origin;
            }
        }
    }

    // ========================================================================
    // Insertion / removal
    // ========================================================================

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent_or_next = NULL_NODE;
            return;
        }

        // Descend toward the cheapest sibling by perimeter cost
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let child1 = self.nodes[index as usize].child1;
            let child2 = self.nodes[index as usize].child2;

            let perimeter = self.nodes[index as usize].aabb.perimeter();
            let combined = leaf_aabb.union(&self.nodes[index as usize].aabb);
            let combined_perimeter = combined.perimeter();

            // Cost of creating a new parent for this node and the leaf
            let cost = 2.0 * combined_perimeter;

            // Every descent pushes the leaf's bounds onto this node
            let inheritance_cost = 2.0 * (combined_perimeter - perimeter);

            let cost1 = self.descend_cost(child1, &leaf_aabb) + inheritance_cost;
            let cost2 = self.descend_cost(child2, &leaf_aabb) + inheritance_cost;

            if cost < cost1 && cost < cost2 {
                break;
            }

            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;

        // Splice a new parent between the sibling and its old parent
        let old_parent = self.nodes[sibling as usize].parent_or_next;
        let new_parent = self.allocate_node();
        self.nodes[new_parent as usize].parent_or_next = old_parent;
        self.nodes[new_parent as usize].aabb = leaf_aabb.union(&self.nodes[sibling as usize].aabb);
        self.nodes[new_parent as usize].height = self.nodes[sibling as usize].height + 1;

        if old_parent != NULL_NODE {
            if self.nodes[old_parent as usize].child1 == sibling {
                self.nodes[old_parent as usize].child1 = new_parent;
            } else {
                self.nodes[old_parent as usize].child2 = new_parent;
            }
        } else {
            self.root = new_parent;
        }

        self.nodes[new_parent as usize].child1 = sibling;
        self.nodes[new_parent as usize].child2 = leaf;
        self.nodes[sibling as usize].parent_or_next = new_parent;
        self.nodes[leaf as usize].parent_or_next = new_parent;

        // Walk back up refitting AABBs, heights, and balance
        self.fix_upward(new_parent);
    }

    /// SAH cost of pushing the leaf down into `child`
    fn descend_cost(&self, child: u32, leaf_aabb: &Aabb) -> f32 {
        let child_aabb = &self.nodes[child as usize].aabb;
        let combined = leaf_aabb.union(child_aabb);
        if self.nodes[child as usize].is_leaf() {
            combined.perimeter()
        } else {
            combined.perimeter() - child_aabb.perimeter()
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent_or_next;
        let grand_parent = self.nodes[parent as usize].parent_or_next;
        let sibling = if self.nodes[parent as usize].child1 == leaf {
            self.nodes[parent as usize].child2
        } else {
            self.nodes[parent as usize].child1
        };

        if grand_parent != NULL_NODE {
            // Destroy the parent and connect the sibling to the grandparent
            if self.nodes[grand_parent as usize].child1 == parent {
                self.nodes[grand_parent as usize].child1 = sibling;
            } else {
                self.nodes[grand_parent as usize].child2 = sibling;
            }
            self.nodes[sibling as usize].parent_or_next = grand_parent;
            self.free_node(parent);

            self.fix_upward(grand_parent);
        } else {
            self.root = sibling;
            self.nodes[sibling as usize].parent_or_next = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Refit AABBs and heights from `start` to the root, rotating at each
    /// unbalanced ancestor
    fn fix_upward(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index as usize].child1;
            let child2 = self.nodes[index as usize].child2;
            debug_assert!(child1 != NULL_NODE);
            debug_assert!(child2 != NULL_NODE);

            self.nodes[index as usize].height = 1 + self.nodes[child1 as usize]
                .height
                .max(self.nodes[child2 as usize].height);
            self.nodes[index as usize].aabb = self.nodes[child1 as usize]
                .aabb
                .union(&self.nodes[child2 as usize].aabb);

            index = self.nodes[index as usize].parent_or_next;
        }
    }

    /// One rotation at node A when its children differ in height by more
    /// than 1: the taller child pivots up and its shallower grandchild
    /// replaces it under A. Returns the new subtree root.
    fn balance(&mut self, i_a: u32) -> u32 {
        debug_assert!(i_a != NULL_NODE);

        if self.nodes[i_a as usize].is_leaf() || self.nodes[i_a as usize].height < 2 {
            return i_a;
        }

        let i_b = self.nodes[i_a as usize].child1;
        let i_c = self.nodes[i_a as usize].child2;

        let balance = self.nodes[i_c as usize].height - self.nodes[i_b as usize].height;

        // Rotate C up
        if balance > 1 {
            let i_f = self.nodes[i_c as usize].child1;
            let i_g = self.nodes[i_c as usize].child2;

            // Swap A and C
            self.nodes[i_c as usize].child1 = i_a;
            self.nodes[i_c as usize].parent_or_next = self.nodes[i_a as usize].parent_or_next;
            self.nodes[i_a as usize].parent_or_next = i_c;

            let c_parent = self.nodes[i_c as usize].parent_or_next;
            if c_parent != NULL_NODE {
                if self.nodes[c_parent as usize].child1 == i_a {
                    self.nodes[c_parent as usize].child1 = i_c;
                } else {
                    debug_assert!(self.nodes[c_parent as usize].child2 == i_a);
                    self.nodes[c_parent as usize].child2 = i_c;
                }
            } else {
                self.root = i_c;
            }

            // Attach the taller grandchild to C, the shorter to A
            if self.nodes[i_f as usize].height > self.nodes[i_g as usize].height {
                self.nodes[i_c as usize].child2 = i_f;
                self.nodes[i_a as usize].child2 = i_g;
                self.nodes[i_g as usize].parent_or_next = i_a;
                self.refit_pair(i_a, i_b, i_g, i_c, i_f);
            } else {
                self.nodes[i_c as usize].child2 = i_g;
                self.nodes[i_a as usize].child2 = i_f;
                self.nodes[i_f as usize].parent_or_next = i_a;
                self.refit_pair(i_a, i_b, i_f, i_c, i_g);
            }

            return i_c;
        }

        // Rotate B up
        if balance < -1 {
            let i_d = self.nodes[i_b as usize].child1;
            let i_e = self.nodes[i_b as usize].child2;

            // Swap A and B
            self.nodes[i_b as usize].child1 = i_a;
            self.nodes[i_b as usize].parent_or_next = self.nodes[i_a as usize].parent_or_next;
            self.nodes[i_a as usize].parent_or_next = i_b;

            let b_parent = self.nodes[i_b as usize].parent_or_next;
            if b_parent != NULL_NODE {
                if self.nodes[b_parent as usize].child1 == i_a {
                    self.nodes[b_parent as usize].child1 = i_b;
                } else {
                    debug_assert!(self.nodes[b_parent as usize].child2 == i_a);
                    self.nodes[b_parent as usize].child2 = i_b;
                }
            } else {
                self.root = i_b;
            }

            if self.nodes[i_d as usize].height > self.nodes[i_e as usize].height {
                self.nodes[i_b as usize].child2 = i_d;
                self.nodes[i_a as usize].child1 = i_e;
                self.nodes[i_e as usize].parent_or_next = i_a;
                self.refit_pair(i_a, i_c, i_e, i_b, i_d);
            } else {
                self.nodes[i_b as usize].child2 = i_e;
                self.nodes[i_a as usize].child1 = i_d;
                self.nodes[i_d as usize].parent_or_next = i_a;
                self.refit_pair(i_a, i_c, i_d, i_b, i_e);
            }

            return i_b;
        }

        i_a
    }

    /// Recompute AABB and height of the two nodes a rotation touched:
    /// `lower` from (l1, l2), then `upper` from (lower, u2)
    fn refit_pair(&mut self, lower: u32, l1: u32, l2: u32, upper: u32, u2: u32) {
        self.nodes[lower as usize].aabb = self.nodes[l1 as usize]
            .aabb
            .union(&self.nodes[l2 as usize].aabb);
        self.nodes[lower as usize].height = 1 + self.nodes[l1 as usize]
            .height
            .max(self.nodes[l2 as usize].height);

        self.nodes[upper as usize].aabb = self.nodes[lower as usize]
            .aabb
            .union(&self.nodes[u2 as usize].aabb);
        self.nodes[upper as usize].height = 1 + self.nodes[lower as usize]
            .height
            .max(self.nodes[u2 as usize].height);
    }

    // ========================================================================
    // Rebuild
    // ========================================================================

    /// Rebuild the tree bottom-up by greedily pairing the cheapest unions.
    /// O(n²); meant for occasional offline use, not per-step calls.
    pub fn rebuild_bottom_up(&mut self) {
        let mut live: Vec<u32> = Vec::with_capacity(self.node_count);

        // Free internal nodes, keep leaves
        for i in 0..self.nodes.len() as u32 {
            if self.nodes[i as usize].height < 0 {
                continue;
            }
            if self.nodes[i as usize].is_leaf() {
                self.nodes[i as usize].parent_or_next = NULL_NODE;
                live.push(i);
            } else {
                self.free_node(i);
            }
        }

        if live.is_empty() {
            self.root = NULL_NODE;
            return;
        }

        while live.len() > 1 {
            let mut min_cost = f32::MAX;
            let (mut i_min, mut j_min) = (0usize, 1usize);
            for i in 0..live.len() {
                for j in i + 1..live.len() {
                    let cost = self.nodes[live[i] as usize]
                        .aabb
                        .union(&self.nodes[live[j] as usize].aabb)
                        .perimeter();
                    if cost < min_cost {
                        min_cost = cost;
                        i_min = i;
                        j_min = j;
                    }
                }
            }

            let child1 = live[i_min];
            let child2 = live[j_min];

            let parent = self.allocate_node();
            self.nodes[parent as usize].child1 = child1;
            self.nodes[parent as usize].child2 = child2;
            self.nodes[parent as usize].height = 1 + self.nodes[child1 as usize]
                .height
                .max(self.nodes[child2 as usize].height);
            self.nodes[parent as usize].aabb = self.nodes[child1 as usize]
                .aabb
                .union(&self.nodes[child2 as usize].aabb);
            self.nodes[parent as usize].parent_or_next = NULL_NODE;

            self.nodes[child1 as usize].parent_or_next = parent;
            self.nodes[child2 as usize].parent_or_next = parent;

            // swap_remove keeps this O(1); pairing order stays deterministic
            live[j_min] = live[live.len() - 1];
            live[i_min] = parent;
            live.pop();
        }

        self.root = live[0];
        debug_assert!(self.validate());
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Structural validation: parent/child symmetry, height arithmetic,
    /// AABB containment, and free-list accounting. Debug use only.
    pub fn validate(&self) -> bool {
        if !self.validate_structure(self.root) {
            return false;
        }
        if !self.validate_metrics(self.root) {
            return false;
        }

        // Every free node must be reachable and marked free
        let mut free_count = 0;
        let mut free_index = self.free_list;
        while free_index != NULL_NODE {
            if self.nodes[free_index as usize].height != -1 {
                return false;
            }
            free_index = self.nodes[free_index as usize].parent_or_next;
            free_count += 1;
        }

        if self.height() != self.compute_height(self.root) {
            return false;
        }

        self.node_count + free_count == self.nodes.len()
    }

    fn validate_structure(&self, index: u32) -> bool {
        if index == NULL_NODE {
            return true;
        }

        if index == self.root && self.nodes[index as usize].parent_or_next != NULL_NODE {
            return false;
        }

        let node = &self.nodes[index as usize];
        let child1 = node.child1;
        let child2 = node.child2;

        if node.is_leaf() {
            return child1 == NULL_NODE && child2 == NULL_NODE && node.height == 0;
        }

        if self.nodes[child1 as usize].parent_or_next != index {
            return false;
        }
        if self.nodes[child2 as usize].parent_or_next != index {
            return false;
        }

        self.validate_structure(child1) && self.validate_structure(child2)
    }

    fn validate_metrics(&self, index: u32) -> bool {
        if index == NULL_NODE {
            return true;
        }

        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return true;
        }

        let child1 = node.child1;
        let child2 = node.child2;

        let height1 = self.nodes[child1 as usize].height;
        let height2 = self.nodes[child2 as usize].height;
        if node.height != 1 + height1.max(height2) {
            return false;
        }

        let union = self.nodes[child1 as usize]
            .aabb
            .union(&self.nodes[child2 as usize].aabb);
        if union.min != node.aabb.min || union.max != node.aabb.max {
            return false;
        }

        self.validate_metrics(child1) && self.validate_metrics(child2)
    }

    fn compute_height(&self, index: u32) -> i32 {
        if index == NULL_NODE {
            return 0;
        }
        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return 0;
        }
        1 + self
            .compute_height(node.child1)
            .max(self.compute_height(node.child2))
    }
}

impl Default for DynamicTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::DeterministicRng;

    fn unit_aabb(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    fn query_all(tree: &DynamicTree, aabb: &Aabb) -> Vec<u32> {
        let mut hits = Vec::new();
        tree.query(aabb, |proxy| {
            hits.push(tree.user_data(proxy));
            true
        });
        hits.sort_unstable();
        hits
    }

    #[test]
    fn test_create_and_query() {
        let mut tree = DynamicTree::new();
        tree.create_proxy(unit_aabb(0.0, 0.0), 0);
        tree.create_proxy(unit_aabb(10.0, 10.0), 1);
        tree.create_proxy(unit_aabb(20.0, 20.0), 2);
        assert!(tree.validate());

        let hits = query_all(&tree, &unit_aabb(-0.5, -0.5));
        assert_eq!(hits, [0]);

        let all = query_all(
            &tree,
            &Aabb::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)),
        );
        assert_eq!(all, [0, 1, 2]);
    }

    #[test]
    fn test_destroy_proxy() {
        let mut tree = DynamicTree::new();
        let _a = tree.create_proxy(unit_aabb(0.0, 0.0), 0);
        let b = tree.create_proxy(unit_aabb(5.0, 5.0), 1);
        let _c = tree.create_proxy(unit_aabb(10.0, 10.0), 2);

        tree.destroy_proxy(b);
        assert!(tree.validate());

        let all = query_all(
            &tree,
            &Aabb::new(Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)),
        );
        assert_eq!(all, [0, 2]);
    }

    #[test]
    fn test_move_within_fat_bounds() {
        let mut tree = DynamicTree::new();
        let p = tree.create_proxy(unit_aabb(0.0, 0.0), 0);

        // A nudge smaller than the fat margin must not touch the tree
        let nudged = unit_aabb(0.05, 0.0);
        assert!(!tree.move_proxy(p, nudged, Vec2::new(0.05, 0.0)));

        // A long move must reinsert
        let far = unit_aabb(50.0, 0.0);
        assert!(tree.move_proxy(p, far, Vec2::new(50.0, 0.0)));
        assert!(tree.validate());
        assert_eq!(query_all(&tree, &unit_aabb(50.0, 0.0)), [0]);
    }

    #[test]
    fn test_move_shrinks_huge_aabb() {
        let mut tree = DynamicTree::new();
        let p = tree.create_proxy(unit_aabb(0.0, 0.0), 0);

        // A fast move inflates the envelope along the motion
        assert!(tree.move_proxy(p, unit_aabb(1.0, 0.0), Vec2::new(20.0, 0.0)));
        let inflated = tree.fat_aabb(p);
        assert!(inflated.max.x > 50.0);

        // Coming to rest: the tight AABB is inside the inflated one, but the
        // stored box is wastefully huge and must shrink
        assert!(tree.move_proxy(p, unit_aabb(1.0, 0.0), Vec2::ZERO));
        let rest = tree.fat_aabb(p);
        assert!(rest.max.x < inflated.max.x);
        assert!(tree.validate());
    }

    #[test]
    fn test_balance_under_sorted_insertion() {
        let mut tree = DynamicTree::new();
        for i in 0..256 {
            tree.create_proxy(unit_aabb(i as f32 * 2.0, 0.0), i);
        }
        assert!(tree.validate());
        // A degenerate list would have height 255
        assert!(tree.height() <= 16, "height = {}", tree.height());
    }

    #[test]
    fn test_random_operations_preserve_invariants() {
        let mut rng = DeterministicRng::new(0x5eed);
        let mut tree = DynamicTree::new();
        let mut live: Vec<u32> = Vec::new();

        for step in 0..500u32 {
            let roll = rng.next_u32() % 100;
            if roll < 50 || live.is_empty() {
                let x = (rng.next_u32() % 1000) as f32 / 10.0;
                let y = (rng.next_u32() % 1000) as f32 / 10.0;
                live.push(tree.create_proxy(unit_aabb(x, y), step));
            } else if roll < 75 {
                let idx = (rng.next_u32() as usize) % live.len();
                let p = live.swap_remove(idx);
                tree.destroy_proxy(p);
            } else {
                let idx = (rng.next_u32() as usize) % live.len();
                let x = (rng.next_u32() % 1000) as f32 / 10.0;
                let y = (rng.next_u32() % 1000) as f32 / 10.0;
                let d = Vec2::new(
                    (rng.next_u32() % 100) as f32 / 100.0 - 0.5,
                    (rng.next_u32() % 100) as f32 / 100.0 - 0.5,
                );
                tree.move_proxy(live[idx], unit_aabb(x, y), d);
            }

            assert!(tree.validate(), "invariants broken at step {step}");
        }
    }

    #[test]
    fn test_ray_cast_finds_proxy() {
        let mut tree = DynamicTree::new();
        tree.create_proxy(unit_aabb(5.0, -0.5), 7);
        tree.create_proxy(unit_aabb(5.0, 10.0), 8);

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(20.0, 0.0),
            max_fraction: 1.0,
        };
        let mut hits = Vec::new();
        tree.ray_cast(&input, |_, proxy| {
            hits.push(tree.user_data(proxy));
            1.0 // do not shorten
        });
        assert_eq!(hits, [7]);
    }

    #[test]
    fn test_ray_cast_shortening_stops_far_hits() {
        let mut tree = DynamicTree::new();
        tree.create_proxy(unit_aabb(5.0, -0.5), 0);
        tree.create_proxy(unit_aabb(15.0, -0.5), 1);

        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(100.0, 0.0),
            max_fraction: 1.0,
        };
        let mut hits = Vec::new();
        tree.ray_cast(&input, |sub, proxy| {
            hits.push(tree.user_data(proxy));
            // Clip the ray at this box's near face
            let near = tree.fat_aabb(proxy).min.x / 100.0;
            near.min(sub.max_fraction)
        });
        // The nearer box clips the ray before the farther one is reached;
        // traversal order may still surface the near one after exploring, so
        // only assert the far box is excluded once the ray is clipped.
        assert!(hits.contains(&0));
        assert!(!hits.contains(&1));
    }

    #[test]
    fn test_rebuild_bottom_up() {
        let mut tree = DynamicTree::new();
        for i in 0..32 {
            tree.create_proxy(unit_aabb(i as f32 * 3.0, (i % 5) as f32), i);
        }
        let before = query_all(
            &tree,
            &Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(100.0, 10.0)),
        );
        tree.rebuild_bottom_up();
        assert!(tree.validate());
        let after = query_all(
            &tree,
            &Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(100.0, 10.0)),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_shift_origin() {
        let mut tree = DynamicTree::new();
        tree.create_proxy(unit_aabb(10.0, 10.0), 0);
        tree.shift_origin(Vec2::new(10.0, 10.0));
        assert_eq!(query_all(&tree, &unit_aabb(0.0, 0.0)), [0]);
        assert!(tree.validate());
    }

    #[test]
    fn test_pool_growth() {
        let mut tree = DynamicTree::new();
        // Push well past the initial pool of 16
        for i in 0..200 {
            tree.create_proxy(unit_aabb(i as f32, 0.0), i);
        }
        assert!(tree.validate());
        assert!(tree.node_count() >= 200);
    }
}
