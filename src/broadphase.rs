//! Broad Phase
//!
//! Wraps the dynamic tree with move tracking and pair generation. Proxies
//! that moved since the last pass are queried against the tree; the
//! resulting candidate pairs are sorted, deduplicated, and handed to the
//! contact manager once per step.

use crate::collider::{Aabb, RayCastInput};
use crate::dynamic_bvh::DynamicTree;
use crate::math::Vec2;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Broad-phase pair generator over a dynamic AABB tree
pub struct BroadPhase {
    tree: DynamicTree,
    move_buffer: Vec<u32>,
    pair_buffer: Vec<(u32, u32)>,
    proxy_count: usize,
}

impl BroadPhase {
    /// Create an empty broad phase
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
            proxy_count: 0,
        }
    }

    /// Number of live proxies
    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Create a proxy and schedule it for pairing
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: u32) -> u32 {
        let proxy_id = self.tree.create_proxy(aabb, user_data);
        self.proxy_count += 1;
        self.buffer_move(proxy_id);
        proxy_id
    }

    /// Destroy a proxy
    pub fn destroy_proxy(&mut self, proxy_id: u32) {
        self.unbuffer_move(proxy_id);
        self.proxy_count -= 1;
        self.tree.destroy_proxy(proxy_id);
    }

    /// Move a proxy; schedules pairing only when the tree actually changed
    pub fn move_proxy(&mut self, proxy_id: u32, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(proxy_id, aabb, displacement) {
            self.buffer_move(proxy_id);
        }
    }

    /// Force re-pairing of a proxy whose filter or contacts changed
    pub fn touch_proxy(&mut self, proxy_id: u32) {
        self.buffer_move(proxy_id);
    }

    /// Stored fat AABB of a proxy
    #[inline]
    pub fn fat_aabb(&self, proxy_id: u32) -> Aabb {
        self.tree.fat_aabb(proxy_id)
    }

    /// Proxy payload
    #[inline]
    pub fn user_data(&self, proxy_id: u32) -> u32 {
        self.tree.user_data(proxy_id)
    }

    /// Fat-AABB overlap test between two proxies
    #[inline]
    pub fn test_overlap(&self, proxy_a: u32, proxy_b: u32) -> bool {
        self.tree
            .fat_aabb(proxy_a)
            .intersects(&self.tree.fat_aabb(proxy_b))
    }

    fn buffer_move(&mut self, proxy_id: u32) {
        self.move_buffer.push(proxy_id);
    }

    fn unbuffer_move(&mut self, proxy_id: u32) {
        self.move_buffer.retain(|&id| id != proxy_id);
    }

    /// Generate candidate pairs for every proxy that moved and feed them to
    /// `callback` as `(user_data_a, user_data_b)`, each unordered pair once.
    pub fn update_pairs<F: FnMut(u32, u32)>(&mut self, mut callback: F) {
        self.pair_buffer.clear();

        for i in 0..self.move_buffer.len() {
            let query_proxy = self.move_buffer[i];
            let fat_aabb = self.tree.fat_aabb(query_proxy);

            let tree = &self.tree;
            let pairs = &mut self.pair_buffer;
            tree.query(&fat_aabb, |proxy| {
                if proxy == query_proxy {
                    return true;
                }
                // When both proxies moved, only the smaller id emits the
                // pair; the larger id's own query would duplicate it.
                if tree.was_moved(proxy) && proxy > query_proxy {
                    return true;
                }
                let pair = if proxy < query_proxy {
                    (proxy, query_proxy)
                } else {
                    (query_proxy, proxy)
                };
                pairs.push(pair);
                true
            });
        }

        for i in 0..self.move_buffer.len() {
            self.tree.clear_moved(self.move_buffer[i]);
        }
        self.move_buffer.clear();

        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        for &(a, b) in &self.pair_buffer {
            callback(self.tree.user_data(a), self.tree.user_data(b));
        }
    }

    /// AABB query against the tree; callback returns false to stop
    pub fn query<F: FnMut(u32) -> bool>(&self, aabb: &Aabb, callback: F) {
        self.tree.query(aabb, callback);
    }

    /// Ray cast against the tree (see [`DynamicTree::ray_cast`])
    pub fn ray_cast<F: FnMut(&RayCastInput, u32) -> f32>(
        &self,
        input: &RayCastInput,
        callback: F,
    ) {
        self.tree.ray_cast(input, callback);
    }

    /// Shift the broad-phase origin
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }

    /// Debug access to the underlying tree
    #[inline]
    pub fn tree(&self) -> &DynamicTree {
        &self.tree
    }
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_aabb(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + 1.0, y + 1.0))
    }

    fn collect_pairs(bp: &mut BroadPhase) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push(if a < b { (a, b) } else { (b, a) }));
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn test_overlapping_pair_reported() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(unit_aabb(0.0, 0.0), 10);
        bp.create_proxy(unit_aabb(0.5, 0.0), 20);
        bp.create_proxy(unit_aabb(50.0, 0.0), 30);

        let pairs = collect_pairs(&mut bp);
        assert_eq!(pairs, [(10, 20)]);
    }

    #[test]
    fn test_no_duplicate_pairs() {
        let mut bp = BroadPhase::new();
        // Both proxies in the move buffer: each queries the other
        bp.create_proxy(unit_aabb(0.0, 0.0), 1);
        bp.create_proxy(unit_aabb(0.2, 0.2), 2);

        let mut count = 0;
        bp.update_pairs(|_, _| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_resting_pair_not_rereported() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_aabb(0.0, 0.0), 1);
        bp.create_proxy(unit_aabb(0.5, 0.0), 2);

        assert_eq!(collect_pairs(&mut bp).len(), 1);

        // No motion: second pass reports nothing
        assert!(collect_pairs(&mut bp).is_empty());

        // A small move that stays within the fat bounds also reports nothing
        bp.move_proxy(a, unit_aabb(0.01, 0.0), Vec2::new(0.01, 0.0));
        assert!(collect_pairs(&mut bp).is_empty());
    }

    #[test]
    fn test_move_into_overlap() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_aabb(0.0, 0.0), 1);
        bp.create_proxy(unit_aabb(10.0, 0.0), 2);
        assert!(collect_pairs(&mut bp).is_empty());

        bp.move_proxy(a, unit_aabb(9.5, 0.0), Vec2::new(9.5, 0.0));
        assert_eq!(collect_pairs(&mut bp), [(1, 2)]);
    }

    #[test]
    fn test_touch_proxy_repairs() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_aabb(0.0, 0.0), 1);
        bp.create_proxy(unit_aabb(0.5, 0.0), 2);
        collect_pairs(&mut bp);

        // Touch forces the pair to be reported again without any motion
        bp.touch_proxy(a);
        assert_eq!(collect_pairs(&mut bp), [(1, 2)]);
    }

    #[test]
    fn test_destroy_removes_from_pairs() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_aabb(0.0, 0.0), 1);
        let b = bp.create_proxy(unit_aabb(0.5, 0.0), 2);
        collect_pairs(&mut bp);

        bp.destroy_proxy(b);
        bp.touch_proxy(a);
        assert!(collect_pairs(&mut bp).is_empty());
        assert_eq!(bp.proxy_count(), 1);
    }
}
