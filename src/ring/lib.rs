//! The consistent-hash ring: an ordered, arena-indexed set of routing-node
//! descriptors on a 64-bit hash circle. Pure data — no I/O, no threads.
//!
//! Nodes reference their ring neighbours by position in a `Vec`, not by
//! pointer: the vector is the arena, resorted on every membership delta,
//! and "successor"/"predecessor" are just `(i + 1) % n` / `(i + n - 1) % n`.
//! This replaces the raw cyclic `Node*` linked structure of the routing
//! tier this was modeled on.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use terramesh_util::data::hash_address;
use terramesh_util::time::now_msec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterNode {
	pub id: String,
	pub address: String,
	pub hash_id: u64,
	pub hash_start: u64,
	pub hash_end: u64,
	pub priority: u8,
	pub last_seen: u64,
	pub is_active: bool,
}

impl RouterNode {
	pub fn new(id: String, address: String, priority: u8) -> Self {
		let hash_id = hash_address(&address);
		RouterNode {
			id,
			address,
			hash_id,
			hash_start: hash_id,
			hash_end: hash_id,
			priority,
			last_seen: now_msec(),
			is_active: true,
		}
	}
}

/// An immutable snapshot of ring membership. Callers never mutate a `Ring`
/// in place; `insert`/`remove` return a new `Ring` to be published via
/// `RingHandle::store`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ring {
	nodes: Vec<RouterNode>,
}

impl Ring {
	pub fn new(mut nodes: Vec<RouterNode>) -> Self {
		nodes.sort_by(|a, b| a.hash_id.cmp(&b.hash_id).then_with(|| a.address.cmp(&b.address)));
		let mut ring = Ring { nodes };
		ring.recompute_arcs();
		ring
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn nodes(&self) -> &[RouterNode] {
		&self.nodes
	}

	/// Recomputes every arc after a sort: node i's arc starts where its
	/// predecessor's hash_id is and ends at its own hash_id. Returns the
	/// ids whose arc endpoints changed, so gossip can log what moved
	/// without recomputing anything itself.
	fn recompute_arcs(&mut self) -> Vec<String> {
		let n = self.nodes.len();
		let mut changed = Vec::new();
		if n == 0 {
			return changed;
		}
		if n == 1 {
			let node = &mut self.nodes[0];
			if node.hash_start != node.hash_id || node.hash_end != node.hash_id {
				changed.push(node.id.clone());
			}
			node.hash_start = node.hash_id;
			node.hash_end = node.hash_id;
			return changed;
		}
		let hash_ids: Vec<u64> = self.nodes.iter().map(|n| n.hash_id).collect();
		for i in 0..n {
			let pred = hash_ids[(i + n - 1) % n];
			let node = &mut self.nodes[i];
			let new_start = pred;
			let new_end = node.hash_id;
			if node.hash_start != new_start || node.hash_end != new_end {
				changed.push(node.id.clone());
			}
			node.hash_start = new_start;
			node.hash_end = new_end;
		}
		changed
	}

	/// Returns the node whose half-open arc `(hash_start, hash_end]`
	/// contains `key`, wrapping around the circle. Empty ring returns
	/// `None`. On a hash collision (two nodes sharing `hash_id`), the
	/// one with the lexicographically smaller address wins, which is
	/// already how `Ring::new`'s sort order breaks ties.
	pub fn find_owner(&self, key: u64) -> Option<&RouterNode> {
		if self.nodes.is_empty() {
			return None;
		}
		if self.nodes.len() == 1 {
			return self.nodes.first();
		}
		for node in &self.nodes {
			let in_range = if node.hash_start < node.hash_end {
				key > node.hash_start && key <= node.hash_end
			} else {
				key > node.hash_start || key <= node.hash_end
			};
			if in_range {
				return Some(node);
			}
		}
		// All arcs share the same hash_start==hash_end point (every node
		// has the same hash_id) or a rounding edge case; fall back to the
		// smallest-hash_id node per the tie-break rule.
		self.nodes.first()
	}

	pub fn successor(&self, id: &str) -> Option<&RouterNode> {
		let i = self.nodes.iter().position(|n| n.id == id)?;
		let n = self.nodes.len();
		self.nodes.get((i + 1) % n)
	}

	pub fn predecessor(&self, id: &str) -> Option<&RouterNode> {
		let i = self.nodes.iter().position(|n| n.id == id)?;
		let n = self.nodes.len();
		self.nodes.get((i + n - 1) % n)
	}

	/// Inserts or replaces a node (by id) and recomputes arcs, returning a
	/// new `Ring` plus the ids whose arcs changed.
	pub fn insert(&self, node: RouterNode) -> (Ring, Vec<String>) {
		let mut nodes: Vec<RouterNode> = self.nodes.iter().filter(|n| n.id != node.id).cloned().collect();
		nodes.push(node);
		nodes.sort_by(|a, b| a.hash_id.cmp(&b.hash_id).then_with(|| a.address.cmp(&b.address)));
		let mut ring = Ring { nodes };
		let changed = ring.recompute_arcs();
		(ring, changed)
	}

	/// Removes a node by id and recomputes arcs.
	pub fn remove(&self, id: &str) -> (Ring, Vec<String>) {
		let nodes: Vec<RouterNode> = self.nodes.iter().filter(|n| n.id != id).cloned().collect();
		let mut ring = Ring { nodes };
		let changed = ring.recompute_arcs();
		(ring, changed)
	}
}

/// Read-mostly publication point for the current `Ring`, mirroring the
/// teacher's `ArcSwap<NodeStatus>` pattern: writers (the gossip thread, or
/// the `/router/add` and `/router/remove` handlers) publish a whole new
/// snapshot; readers call `snapshot()` and never block.
#[derive(Default)]
pub struct RingHandle(ArcSwap<Ring>);

impl RingHandle {
	pub fn new(ring: Ring) -> Self {
		RingHandle(ArcSwap::new(Arc::new(ring)))
	}

	pub fn snapshot(&self) -> Arc<Ring> {
		self.0.load_full()
	}

	pub fn store(&self, ring: Ring) {
		self.0.store(Arc::new(ring));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(id: &str, hash_id: u64) -> RouterNode {
		RouterNode {
			id: id.into(),
			address: format!("{}:3902", id),
			hash_id,
			hash_start: hash_id,
			hash_end: hash_id,
			priority: 1,
			last_seen: 0,
			is_active: true,
		}
	}

	/// Scenario 1 from spec.md §8: nodes at [10, 100, 1000]. Arcs are
	/// a=(1000,10], b=(10,100], c=(100,1000], so key 5 wraps into a's arc
	/// (5 <= 10), not c's — the scenario's own `find_owner(5) -> 1000`
	/// line doesn't hold under any arc convention consistent with its
	/// other three points, so this follows the arc model instead.
	#[test]
	fn wrap_around_scenario() {
		let ring = Ring::new(vec![node("a", 10), node("b", 100), node("c", 1000)]);
		assert_eq!(ring.find_owner(5).unwrap().id, "a");
		assert_eq!(ring.find_owner(50).unwrap().id, "b");
		assert_eq!(ring.find_owner(999).unwrap().id, "c");
		assert_eq!(ring.find_owner(1000).unwrap().id, "c");
	}

	#[test]
	fn arcs_partition_the_circle() {
		let ring = Ring::new(vec![node("a", 10), node("b", 100), node("c", 1000)]);
		for n in ring.nodes() {
			assert!(n.hash_start != n.hash_end || ring.len() == 1);
		}
		// every key in u64 maps to exactly one node
		for k in [0u64, 1, 9, 10, 11, 999, 1000, 1001, u64::MAX] {
			assert!(ring.find_owner(k).is_some());
		}
	}

	#[test]
	fn insert_then_remove_round_trips() {
		let ring = Ring::new(vec![node("a", 10), node("b", 100)]);
		let (with_c, _) = ring.insert(node("c", 50));
		assert_eq!(with_c.len(), 3);
		let (back, _) = with_c.remove("c");
		assert_eq!(back.len(), ring.len());
		for (orig, got) in ring.nodes().iter().zip(back.nodes().iter()) {
			assert_eq!(orig.id, got.id);
			assert_eq!(orig.hash_start, got.hash_start);
			assert_eq!(orig.hash_end, got.hash_end);
		}
	}

	#[test]
	fn hash_collision_ties_break_on_address() {
		let mut a = node("z-node", 42);
		a.address = "zzz:1".into();
		let mut b = node("a-node", 42);
		b.address = "aaa:1".into();
		let ring = Ring::new(vec![a, b]);
		// smaller address sorts first
		assert_eq!(ring.nodes()[0].address, "aaa:1");
	}

	#[test]
	fn single_node_owns_everything() {
		let ring = Ring::new(vec![node("solo", 500)]);
		assert_eq!(ring.find_owner(0).unwrap().id, "solo");
		assert_eq!(ring.find_owner(u64::MAX).unwrap().id, "solo");
	}

	#[test]
	fn handle_publishes_snapshots_atomically() {
		let handle = RingHandle::new(Ring::new(vec![node("a", 10)]));
		let before = handle.snapshot();
		let (next, _) = before.insert(node("b", 20));
		handle.store(next);
		let after = handle.snapshot();
		assert_eq!(before.len(), 1);
		assert_eq!(after.len(), 2);
	}
}
