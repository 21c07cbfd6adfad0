//! Membership gossip: periodic fan-out, digest merge, and the
//! Alive/Suspect/Dead liveness state machine described in spec.md §4.2.
//! Runs on a single `std::thread`, not a tokio task — spec.md §5 rules out
//! cooperative scheduling everywhere in this workspace — reworked from the
//! teacher's `garage_rpc::system::System` status-exchange loop accordingly.

#[macro_use]
extern crate tracing;

pub mod state;
pub mod transport;

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use terramesh_ring::{Ring, RingHandle, RouterNode};
use terramesh_util::error::Error;
use terramesh_util::time::now_msec;

pub use state::PeerState;
pub use transport::{PeerTransport, TcpPeerTransport};

/// The full membership view exchanged in one gossip round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Digest {
	pub nodes: Vec<RouterNode>,
}

struct PeerRecord {
	node: RouterNode,
	state: PeerState,
}

pub struct GossipConfig {
	pub gossip_interval_ms: u64,
	pub fail_timeout_ms: u64,
	pub forget_timeout_ms: u64,
	pub fanout: usize,
}

impl GossipConfig {
	pub fn from_millis(gossip_interval_ms: u64, fail_timeout_ms: u64) -> Self {
		GossipConfig {
			gossip_interval_ms,
			fail_timeout_ms,
			forget_timeout_ms: fail_timeout_ms * 2,
			fanout: 2,
		}
	}
}

/// Cooperative shutdown signal, mirroring the condvar-guarded stop flag
/// spec.md §9 asks the dispatcher to use, reused here for the gossip
/// thread so shutdown doesn't wait out a full sleep interval.
#[derive(Default)]
pub struct StopSignal {
	stopped: Mutex<bool>,
	condvar: Condvar,
}

impl StopSignal {
	pub fn new() -> Arc<Self> {
		Arc::new(StopSignal::default())
	}

	pub fn stop(&self) {
		*self.stopped.lock().unwrap() = true;
		self.condvar.notify_all();
	}

	/// Sleeps up to `dur` or returns early if `stop()` is called.
	/// Returns `true` if a stop was observed.
	fn sleep(&self, dur: Duration) -> bool {
		let guard = self.stopped.lock().unwrap();
		if *guard {
			return true;
		}
		let (guard, _) = self.condvar.wait_timeout(guard, dur).unwrap();
		*guard
	}

	fn is_stopped(&self) -> bool {
		*self.stopped.lock().unwrap()
	}
}

pub struct GossipService {
	self_node: RouterNode,
	ring: Arc<RingHandle>,
	peers: Mutex<HashMap<String, PeerRecord>>,
	transport: Arc<dyn PeerTransport>,
	config: GossipConfig,
}

impl GossipService {
	pub fn new(
		self_node: RouterNode,
		ring: Arc<RingHandle>,
		transport: Arc<dyn PeerTransport>,
		config: GossipConfig,
	) -> Arc<Self> {
		let mut peers = HashMap::new();
		peers.insert(
			self_node.id.clone(),
			PeerRecord {
				node: self_node.clone(),
				state: PeerState::Alive,
			},
		);
		Arc::new(GossipService {
			self_node,
			ring,
			peers: Mutex::new(peers),
			transport,
			config,
		})
	}

	pub fn self_node(&self) -> &RouterNode {
		&self.self_node
	}

	/// Seeds the peer table from the catalog at startup (spec.md §6:
	/// "Routing state (Ring) is reconstructed from the catalog at
	/// startup, then evolved via gossip").
	pub fn seed(&self, nodes: Vec<RouterNode>) {
		let digest = Digest { nodes };
		self.merge_digest(digest);
	}

	/// Merges an incoming digest: newer `last_seen` wins per record,
	/// unknown ids are added, then the ring is rebuilt from the surviving
	/// active peers and published.
	pub fn merge_digest(&self, digest: Digest) {
		let mut peers = self.peers.lock().unwrap();
		for incoming in digest.nodes {
			match peers.get_mut(&incoming.id) {
				Some(existing) if existing.node.last_seen >= incoming.last_seen => {
					// our record is at least as fresh, keep it
				}
				Some(existing) => {
					existing.node = incoming;
					existing.state = existing.state.on_contact();
				}
				None => {
					peers.insert(
						incoming.id.clone(),
						PeerRecord {
							node: incoming,
							state: PeerState::Alive,
						},
					);
				}
			}
		}
		self.rebuild_ring(&peers);
	}

	fn rebuild_ring(&self, peers: &HashMap<String, PeerRecord>) {
		let active: Vec<RouterNode> = peers
			.values()
			.filter(|p| p.state != PeerState::Dead)
			.map(|p| p.node.clone())
			.collect();
		self.ring.store(Ring::new(active));
	}

	/// Sweeps every peer's silence against T_fail/T_forget, transitioning
	/// state and dropping forgotten records. Returns the ids that were
	/// newly marked Dead, for logging.
	fn sweep_liveness(&self) -> Vec<String> {
		let mut peers = self.peers.lock().unwrap();
		let now = now_msec();
		let mut newly_dead = Vec::new();
		let self_id = self.self_node.id.clone();
		peers.retain(|id, record| {
			if *id == self_id {
				return true;
			}
			let silence = now.saturating_sub(record.node.last_seen);
			if silence >= self.config.forget_timeout_ms {
				return false;
			}
			let next = record
				.state
				.after_silence(silence, self.config.gossip_interval_ms, self.config.fail_timeout_ms);
			if next == PeerState::Dead && record.state != PeerState::Dead {
				newly_dead.push(id.clone());
			}
			record.state = next;
			true
		});
		self.rebuild_ring(&peers);
		newly_dead
	}

	fn alive_peer_addresses(&self, exclude_self: bool) -> Vec<(String, String)> {
		let peers = self.peers.lock().unwrap();
		peers
			.values()
			.filter(|p| p.state != PeerState::Dead && (!exclude_self || p.node.id != self.self_node.id))
			.map(|p| (p.node.id.clone(), p.node.address.clone()))
			.collect()
	}

	fn current_digest(&self) -> Digest {
		let peers = self.peers.lock().unwrap();
		Digest {
			nodes: peers.values().map(|p| p.node.clone()).collect(),
		}
	}

	/// A random subset of at most `fanout` alive peers, mirroring
	/// `select_random_neighbors` in
	/// `original_source/routing_server/gossip.cpp`'s `gossip_broadcast`,
	/// which every announcement (digest, join, leave) fans out through.
	fn random_peer_subset(&self) -> Vec<(String, String)> {
		let mut candidates = self.alive_peer_addresses(true);
		let mut rng = rand::thread_rng();
		candidates.shuffle(&mut rng);
		candidates.truncate(self.config.fanout);
		candidates
	}

	fn fanout_round(&self) {
		let digest = self.current_digest();
		for (id, address) in self.random_peer_subset() {
			if let Err(e) = self.transport.send_digest(&address, &digest) {
				warn!("gossip send to {} ({}) failed: {}", id, address, e);
			}
		}
	}

	/// Forwards an arbitrary method/path/body to a random subset of peers.
	/// Used by the dispatcher to propagate `/router/add`, `/router/remove`,
	/// `/server/add` and `/server/remove` the same way the original's
	/// `gossip_broadcast` propagates any mutation, not just membership
	/// digests.
	pub fn broadcast(&self, method: &str, path: &str, body: &[u8]) {
		for (id, address) in self.random_peer_subset() {
			if let Err(e) = self.transport.send_request(&address, method, path, body) {
				warn!("broadcast {} {} to {} ({}) failed: {}", method, path, id, address, e);
			}
		}
	}

	/// Runs the fan-out/liveness loop on the calling thread until `stop`
	/// is signalled. Intended to be spawned via `std::thread::spawn`.
	pub fn run(self: Arc<Self>, stop: Arc<StopSignal>) {
		info!("gossip loop starting, interval={}ms", self.config.gossip_interval_ms);
		while !stop.is_stopped() {
			self.fanout_round();
			let dead = self.sweep_liveness();
			for id in dead {
				warn!("peer {} marked dead", id);
			}
			if stop.sleep(Duration::from_millis(self.config.gossip_interval_ms)) {
				break;
			}
		}
		info!("gossip loop stopped");
	}

	/// `POST /router/add` to one bootstrap peer, per spec.md §4.2's join
	/// protocol. The peer is responsible for writing the new node to the
	/// catalog and broadcasting it onward.
	pub fn announce_join(&self, bootstrap_peer: &str) -> Result<(), Error> {
		let body = serde_json::to_vec(&self.self_node)?;
		self.transport.send_request(bootstrap_peer, "POST", "/router/add", &body)
	}

	/// `DELETE /router/remove/{id}` to a random subset of peers, per
	/// spec.md §4.2's clean-shutdown leave protocol. Best-effort: failures
	/// are logged, not retried, since the process is exiting anyway.
	pub fn announce_leave(&self) {
		let path = format!("/router/remove/{}", self.self_node.id);
		self.broadcast("DELETE", &path, b"");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex as StdMutex;

	fn node(id: &str, last_seen: u64) -> RouterNode {
		let mut n = RouterNode::new(id.into(), format!("{}:3902", id), 1);
		n.last_seen = last_seen;
		n
	}

	struct NullTransport {
		sent: AtomicUsize,
		last: StdMutex<Vec<(String, String)>>,
	}

	impl PeerTransport for NullTransport {
		fn send_digest(&self, peer_address: &str, digest: &Digest) -> Result<(), Error> {
			self.sent.fetch_add(1, Ordering::SeqCst);
			self.last
				.lock()
				.unwrap()
				.push((peer_address.to_string(), format!("{} nodes", digest.nodes.len())));
			Ok(())
		}
		fn send_request(&self, _peer_address: &str, _method: &str, _path: &str, _body: &[u8]) -> Result<(), Error> {
			Ok(())
		}
	}

	fn service_with(self_node: RouterNode) -> (Arc<GossipService>, Arc<NullTransport>) {
		let transport = Arc::new(NullTransport {
			sent: AtomicUsize::new(0),
			last: StdMutex::new(Vec::new()),
		});
		let ring = Arc::new(RingHandle::new(Ring::new(vec![self_node.clone()])));
		let config = GossipConfig::from_millis(5_000, 15_000);
		let svc = GossipService::new(self_node, ring, transport.clone(), config);
		(svc, transport)
	}

	#[test]
	fn merging_newer_record_wins() {
		let (svc, _t) = service_with(node("self", 0));
		svc.merge_digest(Digest {
			nodes: vec![node("peer", 100)],
		});
		assert_eq!(svc.ring.snapshot().len(), 2);

		// stale update (older last_seen) is ignored
		svc.merge_digest(Digest {
			nodes: vec![node("peer", 1)],
		});
		let peers = svc.peers.lock().unwrap();
		assert_eq!(peers.get("peer").unwrap().node.last_seen, 100);
	}

	/// Scenario 6 from spec.md §8: once silence exceeds T_forget, a peer
	/// is dropped from the ring entirely, and its former arc is absorbed
	/// by its successor (the ring simply has one fewer node).
	#[test]
	fn forgotten_peer_leaves_the_ring() {
		let ring = Arc::new(RingHandle::new(Ring::new(vec![node("self", 0)])));
		let transport = Arc::new(NullTransport {
			sent: AtomicUsize::new(0),
			last: StdMutex::new(Vec::new()),
		});
		// forget_timeout_ms = 0: any elapsed time at all forgets the peer,
		// making the test deterministic without sleeping past real timeouts.
		let config = GossipConfig {
			gossip_interval_ms: 5_000,
			fail_timeout_ms: 15_000,
			forget_timeout_ms: 0,
			fanout: 2,
		};
		let svc = GossipService::new(node("self", 0), ring, transport, config);
		svc.merge_digest(Digest {
			nodes: vec![node("leaving", 0)],
		});
		assert_eq!(svc.ring.snapshot().len(), 2);

		std::thread::sleep(Duration::from_millis(2));
		svc.sweep_liveness();
		assert!(svc.ring.snapshot().nodes().iter().all(|n| n.id != "leaving"));
	}

	#[test]
	fn fanout_sends_to_at_most_k_peers() {
		let (svc, transport) = service_with(node("self", 0));
		svc.merge_digest(Digest {
			nodes: vec![node("a", 1), node("b", 1), node("c", 1)],
		});
		svc.fanout_round();
		assert!(transport.sent.load(Ordering::SeqCst) <= 2);
	}
}
