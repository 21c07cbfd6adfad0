//! Replaces the original's module-level globals (`g_routing_server_stop`,
//! `g_handle_socks`, `g_condvar`) with one struct, per spec.md §9's
//! `DispatcherCtx` directive. Cloned as `Arc<DispatcherCtx>` into the
//! accept thread and every worker.

use std::collections::VecDeque;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use terramesh_catalog::Catalog;
use terramesh_gossip::GossipService;
use terramesh_ring::RingHandle;
use terramesh_util::config::Config;

/// Bounds how many accepted-but-unprocessed sockets can queue up before
/// the accept thread starts dropping new connections, per spec.md §4.6's
/// "shared bounded FIFO".
const FIFO_CAPACITY: usize = 1024;

pub struct DispatcherCtx {
	pub ring: Arc<RingHandle>,
	pub catalog: Arc<Catalog>,
	pub gossip: Arc<GossipService>,
	pub config: Arc<Config>,

	stop: AtomicBool,
	fifo: Mutex<VecDeque<TcpStream>>,
	condvar: Condvar,
}

impl DispatcherCtx {
	pub fn new(
		ring: Arc<RingHandle>,
		catalog: Arc<Catalog>,
		gossip: Arc<GossipService>,
		config: Arc<Config>,
	) -> Arc<Self> {
		Arc::new(DispatcherCtx {
			ring,
			catalog,
			gossip,
			config,
			stop: AtomicBool::new(false),
			fifo: Mutex::new(VecDeque::new()),
			condvar: Condvar::new(),
		})
	}

	pub fn is_stopped(&self) -> bool {
		self.stop.load(Ordering::SeqCst)
	}

	/// Sets the stop flag and wakes every worker blocked on the FIFO's
	/// condvar, per spec.md §4.6's shutdown sequence ("before joining
	/// workers, the dispatcher broadcasts on the condvar").
	pub fn shutdown(&self) {
		self.stop.store(true, Ordering::SeqCst);
		self.condvar.notify_all();
	}

	/// Pushes a ready socket onto the FIFO and wakes one waiting worker.
	/// Drops the connection instead of growing past `FIFO_CAPACITY`.
	pub fn enqueue(&self, stream: TcpStream) {
		let mut fifo = self.fifo.lock().unwrap();
		if fifo.len() >= FIFO_CAPACITY {
			warn!("dispatcher FIFO at capacity, dropping connection");
			return;
		}
		fifo.push_back(stream);
		self.condvar.notify_one();
	}

	/// Blocks until a socket is available or shutdown is signalled.
	pub fn dequeue(&self) -> Option<TcpStream> {
		let mut fifo = self.fifo.lock().unwrap();
		loop {
			if let Some(stream) = fifo.pop_front() {
				return Some(stream);
			}
			if self.is_stopped() {
				return None;
			}
			// the mutex is released for the duration of the wait, matching
			// spec.md §5's "mutex is released around socket I/O" discipline
			fifo = self.condvar.wait_timeout(fifo, Duration::from_millis(500)).unwrap().0;
		}
	}
}
