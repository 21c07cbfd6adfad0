//! Process-wide accept loop, worker pool, and handler table for the
//! routing tier's HTTP surface (spec.md §4.6). `DispatcherCtx` replaces
//! the original's module-level globals with one struct passed around as
//! `Arc<DispatcherCtx>`, per spec.md §9.

#[macro_use]
extern crate tracing;

pub mod ctx;

mod accept;
mod relay;
mod routes;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use mio::net::TcpListener;
use mio::{Poll, Waker};

pub use ctx::DispatcherCtx;

use terramesh_catalog::Catalog;
use terramesh_gossip::GossipService;
use terramesh_ring::RingHandle;
use terramesh_util::config::Config;
use terramesh_util::error::Error;

const WAKER_TOKEN: mio::Token = mio::Token(1);

pub struct Dispatcher {
	ctx: Arc<DispatcherCtx>,
	waker: Arc<Waker>,
	accept_thread: Option<JoinHandle<()>>,
	workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
	/// Binds the listening socket and spawns the accept thread plus
	/// `config.workers_count` worker threads. Mirrors `routing_server_run`
	/// creating its master socket and worker pthreads up front.
	pub fn start(
		config: Arc<Config>,
		ring: Arc<RingHandle>,
		catalog: Arc<Catalog>,
		gossip: Arc<GossipService>,
	) -> Result<Self, Error> {
		let addr: SocketAddr = format!("{}:{}", config.listen_ip, config.listen_port)
			.parse()
			.map_err(|e| Error::Fatal(format!("invalid listen address: {}", e)))?;
		let listener =
			TcpListener::bind(addr).map_err(|e| Error::Fatal(format!("cannot bind {}: {}", addr, e)))?;

		let poll = Poll::new().map_err(|e| Error::Fatal(format!("cannot create poller: {}", e)))?;
		let waker = Arc::new(
			Waker::new(poll.registry(), WAKER_TOKEN)
				.map_err(|e| Error::Fatal(format!("cannot create waker: {}", e)))?,
		);

		let workers_count = config.workers_count;
		let ctx = DispatcherCtx::new(ring, catalog, gossip, config);

		let accept_ctx = ctx.clone();
		let accept_waker = waker.clone();
		let accept_thread = std::thread::spawn(move || {
			if let Err(e) = accept::run(accept_ctx, listener, poll, accept_waker) {
				error!("accept loop exited with error: {}", e);
			}
		});

		let mut workers = Vec::with_capacity(workers_count);
		for i in 0..workers_count {
			let worker_ctx = ctx.clone();
			workers.push(
				std::thread::Builder::new()
					.name(format!("terramesh-worker-{}", i))
					.spawn(move || worker::run(worker_ctx))
					.map_err(|e| Error::Fatal(format!("cannot spawn worker thread: {}", e)))?,
			);
		}

		Ok(Dispatcher { ctx, waker, accept_thread: Some(accept_thread), workers })
	}

	pub fn ctx(&self) -> &Arc<DispatcherCtx> {
		&self.ctx
	}

	/// Sets the stop flag, wakes the accept thread out of its poll, and
	/// broadcasts on the FIFO condvar so every worker observes the flag,
	/// per spec.md §4.6's shutdown sequence.
	pub fn shutdown(mut self) {
		self.ctx.shutdown();
		let _ = self.waker.wake();
		if let Some(handle) = self.accept_thread.take() {
			let _ = handle.join();
		}
		for worker in self.workers.drain(..) {
			let _ = worker.join();
		}
	}
}
