//! Process wiring for `terramesh server`: loads configuration, reconstructs
//! ring membership from the catalog, starts the gossip thread and the
//! dispatcher, and runs until a shutdown signal arrives. Mirrors the shape
//! of `garage::server::run_server`, but without a tokio runtime — every
//! long-lived piece here is its own `std::thread`.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use terramesh_catalog::Catalog;
use terramesh_dispatcher::Dispatcher;
use terramesh_gossip::{GossipConfig, GossipService, StopSignal, TcpPeerTransport};
use terramesh_ring::{Ring, RingHandle, RouterNode};
use terramesh_util::config::Config;
use terramesh_util::error::Error;
use terramesh_util::persister::Persister;

use crate::identity::{self, Identity};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Split from `run_server` so the caller can map a config error to exit
/// code 2 ("invalid configuration") and everything past it to exit code 1
/// ("startup failure"), per spec.md §6.
pub fn load_config(config_file: &PathBuf) -> Result<Config, Error> {
	Config::read(config_file)
}

pub fn run_server(config_file: PathBuf, config: Config) -> Result<(), Error> {
	let config = Arc::new(config);
	info!("starting terramesh, listening on {}:{}", config.listen_ip, config.listen_port);

	let catalog = Arc::new(Catalog::connect(&config.catalog_dsn)?);

	// no dedicated metadata_dir config key (spec.md §6 names only the
	// catalog/network keys); the identity file lives next to the config.
	let base_dir = config_file.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("."));
	let persister: Persister<Identity> = Persister::new(&base_dir, "node_identity.json");
	let self_node = identity::load_or_register(&persister, &catalog, &config)?;
	info!("node identity: id={} address={}", self_node.id, self_node.address);

	let existing = catalog.get_all_routing_servers()?;
	let ring_nodes: Vec<RouterNode> = existing
		.iter()
		.filter(|row| row.router_id.to_string() != self_node.id)
		.map(|row| {
			let mut node = RouterNode::new(row.router_id.to_string(), row.address.clone(), row.priority as u8);
			node.last_seen = terramesh_util::time::now_msec();
			node
		})
		.collect();

	let ring = Arc::new(RingHandle::new(Ring::new(vec![self_node.clone()])));
	let transport = Arc::new(TcpPeerTransport::new(CONNECT_TIMEOUT));
	let gossip_config = GossipConfig::from_millis(config.gossip_interval_ms, config.failure_timeout_ms);
	let gossip = GossipService::new(self_node, ring.clone(), transport, gossip_config);
	gossip.seed(ring_nodes);

	let stop_signal = StopSignal::new();
	let gossip_for_thread = gossip.clone();
	let stop_for_gossip = stop_signal.clone();
	let gossip_thread = std::thread::Builder::new()
		.name("terramesh-gossip".into())
		.spawn(move || gossip_for_thread.run(stop_for_gossip))
		.map_err(|e| Error::Fatal(format!("cannot spawn gossip thread: {}", e)))?;

	let dispatcher = Dispatcher::start(config.clone(), ring, catalog, gossip.clone())?;
	info!("terramesh is up");

	wait_for_shutdown_signal()?;
	info!("shutdown signal received, draining in-flight requests");

	gossip.announce_leave();
	stop_signal.stop();
	dispatcher.shutdown();
	let _ = gossip_thread.join();

	info!("clean shutdown");
	Ok(())
}

fn wait_for_shutdown_signal() -> Result<(), Error> {
	let (tx, rx) = mpsc::channel();
	ctrlc::set_handler(move || {
		let _ = tx.send(());
	})
	.map_err(|e| Error::Fatal(format!("cannot install signal handler: {}", e)))?;
	rx.recv().map_err(|e| Error::Fatal(format!("signal channel closed: {}", e)))
}
