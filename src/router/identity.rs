//! The one piece of local state a routing node keeps: its own id and
//! advertised address, persisted via `terramesh_util::persister::Persister`
//! so a restart doesn't change where the node sits on the ring. On first
//! boot there's nothing to load, so the node registers itself with the
//! catalog and lets Postgres assign the id.

use serde::{Deserialize, Serialize};

use terramesh_catalog::{Catalog, RoutingServerInsert};
use terramesh_ring::RouterNode;
use terramesh_util::config::Config;
use terramesh_util::error::Error;
use terramesh_util::persister::Persister;

/// A node's priority among routers sharing a geohash prefix has no
/// configuration key of its own (spec.md §6 names only the keys listed in
/// `Config`); new nodes register at the lowest priority and an operator
/// raises it later via `terramesh server add` equivalent tooling if needed.
const DEFAULT_PRIORITY: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
	pub id: String,
	pub address: String,
}

pub fn load_or_register(
	persister: &Persister<Identity>,
	catalog: &Catalog,
	config: &Config,
) -> Result<RouterNode, Error> {
	if let Some(identity) = persister.load()? {
		return Ok(RouterNode::new(identity.id, identity.address, DEFAULT_PRIORITY));
	}

	let address = format!("{}:{}", config.listen_ip, config.listen_port);
	let router_id = catalog.insert_routing_server(&RoutingServerInsert {
		address: address.clone(),
		priority: DEFAULT_PRIORITY as i32,
		geohash_prefix: String::new(),
	})?;

	let identity = Identity { id: router_id.to_string(), address };
	persister.save(&identity)?;

	Ok(RouterNode::new(identity.id, identity.address, DEFAULT_PRIORITY))
}
