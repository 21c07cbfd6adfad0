//! Administrative subcommands: talk HTTP to a running `terramesh server`
//! and print `format_table`-formatted results, the same division of labour
//! as `garage`'s `cli::cli_command_dispatch` talking RPC to a running
//! `garage server`.

use std::path::PathBuf;

use format_table::format_table;
use serde::{Deserialize, Serialize};
use structopt::StructOpt;

use terramesh_catalog::StorageNode;
use terramesh_ring::RouterNode;
use terramesh_util::config::Config;
use terramesh_util::error::Error;

use crate::admin;

#[derive(StructOpt, Debug)]
pub enum Command {
	/// Runs the routing daemon in the foreground.
	Server,
	/// Prints the ring and storage servers as the contacted node sees them.
	Status,
	/// Router (ring member) administration.
	Node(NodeOperation),
	/// Storage node administration.
	Storage(StorageOperation),
}

#[derive(StructOpt, Debug)]
pub enum NodeOperation {
	/// Registers a new router and gossips it to the rest of the ring.
	Add(NodeAddOpt),
	/// Removes a router; its keys are absorbed by its successor once
	/// every node's view converges.
	Remove(NodeRemoveOpt),
}

#[derive(StructOpt, Debug)]
pub struct NodeAddOpt {
	/// host:port the new router listens on.
	pub address: String,
	#[structopt(long, default_value = "1")]
	pub priority: i32,
}

#[derive(StructOpt, Debug)]
pub struct NodeRemoveOpt {
	pub router_id: i32,
}

#[derive(StructOpt, Debug)]
pub enum StorageOperation {
	Add(StorageAddOpt),
	Remove(StorageRemoveOpt),
}

#[derive(StructOpt, Debug)]
pub struct StorageAddOpt {
	/// host the storage node listens on.
	pub location: String,
	#[structopt(long)]
	pub class: String,
	#[structopt(long, default_value = "0")]
	pub ssd_volume: i64,
	#[structopt(long, default_value = "0")]
	pub ssd_fullness: i32,
	#[structopt(long, default_value = "0")]
	pub hdd_volume: i64,
	#[structopt(long, default_value = "0")]
	pub hdd_fullness: i32,
}

#[derive(StructOpt, Debug)]
pub struct StorageRemoveOpt {
	pub server_id: i32,
}

/// `--host` wins; otherwise the target is derived from the config file's
/// own `listen_port`, same fallback `main.rs` uses for `rpc_public_addr`.
pub fn resolve_host(host: Option<String>, config_file: &PathBuf) -> Result<String, Error> {
	if let Some(host) = host {
		return Ok(host);
	}
	let config = Config::read(config_file)?;
	Ok(format!("127.0.0.1:{}", config.listen_port))
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
	ring: Vec<RouterNode>,
	hot_servers: Vec<StorageNode>,
	cold_servers: Vec<StorageNode>,
}

pub fn cmd_status(host: &str) -> Result<(), Error> {
	let response = admin::expect_ok(admin::call(host, "GET", "/status", b"")?)?;
	let status: StatusResponse = serde_json::from_slice(&response.body)?;

	println!("==== ROUTERS ====");
	let mut rows = vec!["Id\tAddress\tPriority\tHash range".to_string()];
	for node in &status.ring {
		rows.push(format!(
			"{id}\t{address}\t{priority}\t({start:016x}, {end:016x}]",
			id = node.id,
			address = node.address,
			priority = node.priority,
			start = node.hash_start,
			end = node.hash_end,
		));
	}
	format_table(rows);

	println!("\n==== STORAGE SERVERS ====");
	let mut rows = vec!["Id\tLocation\tClass\tFree".to_string()];
	for server in status.hot_servers.iter().chain(status.cold_servers.iter()) {
		let free_ssd = server.ssd_volume * (100 - server.ssd_fullness as i64) / 100;
		let free_hdd = server.hdd_volume * (100 - server.hdd_fullness as i64) / 100;
		let free = bytesize::ByteSize::b((free_ssd + free_hdd).max(0) as u64);
		rows.push(format!(
			"{id}\t{location}\t{class}\t{free}",
			id = server.server_id,
			location = server.location,
			class = server.class,
			free = free,
		));
	}
	format_table(rows);

	Ok(())
}

pub fn cmd_node_add(host: &str, opt: NodeAddOpt) -> Result<(), Error> {
	let body = serde_json::to_vec(&serde_json::json!({ "adress": opt.address, "priority": opt.priority }))?;
	let response = admin::expect_ok(admin::call(host, "POST", "/router/add", &body)?)?;
	println!("{}", String::from_utf8_lossy(&response.body));
	Ok(())
}

pub fn cmd_node_remove(host: &str, opt: NodeRemoveOpt) -> Result<(), Error> {
	let path = format!("/router/remove/{}", opt.router_id);
	let response = admin::expect_ok(admin::call(host, "DELETE", &path, b"")?)?;
	println!("{}", String::from_utf8_lossy(&response.body));
	Ok(())
}

pub fn cmd_storage_add(host: &str, opt: StorageAddOpt) -> Result<(), Error> {
	let body = serde_json::to_vec(&serde_json::json!({
		"location": opt.location,
		"class": opt.class,
		"ssd_volume": opt.ssd_volume,
		"ssd_fullness": opt.ssd_fullness,
		"hdd_volume": opt.hdd_volume,
		"hdd_fullness": opt.hdd_fullness,
	}))?;
	let response = admin::expect_ok(admin::call(host, "POST", "/server/add", &body)?)?;
	println!("{}", String::from_utf8_lossy(&response.body));
	Ok(())
}

pub fn cmd_storage_remove(host: &str, opt: StorageRemoveOpt) -> Result<(), Error> {
	let path = format!("/server/remove/{}", opt.server_id);
	let response = admin::expect_ok(admin::call(host, "DELETE", &path, b"")?)?;
	println!("{}", String::from_utf8_lossy(&response.body));
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_host_prefers_the_explicit_host_flag_without_touching_the_config_file() {
		let host = resolve_host(Some("10.0.0.5:9999".to_string()), &PathBuf::from("/does/not/exist.toml")).unwrap();
		assert_eq!(host, "10.0.0.5:9999");
	}

	#[test]
	fn status_response_deserializes_from_the_dispatcher_status_payload() {
		let body = serde_json::json!({
			"ring": [],
			"hot_servers": [],
			"cold_servers": [],
		});
		let status: StatusResponse = serde_json::from_value(body).unwrap();
		assert!(status.ring.is_empty());
		assert!(status.hot_servers.is_empty());
		assert!(status.cold_servers.is_empty());
	}
}
