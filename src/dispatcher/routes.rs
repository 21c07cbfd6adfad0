//! Handler table: dispatches by (method, path) the way `process_http_request`
//! does in `original_source/routing_server/routing_server.cpp`, but every
//! handler returns a typed `Result<Response, Error>` instead of building
//! status lines by hand, and `/gossip/digest` is added alongside the named
//! `/router/*` / `/server/*` endpoints since join/leave announcements and
//! digests both travel as plain HTTP over the same listening port (see
//! `gossip_broadcast` in `original_source/routing_server/gossip.cpp`).

use serde::Deserialize;
use serde_json::json;

use terramesh_catalog::{ImageInsert, RoutingServerInsert, StorageNodeInsert};
use terramesh_catalog::geohash;
use terramesh_gossip::Digest;
use terramesh_placement::{select_server, tier};
use terramesh_ring::RouterNode;
use terramesh_util::error::Error;
use terramesh_util::time::now_msec;
use terramesh_http::{Request, Response};

use crate::ctx::DispatcherCtx;
use crate::relay;

pub fn dispatch(ctx: &DispatcherCtx, req: &Request) -> Response {
	if !is_supported_method(&req.method) {
		return Response::empty(415);
	}
	match route(ctx, req) {
		Ok(response) => response,
		Err(e) => Response::error(&e),
	}
}

fn is_supported_method(method: &str) -> bool {
	matches!(method, "GET" | "POST" | "DELETE")
}

fn route(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	match (req.method.as_str(), req.path.as_str()) {
		("GET", "/images") => get_images(ctx, req),
		("POST", "/images") => post_images(ctx, req),
		("GET", "/tiles") => get_tiles(ctx, req),
		("POST", "/tiles") => post_tiles(ctx, req),
		("POST", "/upload") => post_upload(ctx, req),
		("POST", "/router/add") => post_router_add(ctx, req),
		("POST", "/server/add") => post_server_add(ctx, req),
		("POST", "/gossip/digest") => post_gossip_digest(ctx, req),
		("GET", "/status") => get_status(ctx),
		(method, path) if method == "DELETE" && path.starts_with("/router/remove/") => {
			delete_router_remove(ctx, path)
		}
		(method, path) if method == "DELETE" && path.starts_with("/server/remove/") => {
			delete_server_remove(ctx, path)
		}
		(method, path) if method == "POST" && path.starts_with("/tiles/") && path.ends_with("/increment") => {
			post_tile_increment(ctx, path)
		}
		_ => Err(Error::not_found(format!("no route for {} {}", req.method, req.path))),
	}
}

/// Supplemental endpoint (not in the literal handler table) giving the
/// `terramesh status` CLI something to call: the ring as this node
/// currently sees it, plus the hot/cold storage servers it would place
/// uploads onto.
fn get_status(ctx: &DispatcherCtx) -> Result<Response, Error> {
	let ring = ctx.ring.snapshot();
	let hot = ctx.catalog.get_servers_by_class("hot")?;
	let cold = ctx.catalog.get_servers_by_class("cold")?;
	Response::json(200, &json!({ "ring": ring.nodes(), "hot_servers": hot, "cold_servers": cold }))
}

fn get_images(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	if let Some(name) = req.query.get("name") {
		let images = ctx.catalog.search_images_by_name(name)?;
		return Response::json(200, &json!({ "images": images }));
	}

	let north = required_f64(req, "north")?;
	let south = required_f64(req, "south")?;
	let east = required_f64(req, "east")?;
	let west = required_f64(req, "west")?;

	let prefixes = geohash::prefixes_for_rectangle(north, south, east, west, 5);
	let images = ctx.catalog.search_images_by_geohash_prefixes(&prefixes)?;
	Response::json(200, &json!({ "images": images }))
}

#[derive(Deserialize)]
struct ImageCreateBody {
	filename: String,
	source: String,
	timestamp: String,
	north: f64,
	south: f64,
	east: f64,
	west: f64,
}

fn post_images(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	let body: ImageCreateBody = serde_json::from_slice(&req.body)?;
	let geohash = geohash::encode((body.north + body.south) / 2.0, (body.east + body.west) / 2.0, 9);
	let insert = ImageInsert {
		filename: body.filename,
		source: body.source,
		timestamp: body.timestamp,
		north: body.north,
		south: body.south,
		east: body.east,
		west: body.west,
		geohash,
	};
	let image_id = ctx.catalog.insert_image(&insert)?;
	Response::json(201, &json!({ "image_id": image_id }))
}

/// spec.md §6 only names `storage_port`, not a storage host — the storage
/// node is assumed local, same as the original's hardcoded
/// `127.0.0.1:8080` target in `send_request_to_storage`.
fn storage_address(ctx: &DispatcherCtx) -> (&'static str, u16) {
	("127.0.0.1", ctx.config.storage_port)
}

fn get_tiles(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	req.query.get("image_id").ok_or_else(|| Error::bad_request("missing image_id"))?;
	let query = req
		.query
		.iter()
		.map(|(k, v)| format!("{}={}", k, v))
		.collect::<Vec<_>>()
		.join("&");
	let path = format!("/tiles?{}", query);
	let (address, port) = storage_address(ctx);
	let upstream = relay::relay(address, port, "GET", &path, &[])?;
	Ok(to_response(upstream))
}

fn post_tiles(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	// only sanity-checked here; actual tile bookkeeping is the storage
	// node's job, same division of labour as the original's forward-only
	// `/tiles` POST handler
	let _: serde_json::Value = serde_json::from_slice(&req.body)?;
	let (address, port) = storage_address(ctx);
	let upstream = relay::relay(address, port, "POST", "/tiles", &req.body)?;
	Ok(to_response(upstream))
}

fn post_tile_increment(ctx: &DispatcherCtx, path: &str) -> Result<Response, Error> {
	let (address, port) = storage_address(ctx);
	let upstream = relay::relay(address, port, "POST", path, &[])?;
	Ok(to_response(upstream))
}

fn post_upload(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	let spectrum = req
		.header("x-spectrum")
		.ok_or_else(|| Error::bad_request("Spectrum header is required"))?
		.to_string();

	let band_tier = tier(&spectrum);
	let candidates = ctx.catalog.get_servers_by_class(band_tier.as_str())?;
	let chosen = select_server(&candidates, req.body.len() as u64)?;

	let upstream = relay::relay_with_headers(
		&chosen.location,
		ctx.config.storage_port,
		"POST",
		"/upload",
		&req.body,
		&[("X-Spectrum", spectrum.as_str())],
	)?;
	Ok(to_response(upstream))
}

#[derive(Deserialize)]
struct RouterAddBody {
	adress: String,
	priority: i32,
}

fn post_router_add(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	let body: RouterAddBody = serde_json::from_slice(&req.body)?;
	let priority = u8::try_from(body.priority).map_err(|_| Error::bad_request("priority out of range"))?;
	let router_id = ctx.catalog.insert_routing_server(&RoutingServerInsert {
		address: body.adress.clone(),
		priority: body.priority,
		geohash_prefix: String::new(),
	})?;

	let mut node = RouterNode::new(router_id.to_string(), body.adress, priority);
	node.last_seen = now_msec();
	ctx.gossip.merge_digest(Digest { nodes: vec![node] });
	ctx.gossip.broadcast("POST", "/router/add", &req.body);

	Response::json(201, &json!({ "router_id": router_id }))
}

/// Removing the catalog row and broadcasting the `DELETE` onward is all
/// this handler does — the leaving node's entry actually drops out of
/// every peer's ring once its silence crosses `forget_timeout_ms` in
/// `GossipService::sweep_liveness`, per spec.md §8 scenario 6. There's no
/// immediate tombstone: gossip here only ever adds or refreshes records.
fn delete_router_remove(ctx: &DispatcherCtx, path: &str) -> Result<Response, Error> {
	let id_str = &path["/router/remove/".len()..];
	let id: i32 = id_str.parse().map_err(|_| Error::bad_request("invalid router id"))?;
	ctx.catalog.delete_routing_server(id)?;
	ctx.gossip.broadcast("DELETE", path, &[]);
	Response::json(200, &json!({ "status": "removed" }))
}

#[derive(Deserialize)]
struct ServerAddBody {
	ssd_fullness: i32,
	ssd_volume: i64,
	hdd_volume: i64,
	hdd_fullness: i32,
	location: String,
	#[serde(rename = "class")]
	class_type: String,
}

fn post_server_add(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	let body: ServerAddBody = serde_json::from_slice(&req.body)?;
	let server_id = ctx.catalog.insert_server(&StorageNodeInsert {
		ssd_fullness: body.ssd_fullness,
		ssd_volume: body.ssd_volume,
		hdd_volume: body.hdd_volume,
		hdd_fullness: body.hdd_fullness,
		location: body.location,
		class: body.class_type,
	})?;
	ctx.gossip.broadcast("POST", "/server/add", &req.body);
	Response::json(201, &json!({ "server_id": server_id }))
}

fn delete_server_remove(ctx: &DispatcherCtx, path: &str) -> Result<Response, Error> {
	let id_str = &path["/server/remove/".len()..];
	let id: i32 = id_str.parse().map_err(|_| Error::bad_request("invalid server id"))?;
	ctx.catalog.delete_server(id)?;
	ctx.gossip.broadcast("DELETE", path, &[]);
	Response::json(200, &json!({ "status": "removed" }))
}

fn post_gossip_digest(ctx: &DispatcherCtx, req: &Request) -> Result<Response, Error> {
	let digest: Digest = serde_json::from_slice(&req.body)?;
	ctx.gossip.merge_digest(digest);
	Ok(Response::empty(200))
}

fn required_f64(req: &Request, name: &str) -> Result<f64, Error> {
	req.query
		.get(name)
		.ok_or_else(|| Error::bad_request(format!("missing query parameter {}", name)))?
		.parse()
		.map_err(|_| Error::bad_request(format!("invalid {} value", name)))
}

fn to_response(upstream: Response) -> Response {
	let mut response = Response::new(upstream.status, upstream.body);
	for (name, value) in upstream.headers {
		response = response.with_header(&name, value);
	}
	response
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	fn req(method: &str, path: &str) -> Request {
		Request {
			method: method.to_string(),
			path: path.to_string(),
			query: BTreeMap::new(),
			headers: BTreeMap::new(),
			body: Vec::new(),
		}
	}

	#[test]
	fn unsupported_methods_are_rejected_before_routing() {
		assert!(is_supported_method("GET"));
		assert!(is_supported_method("POST"));
		assert!(is_supported_method("DELETE"));
		assert!(!is_supported_method("PUT"));
		assert!(!is_supported_method("PATCH"));
		assert!(!is_supported_method("TRACE"));
	}

	#[test]
	fn required_f64_parses_present_query_params() {
		let mut request = req("GET", "/images");
		request.query.insert("north".to_string(), "55.9".to_string());
		assert_eq!(required_f64(&request, "north").unwrap(), 55.9);
	}

	#[test]
	fn required_f64_rejects_missing_param() {
		let request = req("GET", "/images");
		assert!(required_f64(&request, "north").is_err());
	}

	#[test]
	fn required_f64_rejects_unparseable_param() {
		let mut request = req("GET", "/images");
		request.query.insert("north".to_string(), "not-a-number".to_string());
		assert!(required_f64(&request, "north").is_err());
	}

	#[test]
	fn router_add_body_keeps_the_original_misspelled_field_name() {
		let body: RouterAddBody = serde_json::from_str(r#"{"adress": "10.0.0.5:3902", "priority": 2}"#).unwrap();
		assert_eq!(body.adress, "10.0.0.5:3902");
		assert_eq!(body.priority, 2);
	}

	#[test]
	fn to_response_carries_status_body_and_headers_through() {
		let upstream = Response::new(201, b"hi".to_vec()).with_header("X-Foo", "bar");
		let response = to_response(upstream);
		assert_eq!(response.status, 201);
		assert_eq!(response.body, b"hi");
		assert!(response.headers.iter().any(|(k, v)| k == "X-Foo" && v == "bar"));
	}

	#[test]
	fn tile_increment_path_strips_known_prefix() {
		let path = "/tiles/12/7/increment";
		let rest = &path["/tiles/".len()..path.len() - "/increment".len()];
		assert_eq!(rest, "12/7");
	}

	#[test]
	fn router_remove_id_parses_trailing_segment() {
		let path = "/router/remove/42";
		let id_str = &path["/router/remove/".len()..];
		assert_eq!(id_str.parse::<i32>().unwrap(), 42);
	}

	#[test]
	fn router_remove_rejects_non_numeric_id() {
		let path = "/router/remove/not-a-number";
		let id_str = &path["/router/remove/".len()..];
		assert!(id_str.parse::<i32>().is_err());
	}
}
