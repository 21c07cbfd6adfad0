//! Outbound relay client: opens a fresh TCP connection to a storage node
//! or peer router, writes a request, reads the full response, and hands
//! it back unchanged. Grounded on `send_request_to_storage` in
//! `original_source/routing_server/routing_server.cpp`, but with
//! `Content-Length`-bounded reads on both sides and the 2s/10s timeouts
//! spec.md §5 names instead of reading until EOF.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use terramesh_http::Response;
use terramesh_util::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Hop-by-hop headers stripped before forwarding a relayed response to the
/// original client, per spec.md §4.6 ("excluding hop-by-hop headers").
const HOP_BY_HOP: &[&str] = &["connection", "keep-alive", "transfer-encoding"];

pub fn relay(address: &str, port: u16, method: &str, path: &str, body: &[u8]) -> Result<Response, Error> {
	relay_with_headers(address, port, method, path, body, &[])
}

pub fn relay_with_headers(
	address: &str,
	port: u16,
	method: &str,
	path: &str,
	body: &[u8],
	extra_headers: &[(&str, &str)],
) -> Result<Response, Error> {
	let target = format!("{}:{}", address, port);
	let sock_addr = target
		.to_socket_addrs()
		.map_err(|e| Error::Upstream(format!("cannot resolve {}: {}", target, e)))?
		.next()
		.ok_or_else(|| Error::Upstream(format!("no address for {}", target)))?;

	let mut stream = TcpStream::connect_timeout(&sock_addr, CONNECT_TIMEOUT).map_err(|e| {
		if e.kind() == std::io::ErrorKind::TimedOut {
			Error::Timeout(format!("connect to {} timed out", target))
		} else {
			Error::Upstream(format!("cannot connect to {}: {}", target, e))
		}
	})?;
	stream
		.set_read_timeout(Some(READ_TIMEOUT))
		.map_err(|e| Error::Upstream(e.to_string()))?;

	write!(stream, "{} {} HTTP/1.1\r\n", method, path).map_err(|e| Error::Upstream(e.to_string()))?;
	write!(stream, "Host: {}\r\n", target).map_err(|e| Error::Upstream(e.to_string()))?;
	write!(stream, "Content-Type: application/json\r\n").map_err(|e| Error::Upstream(e.to_string()))?;
	for (name, value) in extra_headers {
		write!(stream, "{}: {}\r\n", name, value).map_err(|e| Error::Upstream(e.to_string()))?;
	}
	write!(stream, "Content-Length: {}\r\n\r\n", body.len()).map_err(|e| Error::Upstream(e.to_string()))?;
	if !body.is_empty() {
		stream.write_all(body).map_err(|e| Error::Upstream(e.to_string()))?;
	}

	let reader = stream.try_clone().map_err(|e| Error::Upstream(e.to_string()))?;
	let mut response = Response::read_from(reader)?;
	response.headers.retain(|(name, _)| !HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()));
	Ok(response)
}
