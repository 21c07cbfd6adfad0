//! `PeerTransport`: the abstraction spec.md §9 calls for around fire-and-
//! forget gossip sends, so a UDP or message-bus implementation can later
//! replace the default short TCP connect+send+close. The default impl is
//! grounded directly on the original `gossip_broadcast`: open a socket,
//! write a bare HTTP request, close — no response is read, no retry.

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use terramesh_util::error::Error;

use crate::Digest;

pub trait PeerTransport: Send + Sync {
	/// Best-effort: POSTs `digest` to `peer_address`'s `/gossip/digest`.
	/// Errors are for the caller to log; the next gossip round subsumes
	/// any failure, per spec.md §4.2's failure semantics.
	fn send_digest(&self, peer_address: &str, digest: &Digest) -> Result<(), Error>;

	/// Announces a join/leave to `peer_address` by issuing `method` on
	/// `path` with `body` (used for `/router/add` and
	/// `/router/remove/{id}`).
	fn send_request(&self, peer_address: &str, method: &str, path: &str, body: &[u8]) -> Result<(), Error>;
}

pub struct TcpPeerTransport {
	connect_timeout: Duration,
}

impl TcpPeerTransport {
	pub fn new(connect_timeout: Duration) -> Self {
		TcpPeerTransport { connect_timeout }
	}

	fn send_http(&self, peer_address: &str, method: &str, path: &str, body: &[u8]) -> Result<(), Error> {
		let addr = peer_address
			.parse()
			.map_err(|e| Error::Transient(format!("bad peer address {}: {}", peer_address, e)))?;
		let mut stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
		let request = format!(
			"{method} {path} HTTP/1.1\r\nHost: {host}\r\nContent-Type: application/json\r\nContent-Length: {len}\r\n\r\n",
			method = method,
			path = path,
			host = peer_address,
			len = body.len(),
		);
		stream.write_all(request.as_bytes())?;
		stream.write_all(body)?;
		Ok(())
	}
}

impl PeerTransport for TcpPeerTransport {
	fn send_digest(&self, peer_address: &str, digest: &Digest) -> Result<(), Error> {
		let body = serde_json::to_vec(digest)?;
		self.send_http(peer_address, "POST", "/gossip/digest", &body)
	}

	fn send_request(&self, peer_address: &str, method: &str, path: &str, body: &[u8]) -> Result<(), Error> {
		self.send_http(peer_address, method, path, body)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Read;
	use std::net::TcpListener;
	use std::thread;

	#[test]
	fn writes_a_well_formed_http_request() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = listener.local_addr().unwrap();
		let handle = thread::spawn(move || {
			let (mut socket, _) = listener.accept().unwrap();
			let mut buf = Vec::new();
			socket.read_to_end(&mut buf).unwrap();
			buf
		});

		let transport = TcpPeerTransport::new(Duration::from_secs(1));
		let digest = Digest { nodes: vec![] };
		transport.send_digest(&addr.to_string(), &digest).unwrap();

		let received = handle.join().unwrap();
		let text = String::from_utf8(received).unwrap();
		assert!(text.starts_with("POST /gossip/digest HTTP/1.1"));
		assert!(text.contains("Content-Length: "));
	}
}
