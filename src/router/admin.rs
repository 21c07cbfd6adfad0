//! HTTP client the CLI uses to reach a running `terramesh server`, the
//! direct analog of `garage`'s netapp RPC client in `main.rs`'s
//! `cli_command` — except there's no separate RPC protocol here, since the
//! routing tier's own dispatcher already speaks plain HTTP.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use terramesh_http::Response;
use terramesh_util::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

pub fn call(host: &str, method: &str, path: &str, body: &[u8]) -> Result<Response, Error> {
	let sock_addr = host
		.to_socket_addrs()
		.map_err(|e| Error::Upstream(format!("cannot resolve {}: {}", host, e)))?
		.next()
		.ok_or_else(|| Error::Upstream(format!("no address for {}", host)))?;

	let mut stream = TcpStream::connect_timeout(&sock_addr, CONNECT_TIMEOUT)
		.map_err(|e| Error::Upstream(format!("cannot connect to {}: {}", host, e)))?;
	stream.set_read_timeout(Some(READ_TIMEOUT)).map_err(|e| Error::Upstream(e.to_string()))?;

	write!(stream, "{} {} HTTP/1.1\r\n", method, path).map_err(|e| Error::Upstream(e.to_string()))?;
	write!(stream, "Host: {}\r\n", host).map_err(|e| Error::Upstream(e.to_string()))?;
	write!(stream, "Content-Type: application/json\r\n").map_err(|e| Error::Upstream(e.to_string()))?;
	write!(stream, "Content-Length: {}\r\n\r\n", body.len()).map_err(|e| Error::Upstream(e.to_string()))?;
	if !body.is_empty() {
		stream.write_all(body).map_err(|e| Error::Upstream(e.to_string()))?;
	}

	Response::read_from(stream)
}

/// Turns a non-2xx admin response into an `Error` carrying the body text,
/// since the CLI has no handler table to map status codes through.
pub fn expect_ok(response: Response) -> Result<Response, Error> {
	if response.status >= 200 && response.status < 300 {
		Ok(response)
	} else {
		Err(Error::Upstream(format!(
			"server returned {}: {}",
			response.status,
			String::from_utf8_lossy(&response.body)
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expect_ok_passes_2xx_through() {
		let response = Response::new(201, b"{\"router_id\":4}".to_vec());
		assert!(expect_ok(response).is_ok());
	}

	#[test]
	fn expect_ok_rejects_error_statuses() {
		let response = Response::new(503, b"{\"error\":\"no capacity\"}".to_vec());
		let err = expect_ok(response).unwrap_err();
		assert!(err.to_string().contains("503"));
		assert!(err.to_string().contains("no capacity"));
	}

	#[test]
	fn call_surfaces_a_clear_error_for_an_unresolvable_host() {
		let err = call("not-a-real-host.invalid:1", "GET", "/status", b"").unwrap_err();
		assert!(matches!(err, Error::Upstream(_)));
	}
}
