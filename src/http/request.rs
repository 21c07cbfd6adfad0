use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

use percent_encoding::percent_decode_str;

use terramesh_util::Error;

/// A fully framed HTTP/1.1 request. Unlike the original's `parse_http_request`
/// (which reads the body as a single `getline`), the body here is read for
/// exactly `Content-Length` bytes, so binary tile/image payloads in `/upload`
/// survive intact.
#[derive(Debug, Clone)]
pub struct Request {
	pub method: String,
	pub path: String,
	pub query: BTreeMap<String, String>,
	/// Header names are lower-cased so lookups don't care about case.
	pub headers: BTreeMap<String, String>,
	pub body: Vec<u8>,
}

impl Request {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	pub fn read_from<R: Read>(stream: R) -> Result<Request, Error> {
		let mut reader = BufReader::new(stream);

		let mut request_line = String::new();
		reader
			.read_line(&mut request_line)
			.map_err(|e| Error::bad_request(format!("failed to read request line: {}", e)))?;
		let request_line = request_line.trim_end_matches(['\r', '\n']);
		let mut parts = request_line.split_whitespace();
		let method = parts
			.next()
			.ok_or_else(|| Error::bad_request("empty request line"))?
			.to_string();
		let raw_path = parts.next().ok_or_else(|| Error::bad_request("missing path"))?;

		let (path, query) = split_path_and_query(raw_path);

		let mut headers = BTreeMap::new();
		loop {
			let mut line = String::new();
			let n = reader
				.read_line(&mut line)
				.map_err(|e| Error::bad_request(format!("failed to read header line: {}", e)))?;
			let line = line.trim_end_matches(['\r', '\n']);
			if n == 0 || line.is_empty() {
				break;
			}
			if let Some(colon) = line.find(':') {
				let key = line[..colon].trim().to_ascii_lowercase();
				let value = line[colon + 1..].trim().to_string();
				headers.insert(key, value);
			}
		}

		let content_length: usize = headers
			.get("content-length")
			.map(|v| v.parse())
			.transpose()
			.map_err(|_| Error::bad_request("invalid Content-Length"))?
			.unwrap_or(0);

		let mut body = vec![0u8; content_length];
		if content_length > 0 {
			reader
				.read_exact(&mut body)
				.map_err(|e| Error::bad_request(format!("short request body: {}", e)))?;
		}

		Ok(Request { method, path, query, headers, body })
	}
}

fn split_path_and_query(raw_path: &str) -> (String, BTreeMap<String, String>) {
	let mut query = BTreeMap::new();
	let (path, query_str) = match raw_path.find('?') {
		Some(pos) => (&raw_path[..pos], Some(&raw_path[pos + 1..])),
		None => (raw_path, None),
	};

	if let Some(query_str) = query_str {
		for pair in query_str.split('&') {
			if pair.is_empty() {
				continue;
			}
			if let Some(eq) = pair.find('=') {
				let key = decode(&pair[..eq]);
				let value = decode(&pair[eq + 1..]);
				query.insert(key, value);
			} else {
				query.insert(decode(pair), String::new());
			}
		}
	}

	(decode(path), query)
}

fn decode(s: &str) -> String {
	percent_decode_str(s).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_method_path_query_and_headers() {
		let raw = b"GET /images?north=10&south=5 HTTP/1.1\r\nHost: localhost\r\nX-Spectrum: B02\r\n\r\n";
		let req = Request::read_from(&raw[..]).unwrap();
		assert_eq!(req.method, "GET");
		assert_eq!(req.path, "/images");
		assert_eq!(req.query.get("north").unwrap(), "10");
		assert_eq!(req.query.get("south").unwrap(), "5");
		assert_eq!(req.header("x-spectrum").unwrap(), "B02");
		assert!(req.body.is_empty());
	}

	#[test]
	fn reads_exactly_content_length_bytes_of_body() {
		let raw = b"POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello-garbage-that-must-be-ignored";
		let req = Request::read_from(&raw[..]).unwrap();
		assert_eq!(req.body, b"hello");
	}

	#[test]
	fn percent_decodes_path_and_query() {
		let raw = b"GET /images/a%20b?name=x%2By HTTP/1.1\r\n\r\n";
		let req = Request::read_from(&raw[..]).unwrap();
		assert_eq!(req.path, "/images/a b");
		assert_eq!(req.query.get("name").unwrap(), "x+y");
	}

	#[test]
	fn missing_colon_header_line_is_skipped_not_fatal() {
		let raw = b"GET / HTTP/1.1\r\nnot-a-header\r\nHost: x\r\n\r\n";
		let req = Request::read_from(&raw[..]).unwrap();
		assert_eq!(req.header("host").unwrap(), "x");
	}
}
