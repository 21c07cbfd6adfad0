use std::io::{self, BufRead, BufReader, Read, Write};

use serde::Serialize;

use terramesh_util::Error;

#[derive(Debug, Clone)]
pub struct Response {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

fn reason_phrase(status: u16) -> &'static str {
	match status {
		200 => "OK",
		201 => "Created",
		204 => "No Content",
		400 => "Bad Request",
		404 => "Not Found",
		415 => "Method Not Allowed",
		500 => "Internal Server Error",
		502 => "Bad Gateway",
		503 => "Service Unavailable",
		504 => "Gateway Timeout",
		_ => "Unknown",
	}
}

impl Response {
	pub fn new(status: u16, body: Vec<u8>) -> Self {
		Response { status, headers: Vec::new(), body }
	}

	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.push((name.to_string(), value.into()));
		self
	}

	pub fn empty(status: u16) -> Self {
		Response::new(status, Vec::new())
	}

	pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, Error> {
		let body = serde_json::to_vec(value)?;
		Ok(Response::new(status, body).with_header("Content-Type", "application/json"))
	}

	pub fn error(err: &Error) -> Self {
		let body = format!("{{\"error\":{}}}", serde_json::to_string(&err.message()).unwrap());
		Response::new(err.status_code(), body.into_bytes()).with_header("Content-Type", "application/json")
	}

	pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
		write!(out, "HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status))?;
		write!(out, "Content-Length: {}\r\n", self.body.len())?;
		for (name, value) in &self.headers {
			write!(out, "{}: {}\r\n", name, value)?;
		}
		write!(out, "\r\n")?;
		out.write_all(&self.body)?;
		out.flush()
	}

	/// Parses a response off the wire, used when relaying a storage node's
	/// or a peer's reply back to the client. Shares the
	/// `Content-Length`-driven body read with `Request::read_from` rather
	/// than the original's line-based `send_request_to_storage`, which
	/// just drains the socket until EOF.
	pub fn read_from<R: Read>(stream: R) -> Result<Response, Error> {
		let mut reader = BufReader::new(stream);

		let mut status_line = String::new();
		reader.read_line(&mut status_line)?;
		let status_line = status_line.trim_end_matches(['\r', '\n']);
		let status: u16 = status_line
			.split_whitespace()
			.nth(1)
			.ok_or_else(|| Error::Upstream("malformed status line".into()))?
			.parse()
			.map_err(|_| Error::Upstream("malformed status code".into()))?;

		let mut headers = Vec::new();
		let mut content_length = 0usize;
		loop {
			let mut line = String::new();
			let n = reader.read_line(&mut line)?;
			let line = line.trim_end_matches(['\r', '\n']);
			if n == 0 || line.is_empty() {
				break;
			}
			if let Some(colon) = line.find(':') {
				let name = line[..colon].trim().to_string();
				let value = line[colon + 1..].trim().to_string();
				if name.eq_ignore_ascii_case("content-length") {
					content_length = value.parse().unwrap_or(0);
				}
				headers.push((name, value));
			}
		}

		let mut body = vec![0u8; content_length];
		if content_length > 0 {
			reader.read_exact(&mut body)?;
		}

		Ok(Response { status, headers, body })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn writes_status_line_content_length_and_body() {
		let resp = Response::new(201, b"{}".to_vec());
		let mut buf = Vec::new();
		resp.write_to(&mut buf).unwrap();
		let text = String::from_utf8(buf).unwrap();
		assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
		assert!(text.contains("Content-Length: 2\r\n"));
		assert!(text.ends_with("{}"));
	}

	#[test]
	fn error_responses_carry_the_mapped_status() {
		let resp = Response::error(&Error::not_found("no such image"));
		assert_eq!(resp.status, 404);
		assert!(String::from_utf8(resp.body).unwrap().contains("no such image"));
	}

	#[test]
	fn round_trips_through_write_and_read() {
		let resp = Response::new(200, b"hello".to_vec()).with_header("X-Extra", "yes");
		let mut buf = Vec::new();
		resp.write_to(&mut buf).unwrap();
		let parsed = Response::read_from(&buf[..]).unwrap();
		assert_eq!(parsed.status, 200);
		assert_eq!(parsed.body, b"hello");
	}
}
