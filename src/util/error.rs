//! The one error type used end-to-end by the routing tier. Every component
//! folds its failures into this enum so the dispatcher can map any error to
//! an HTTP status code in one place.

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error(display = "Bad request: {}", _0)]
	BadRequest(String),

	#[error(display = "Not found: {}", _0)]
	NotFound(String),

	#[error(display = "No capacity: {}", _0)]
	NoCapacity(String),

	#[error(display = "Upstream error: {}", _0)]
	Upstream(String),

	#[error(display = "Upstream timed out: {}", _0)]
	Timeout(String),

	#[error(display = "Transient error: {}", _0)]
	Transient(String),

	#[error(display = "Fatal error: {}", _0)]
	Fatal(String),
}

impl Error {
	/// HTTP status code the dispatcher should write for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			Error::BadRequest(_) => 400,
			Error::NotFound(_) => 404,
			Error::NoCapacity(_) => 503,
			Error::Upstream(_) => 502,
			Error::Timeout(_) => 504,
			Error::Transient(_) => 500,
			Error::Fatal(_) => 500,
		}
	}

	pub fn message(&self) -> String {
		self.to_string()
	}

	pub fn bad_request<M: ToString>(msg: M) -> Self {
		Error::BadRequest(msg.to_string())
	}

	pub fn not_found<M: ToString>(msg: M) -> Self {
		Error::NotFound(msg.to_string())
	}
}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		match e.kind() {
			std::io::ErrorKind::TimedOut => Error::Timeout(e.to_string()),
			_ => Error::Transient(e.to_string()),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Error {
		Error::BadRequest(format!("invalid JSON: {}", e))
	}
}

impl From<toml::de::Error> for Error {
	fn from(e: toml::de::Error) -> Error {
		Error::Fatal(format!("invalid configuration: {}", e))
	}
}

/// Mirrors `garage_util::error::OkOrMessage`: turns an `Option` into a
/// `Result<_, Error>` without writing out `ok_or_else` at every call site.
pub trait OkOrMessage {
	type Ok;
	fn ok_or_message<M: ToString>(self, msg: M) -> Result<Self::Ok, Error>;
}

impl<T> OkOrMessage for Option<T> {
	type Ok = T;
	fn ok_or_message<M: ToString>(self, msg: M) -> Result<T, Error> {
		self.ok_or_else(|| Error::BadRequest(msg.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_match_spec() {
		assert_eq!(Error::bad_request("x").status_code(), 400);
		assert_eq!(Error::not_found("x").status_code(), 404);
		assert_eq!(Error::NoCapacity("x".into()).status_code(), 503);
		assert_eq!(Error::Upstream("x".into()).status_code(), 502);
	}

	#[test]
	fn ok_or_message_converts_none() {
		let v: Option<u32> = None;
		assert!(v.ok_or_message("missing").is_err());
	}
}
