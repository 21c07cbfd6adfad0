//! Hand-rolled HTTP/1.1 framing for the connections the dispatcher accepts
//! and the short-lived ones it opens to peers and storage nodes. Grounded on
//! `parse_http_request`/`send_response` in
//! `original_source/routing_server/routing_server.cpp`, but fixes the
//! original's line-based body read (`std::getline(iss, req.body)`, which
//! truncates a body at the first newline) with a proper
//! `Content-Length`-driven read, and percent-decodes path and query
//! components instead of taking them literally.

mod request;
mod response;

pub use request::Request;
pub use response::Response;
