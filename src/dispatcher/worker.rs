//! Worker thread body: pop a ready socket off the FIFO, serve exactly one
//! request, close. Mirrors `worker_main`'s pthread loop in
//! `original_source/routing_server/routing_server.cpp`.

use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use terramesh_http::{Request, Response};

use crate::ctx::DispatcherCtx;
use crate::routes;

/// Spawned once per worker slot; returns when `ctx` is shut down and the
/// FIFO is drained.
pub fn run(ctx: Arc<DispatcherCtx>) {
	while let Some(stream) = ctx.dequeue() {
		if let Err(e) = serve_one(&ctx, stream) {
			warn!("error serving connection: {}", e);
		}
	}
}

fn serve_one(ctx: &DispatcherCtx, mut stream: TcpStream) -> std::io::Result<()> {
	stream.set_nonblocking(false)?;
	stream.set_read_timeout(Some(Duration::from_secs(10)))?;
	stream.set_write_timeout(Some(Duration::from_secs(10)))?;

	let peer_stream = stream.try_clone()?;
	let response = match Request::read_from(peer_stream) {
		Ok(request) => routes::dispatch(ctx, &request),
		Err(e) => Response::error(&e),
	};

	let write_result = response.write_to(&mut stream);
	let _ = stream.shutdown(std::net::Shutdown::Both);
	write_result
}
