//! Accept loop: level-triggered readiness polling over the listening
//! socket and every accepted connection, the direct analog of
//! `routing_server_run`'s `epoll_wait` loop in
//! `original_source/routing_server/routing_server.cpp`, using `mio`
//! instead of raw `epoll(7)` calls.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream as MioTcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use terramesh_util::error::Error;

use crate::ctx::DispatcherCtx;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONN_TOKEN: usize = 2;

/// Runs until `ctx.shutdown()` is called from another thread. `waker` must
/// be the same one passed to that shutdown path so the poll wakes up
/// promptly instead of waiting out its next timeout.
pub fn run(ctx: Arc<DispatcherCtx>, mut listener: TcpListener, mut poll: Poll, _waker: Arc<Waker>) -> Result<(), Error> {
	let mut events = Events::with_capacity(128);
	let mut conns: HashMap<Token, MioTcpStream> = HashMap::new();
	let mut next_token = FIRST_CONN_TOKEN;

	poll.registry()
		.register(&mut listener, LISTENER, Interest::READABLE)
		.map_err(|e| Error::Fatal(format!("cannot register listening socket: {}", e)))?;

	info!("dispatcher accept loop starting");
	while !ctx.is_stopped() {
		if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(500))) {
			if e.kind() == ErrorKind::Interrupted {
				continue;
			}
			return Err(Error::Fatal(format!("poll failed: {}", e)));
		}

		for event in events.iter() {
			match event.token() {
				LISTENER => loop {
					match listener.accept() {
						Ok((mut stream, _addr)) => {
							let token = Token(next_token);
							next_token += 1;
							if poll
								.registry()
								.register(&mut stream, token, Interest::READABLE)
								.is_ok()
							{
								conns.insert(token, stream);
							}
						}
						Err(e) if e.kind() == ErrorKind::WouldBlock => break,
						Err(e) => {
							warn!("accept failed: {}", e);
							break;
						}
					}
				},
				WAKER => {
					// only used to interrupt the poll on shutdown
				}
				token => {
					// deregister immediately: "simultaneously removed from
					// the poller to prevent duplicate delivery" (spec.md §4.6)
					if let Some(mut stream) = conns.remove(&token) {
						let _ = poll.registry().deregister(&mut stream);
						// handed to a worker as a plain blocking socket: the
						// poller's only job was to learn that the first byte
						// had arrived without the accept thread blocking on it
						let std_stream = unsafe { std::net::TcpStream::from_raw_fd(stream.into_raw_fd()) };
						ctx.enqueue(std_stream);
					}
				}
			}
		}
	}
	info!("dispatcher accept loop stopped");
	Ok(())
}
