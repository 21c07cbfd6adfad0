//! Monotonic millisecond clock used for `last_seen` timestamps and gossip
//! timeouts. Deliberately not wall-clock time: peers never need to agree on
//! an absolute time, only on elapsed time since their own last contact.

use std::time::Instant;

use std::sync::OnceLock;

static START: OnceLock<Instant> = OnceLock::new();

pub fn now_msec() -> u64 {
	let start = START.get_or_init(Instant::now);
	start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn monotonically_non_decreasing() {
		let a = now_msec();
		let b = now_msec();
		assert!(b >= a);
	}
}
