//! Per-peer liveness state machine: `Unknown -> Alive -> Suspect -> Dead`.
//! Alive/Suspect is reversible on fresh contact; Dead is terminal until the
//! record is forgotten entirely (spec.md §4.2).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerState {
	Unknown,
	Alive,
	Suspect,
	Dead,
}

impl PeerState {
	/// Applies the liveness timeouts given how long it has been since
	/// `last_seen`. A peer silent for one `gossip_ms` round without fresh
	/// contact becomes `Suspect`; past `fail_ms` (T_fail) it becomes
	/// `Dead`. Forgetting the record entirely at T_forget is the caller's
	/// job (it drops the record rather than transitioning state).
	pub fn after_silence(self, silence_ms: u64, gossip_ms: u64, fail_ms: u64) -> PeerState {
		if silence_ms >= fail_ms {
			PeerState::Dead
		} else if silence_ms >= gossip_ms {
			match self {
				PeerState::Dead => PeerState::Dead,
				_ => PeerState::Suspect,
			}
		} else {
			match self {
				PeerState::Unknown => PeerState::Alive,
				other => other,
			}
		}
	}

	pub fn on_contact(self) -> PeerState {
		match self {
			PeerState::Dead => PeerState::Alive,
			_ => PeerState::Alive,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_contact_revives_a_dead_peer() {
		assert_eq!(PeerState::Dead.on_contact(), PeerState::Alive);
	}

	#[test]
	fn long_silence_marks_dead() {
		assert_eq!(PeerState::Alive.after_silence(20_000, 5_000, 15_000), PeerState::Dead);
	}

	#[test]
	fn medium_silence_marks_suspect() {
		assert_eq!(PeerState::Alive.after_silence(6_000, 5_000, 15_000), PeerState::Suspect);
	}

	#[test]
	fn short_silence_keeps_alive() {
		assert_eq!(PeerState::Alive.after_silence(100, 5_000, 15_000), PeerState::Alive);
	}
}
