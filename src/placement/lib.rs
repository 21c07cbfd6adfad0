//! Hot/cold tier classification and optimal-server selection (spec.md
//! §4.3). Grounded on `determine_storage_type`/`select_optimal_server` in
//! `original_source/routing_server/routing_server.cpp`; the tie-break on
//! smaller `server_id` is added because the original leaves ties to
//! iteration order, which spec.md §4.3 pins down explicitly.

use terramesh_catalog::StorageNode;
use terramesh_util::error::Error;

/// Bands served from archival ("cold") storage. Every other band is hot.
/// Fixed at compile time, as spec.md §4.3 requires.
const COLD_STORAGE_BANDS: &[&str] = &["B01", "B05", "B06", "B07", "B8A", "B09", "B10", "B12"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
	Hot,
	Cold,
}

impl Tier {
	pub fn as_str(&self) -> &'static str {
		match self {
			Tier::Hot => "hot",
			Tier::Cold => "cold",
		}
	}
}

/// Unknown bands fall back to hot placement, per spec.md §4.3.
pub fn tier(band: &str) -> Tier {
	if COLD_STORAGE_BANDS.contains(&band) {
		Tier::Cold
	} else {
		Tier::Hot
	}
}

fn free_space(server: &StorageNode) -> f64 {
	let free_ssd = server.ssd_volume as f64 * (100 - server.ssd_fullness) as f64 / 100.0;
	let free_hdd = server.hdd_volume as f64 * (100 - server.hdd_fullness) as f64 / 100.0;
	free_ssd + free_hdd
}

/// Picks the candidate with the most free space, tie-broken by smaller
/// `server_id`. Fails with `NoCapacity` if `servers` is empty or the best
/// candidate has less free space than `payload_size`.
pub fn select_server(servers: &[StorageNode], payload_size: u64) -> Result<&StorageNode, Error> {
	let best = servers.iter().fold(None::<&StorageNode>, |best, candidate| {
		match best {
			None => Some(candidate),
			Some(current) => {
				let candidate_score = free_space(candidate);
				let current_score = free_space(current);
				if candidate_score > current_score
					|| (candidate_score == current_score && candidate.server_id < current.server_id)
				{
					Some(candidate)
				} else {
					Some(current)
				}
			}
		}
	});

	match best {
		Some(server) if free_space(server) >= payload_size as f64 => Ok(server),
		_ => Err(Error::NoCapacity("no server with sufficient free space".into())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn server(id: i32, ssd_volume: i64, ssd_fullness: i32, hdd_volume: i64, hdd_fullness: i32) -> StorageNode {
		StorageNode {
			server_id: id,
			ssd_fullness,
			ssd_volume,
			hdd_volume,
			hdd_fullness,
			location: format!("10.0.0.{}", id),
			class: "hot".into(),
		}
	}

	#[test]
	fn cold_bands_match_the_fixed_enumeration() {
		for band in ["B01", "B05", "B06", "B07", "B8A", "B09", "B10", "B12"] {
			assert_eq!(tier(band), Tier::Cold, "{} should be cold", band);
		}
		for band in ["B02", "B03", "B04", "B08", "B11", "unknown-band"] {
			assert_eq!(tier(band), Tier::Hot, "{} should be hot", band);
		}
	}

	/// Scenario 2 from spec.md §8.
	#[test]
	fn tie_breaks_on_smaller_server_id() {
		let a = server(2, 100, 50, 200, 75); // free = 50 + 50 = 100
		let b = server(1, 50, 0, 50, 0); // free = 50 + 50 = 100
		let picked = select_server(&[a, b], 10).unwrap();
		assert_eq!(picked.server_id, 1);
	}

	#[test]
	fn picks_the_strictly_larger_free_space() {
		let small = server(1, 10, 0, 10, 0); // free = 20
		let big = server(2, 1000, 0, 1000, 0); // free = 2000
		let picked = select_server(&[small, big], 100).unwrap();
		assert_eq!(picked.server_id, 2);
	}

	#[test]
	fn empty_candidate_set_is_no_capacity() {
		assert!(select_server(&[], 1).is_err());
	}

	#[test]
	fn payload_larger_than_best_free_space_is_no_capacity() {
		let only = server(1, 10, 0, 10, 0); // free = 20
		assert!(select_server(&[only], 1_000).is_err());
	}
}
