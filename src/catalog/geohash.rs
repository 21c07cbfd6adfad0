//! Minimal base-32 geohash encoding, used only to turn a lat/lon rectangle
//! into the set of prefixes `search_images_by_geohash_prefixes` matches
//! against. The original's `get_geohash_prefixes` helper wasn't part of
//! the retrieved source, so this implements the standard algorithm
//! directly: encode each rectangle corner plus its center at a fixed
//! precision, then take the common set of truncated prefixes.

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
	let mut lat_range = (-90.0_f64, 90.0_f64);
	let mut lon_range = (-180.0_f64, 180.0_f64);
	let mut out = Vec::with_capacity(precision);
	let mut bit = 0;
	let mut ch = 0usize;
	let mut even = true;

	while out.len() < precision {
		if even {
			let mid = (lon_range.0 + lon_range.1) / 2.0;
			if lon >= mid {
				ch |= 1 << (4 - bit);
				lon_range.0 = mid;
			} else {
				lon_range.1 = mid;
			}
		} else {
			let mid = (lat_range.0 + lat_range.1) / 2.0;
			if lat >= mid {
				ch |= 1 << (4 - bit);
				lat_range.0 = mid;
			} else {
				lat_range.1 = mid;
			}
		}
		even = !even;
		if bit < 4 {
			bit += 1;
		} else {
			out.push(BASE32[ch]);
			bit = 0;
			ch = 0;
		}
	}
	String::from_utf8(out).unwrap()
}

/// Prefixes, at `precision` characters, covering the rectangle
/// `(north, south, east, west)`. Samples the four corners and the center;
/// duplicate prefixes are deduped so the catalog query's `ANY(...)` list
/// stays small.
pub fn prefixes_for_rectangle(north: f64, south: f64, east: f64, west: f64, precision: usize) -> Vec<String> {
	let points = [
		(north, east),
		(north, west),
		(south, east),
		(south, west),
		((north + south) / 2.0, (east + west) / 2.0),
	];
	let mut prefixes: Vec<String> = points.iter().map(|(lat, lon)| encode(*lat, *lon, precision)).collect();
	prefixes.sort();
	prefixes.dedup();
	prefixes
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoding_is_deterministic_and_sized() {
		let hash = encode(55.7558, 37.6173, 6);
		assert_eq!(hash.len(), 6);
		assert_eq!(hash, encode(55.7558, 37.6173, 6));
	}

	#[test]
	fn nearby_points_share_a_prefix() {
		let a = encode(55.7558, 37.6173, 6);
		let b = encode(55.7559, 37.6174, 6);
		assert_eq!(&a[..4], &b[..4]);
	}

	#[test]
	fn rectangle_covering_produces_nonempty_prefixes() {
		let prefixes = prefixes_for_rectangle(55.9, 55.7, 37.8, 37.5, 4);
		assert!(!prefixes.is_empty());
		assert!(prefixes.iter().all(|p| p.len() == 4));
	}
}
