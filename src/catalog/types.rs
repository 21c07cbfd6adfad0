//! Row types exchanged between the dispatcher and the catalog. `Serialize`
//! for JSON response bodies; construction from `postgres::Row` lives next
//! to each operation in `lib.rs` rather than via a blanket `FromSql` impl,
//! since every query selects a different column set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
	pub image_id: i32,
	pub filename: String,
	pub source: String,
	pub timestamp: String,
	pub geohash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInsert {
	pub filename: String,
	pub source: String,
	pub timestamp: String,
	pub north: f64,
	pub south: f64,
	pub east: f64,
	pub west: f64,
	pub geohash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectrum {
	pub spectrum_id: i32,
	pub spectrum_name: String,
	pub segment_storage: i32,
	pub default_cold_color: String,
	pub frequency: i32,
	pub extra: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumInsert {
	pub spectrum_name: String,
	pub frequency: i32,
	pub segment_storage: i32,
	pub default_cold_color: String,
	pub extra: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
	pub tile_id: i32,
	pub image_id: i32,
	pub tile_row: i32,
	pub tile_column: i32,
	pub spectrum: String,
	pub tile_url: String,
	pub frequency: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileInsert {
	pub image_id: i32,
	pub tile_row: i32,
	pub tile_column: i32,
	pub spectrum: String,
	pub tile_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
	Hot,
	Cold,
}

impl StorageClass {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageClass::Hot => "hot",
			StorageClass::Cold => "cold",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNode {
	pub server_id: i32,
	pub ssd_fullness: i32,
	pub ssd_volume: i64,
	pub hdd_volume: i64,
	pub hdd_fullness: i32,
	pub location: String,
	pub class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNodeInsert {
	pub ssd_fullness: i32,
	pub ssd_volume: i64,
	pub hdd_volume: i64,
	pub hdd_fullness: i32,
	pub location: String,
	pub class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingServerRow {
	pub router_id: i32,
	pub address: String,
	pub priority: i32,
	pub geohash_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingServerInsert {
	pub address: String,
	pub priority: i32,
	pub geohash_prefix: String,
}
