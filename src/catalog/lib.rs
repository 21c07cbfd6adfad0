//! Typed, parameter-bound facade over the external PostgreSQL catalog
//! (spec.md §4.4). Grounded on `original_source/routing_server/db_manager.cpp`,
//! which confirms Postgres via its `PGresult`/`PQexecParams` calls, but
//! every operation here binds parameters through `postgres::types::ToSql`
//! — the source's string-concatenated queries (`form_insert_image_query`,
//! `insert_spectrum`, `insert_tile`, `increment_tile_frequency`) are the
//! named defect in spec.md §9 and are not reproduced.

#[macro_use]
extern crate tracing;

pub mod geohash;
pub mod types;

use postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;

use terramesh_util::error::Error;

pub use types::*;

pub type Pool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

pub struct Catalog {
	pool: Pool,
}

impl Catalog {
	pub fn connect(dsn: &str) -> Result<Self, Error> {
		let config: postgres::Config = dsn
			.parse()
			.map_err(|e| Error::Fatal(format!("invalid catalog_dsn: {}", e)))?;
		let manager = PostgresConnectionManager::new(config, NoTls);
		let pool = r2d2::Pool::builder()
			.build(manager)
			.map_err(|e| Error::Fatal(format!("cannot build catalog pool: {}", e)))?;
		Ok(Catalog { pool })
	}

	fn conn(&self) -> Result<r2d2::PooledConnection<PostgresConnectionManager<NoTls>>, Error> {
		self.pool
			.get()
			.map_err(|e| Error::Transient(format!("catalog unavailable: {}", e)))
	}

	fn reject<E: std::fmt::Display>(e: E) -> Error {
		Error::Upstream(format!("catalog rejected query: {}", e))
	}

	pub fn search_images_by_geohash_prefixes(&self, prefixes: &[String]) -> Result<Vec<Image>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT image_id, filename, timestamp, source, geohash FROM Images \
				 WHERE geohash LIKE ANY (SELECT prefix || '%' FROM UNNEST($1::text[]) AS prefix) \
				 ORDER BY timestamp DESC",
				&[&prefixes],
			)
			.map_err(Self::reject)?;
		Ok(rows
			.iter()
			.map(|row| Image {
				image_id: row.get(0),
				filename: row.get(1),
				timestamp: row.get(2),
				source: row.get(3),
				geohash: row.get(4),
			})
			.collect())
	}

	pub fn search_images_by_name(&self, pattern: &str) -> Result<Vec<Image>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT image_id, filename, timestamp, source, geohash FROM Images \
				 WHERE filename ILIKE '%' || $1 || '%' ORDER BY timestamp DESC",
				&[&pattern],
			)
			.map_err(Self::reject)?;
		Ok(rows
			.iter()
			.map(|row| Image {
				image_id: row.get(0),
				filename: row.get(1),
				timestamp: row.get(2),
				source: row.get(3),
				geohash: row.get(4),
			})
			.collect())
	}

	pub fn insert_image(&self, data: &ImageInsert) -> Result<i32, Error> {
		validate_coordinates(data.north, data.south, data.east, data.west)?;
		let mut conn = self.conn()?;
		let row = conn
			.query_one(
				"INSERT INTO Images (filename, source, timestamp, geohash) VALUES ($1, $2, $3, $4) \
				 RETURNING image_id",
				&[&data.filename, &data.source, &data.timestamp, &data.geohash],
			)
			.map_err(Self::reject)?;
		Ok(row.get(0))
	}

	pub fn get_spectrums_by_image(&self, filename: &str) -> Result<Vec<Spectrum>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT spectrum_id, spectrum_name, segment_storage, default_cold_color, \
				 frequency, extra FROM Spectrums WHERE image_id = \
				 (SELECT image_id FROM Images WHERE filename = $1)",
				&[&filename],
			)
			.map_err(Self::reject)?;
		Ok(rows
			.iter()
			.map(|row| Spectrum {
				spectrum_id: row.get(0),
				spectrum_name: row.get(1),
				segment_storage: row.get(2),
				default_cold_color: row.get(3),
				frequency: row.get(4),
				extra: row.get(5),
			})
			.collect())
	}

	pub fn increment_spectrum_frequency(&self, filename: &str, spectrum_name: &str) -> Result<(), Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.execute(
				"UPDATE Spectrums SET frequency = frequency + 1 \
				 WHERE image_id = (SELECT image_id FROM Images WHERE filename = $1) AND spectrum_name = $2",
				&[&filename, &spectrum_name],
			)
			.map_err(Self::reject)?;
		if rows == 0 {
			return Err(Error::not_found(format!("no spectrum {} for {}", spectrum_name, filename)));
		}
		Ok(())
	}

	pub fn insert_spectrum(&self, image_id: i32, data: &SpectrumInsert) -> Result<i32, Error> {
		let mut conn = self.conn()?;
		let row = conn
			.query_one(
				"INSERT INTO Spectrums (image_id, spectrum_name, frequency, segment_storage, \
				 default_cold_color, extra) VALUES ($1, $2, $3, $4, $5, $6) RETURNING spectrum_id",
				&[
					&image_id,
					&data.spectrum_name,
					&data.frequency,
					&data.segment_storage,
					&data.default_cold_color,
					&data.extra,
				],
			)
			.map_err(Self::reject)?;
		Ok(row.get(0))
	}

	pub fn get_servers_by_class(&self, class: &str) -> Result<Vec<StorageNode>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT server_id, ssd_fullness, ssd_volume, hdd_volume, hdd_fullness, location, class \
				 FROM Servers WHERE class = $1",
				&[&class],
			)
			.map_err(Self::reject)?;
		Ok(rows
			.iter()
			.map(|row| StorageNode {
				server_id: row.get(0),
				ssd_fullness: row.get(1),
				ssd_volume: row.get(2),
				hdd_volume: row.get(3),
				hdd_fullness: row.get(4),
				location: row.get(5),
				class: row.get(6),
			})
			.collect())
	}

	pub fn insert_server(&self, data: &StorageNodeInsert) -> Result<i32, Error> {
		let mut conn = self.conn()?;
		let row = conn
			.query_one(
				"INSERT INTO Servers (ssd_fullness, ssd_volume, hdd_volume, hdd_fullness, location, class) \
				 VALUES ($1, $2, $3, $4, $5, $6) RETURNING server_id",
				&[
					&data.ssd_fullness,
					&data.ssd_volume,
					&data.hdd_volume,
					&data.hdd_fullness,
					&data.location,
					&data.class,
				],
			)
			.map_err(Self::reject)?;
		Ok(row.get(0))
	}

	pub fn delete_server(&self, server_id: i32) -> Result<(), Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.execute("DELETE FROM Servers WHERE server_id = $1", &[&server_id])
			.map_err(Self::reject)?;
		if rows == 0 {
			return Err(Error::not_found(format!("no server {}", server_id)));
		}
		Ok(())
	}

	/// Unlike the original's `insert_routing_server`, which inserts a
	/// caller-supplied `server_id` that's left default-constructed (always
	/// 0) at the one call site in `routing_server.cpp`, this lets the
	/// catalog assign the id and returns it — avoiding a primary-key
	/// collision on the second router to ever join.
	pub fn insert_routing_server(&self, data: &RoutingServerInsert) -> Result<i32, Error> {
		let mut conn = self.conn()?;
		let row = conn
			.query_one(
				"INSERT INTO Routing_Servers (adress, priority, geohash_prefix) \
				 VALUES ($1, $2, $3) RETURNING server_id",
				&[&data.address, &data.priority, &data.geohash_prefix],
			)
			.map_err(Self::reject)?;
		Ok(row.get(0))
	}

	pub fn delete_routing_server(&self, router_id: i32) -> Result<(), Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.execute("DELETE FROM Routing_Servers WHERE server_id = $1", &[&router_id])
			.map_err(Self::reject)?;
		if rows == 0 {
			return Err(Error::not_found(format!("no router {}", router_id)));
		}
		Ok(())
	}

	pub fn get_all_routing_servers(&self) -> Result<Vec<RoutingServerRow>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT server_id, adress, priority, geohash_prefix FROM Routing_Servers",
				&[],
			)
			.map_err(Self::reject)?;
		Ok(rows
			.iter()
			.map(|row| RoutingServerRow {
				router_id: row.get(0),
				address: row.get(1),
				priority: row.get(2),
				geohash_prefix: row.get(3),
			})
			.collect())
	}

	pub fn insert_tile(&self, data: &TileInsert) -> Result<i32, Error> {
		let mut conn = self.conn()?;
		let row = conn
			.query_one(
				"INSERT INTO Tiles (tile_row, tile_column, spectrum, image_id, tile_url) \
				 VALUES ($1, $2, $3, $4, $5) RETURNING tile_id",
				&[&data.tile_row, &data.tile_column, &data.spectrum, &data.image_id, &data.tile_url],
			)
			.map_err(Self::reject)?;
		Ok(row.get(0))
	}

	pub fn increment_tile_frequency(&self, tile_row: i32, tile_column: i32) -> Result<(), Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.execute(
				"UPDATE Tiles SET frequency = frequency + 1 WHERE tile_row = $1 AND tile_column = $2",
				&[&tile_row, &tile_column],
			)
			.map_err(Self::reject)?;
		if rows == 0 {
			return Err(Error::not_found(format!("no tile at ({}, {})", tile_row, tile_column)));
		}
		Ok(())
	}

	pub fn get_tiles_by_image(&self, image_id: i32) -> Result<Vec<Tile>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT tile_id, image_id, tile_row, tile_column, spectrum, tile_url, frequency \
				 FROM Tiles WHERE image_id = $1",
				&[&image_id],
			)
			.map_err(Self::reject)?;
		Ok(rows.iter().map(row_to_tile).collect())
	}

	pub fn get_tiles_sorted_by_frequency(&self, image_id: i32) -> Result<Vec<Tile>, Error> {
		let mut conn = self.conn()?;
		let rows = conn
			.query(
				"SELECT tile_id, image_id, tile_row, tile_column, spectrum, tile_url, frequency \
				 FROM Tiles WHERE image_id = $1 ORDER BY frequency DESC",
				&[&image_id],
			)
			.map_err(Self::reject)?;
		Ok(rows.iter().map(row_to_tile).collect())
	}
}

fn row_to_tile(row: &postgres::Row) -> Tile {
	Tile {
		tile_id: row.get(0),
		image_id: row.get(1),
		tile_row: row.get(2),
		tile_column: row.get(3),
		spectrum: row.get(4),
		tile_url: row.get(5),
		frequency: row.get(6),
	}
}

/// `north > south && east > west`, plus the latitude/longitude range check
/// spec.md §4.4 adds on top of the original's bare `validate_coordinates`.
fn validate_coordinates(north: f64, south: f64, east: f64, west: f64) -> Result<(), Error> {
	if !(north > south && east > west) {
		return Err(Error::bad_request("north must exceed south and east must exceed west"));
	}
	if !(-90.0..=90.0).contains(&north) || !(-90.0..=90.0).contains(&south) {
		return Err(Error::bad_request("latitude out of range"));
	}
	if !(-180.0..=180.0).contains(&east) || !(-180.0..=180.0).contains(&west) {
		return Err(Error::bad_request("longitude out of range"));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn coordinate_validation_matches_spec() {
		assert!(validate_coordinates(55.9, 55.7, 37.8, 37.5).is_ok());
		assert!(validate_coordinates(55.7, 55.9, 37.8, 37.5).is_err(), "north must exceed south");
		assert!(validate_coordinates(55.9, 55.7, 37.5, 37.8).is_err(), "east must exceed west");
		assert!(validate_coordinates(95.0, 55.7, 37.8, 37.5).is_err(), "latitude out of range");
		assert!(validate_coordinates(55.9, 55.7, 200.0, 37.5).is_err(), "longitude out of range");
	}
}
