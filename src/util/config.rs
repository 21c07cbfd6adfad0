//! Configuration loading, mirroring `garage_util::config::read_config`: a
//! `serde`-deserialized struct read from a TOML file, with a `Default` for
//! every optional key so a minimal file only needs `catalog_dsn`.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
	pub listen_ip: String,
	pub listen_port: u16,
	pub workers_count: usize,
	pub storage_port: u16,
	pub gossip_interval_ms: u64,
	pub failure_timeout_ms: u64,
	pub catalog_dsn: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			listen_ip: "0.0.0.0".into(),
			listen_port: 3902,
			workers_count: num_cpus_fallback(),
			storage_port: 8080,
			gossip_interval_ms: 5_000,
			failure_timeout_ms: 15_000,
			catalog_dsn: String::new(),
		}
	}
}

fn num_cpus_fallback() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(4)
}

impl Config {
	pub fn read(path: &Path) -> Result<Self, Error> {
		let data = fs::read_to_string(path)
			.map_err(|e| Error::Fatal(format!("cannot read config {}: {}", path.display(), e)))?;
		let config: Config = toml::from_str(&data)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), Error> {
		if self.catalog_dsn.is_empty() {
			return Err(Error::Fatal("catalog_dsn is required".into()));
		}
		if self.workers_count == 0 {
			return Err(Error::Fatal("workers_count must be at least 1".into()));
		}
		Ok(())
	}

	/// T_fail, per spec.md §4.2: three missed gossip rounds.
	pub fn fail_timeout_ms(&self) -> u64 {
		self.failure_timeout_ms
	}

	/// T_forget: twice T_fail, i.e. six gossip rounds.
	pub fn forget_timeout_ms(&self) -> u64 {
		self.failure_timeout_ms * 2
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minimal_file_is_enough() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let path = dir.join("config.toml");
		fs::write(&path, "catalog_dsn = \"postgres://localhost/terramesh\"\n").unwrap();
		let config = Config::read(&path).unwrap();
		assert_eq!(config.listen_port, 3902);
		assert_eq!(config.forget_timeout_ms(), config.failure_timeout_ms * 2);
	}

	#[test]
	fn missing_dsn_is_rejected() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let path = dir.join("config.toml");
		fs::write(&path, "listen_port = 4000\n").unwrap();
		assert!(Config::read(&path).is_err());
	}
}
