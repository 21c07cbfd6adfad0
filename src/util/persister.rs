//! JSON-backed persistence for the one piece of state a routing node keeps
//! on local disk: its own identity (id + advertised address), so restarts
//! don't change a node's position on the ring. Everything else is
//! reconstructed from the catalog and gossip at startup, per spec.md §6
//! ("Persisted state: None on the routing node itself").

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;

pub struct Persister<T> {
	path: PathBuf,
	_marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Persister<T> {
	pub fn new(base_dir: &Path, file_name: &str) -> Self {
		Persister {
			path: base_dir.join(file_name),
			_marker: PhantomData,
		}
	}

	pub fn load(&self) -> Result<Option<T>, Error> {
		match fs::read(&self.path) {
			Ok(bytes) => {
				let value = serde_json::from_slice(&bytes)?;
				Ok(Some(value))
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	pub fn save(&self, value: &T) -> Result<(), Error> {
		let bytes = serde_json::to_vec_pretty(value)?;
		let tmp_path = self.path.with_extension("tmp");
		let mut file = fs::File::create(&tmp_path)?;
		file.write_all(&bytes)?;
		file.sync_all()?;
		fs::rename(&tmp_path, &self.path)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Serialize, Deserialize, PartialEq, Debug)]
	struct Identity {
		id: String,
		address: String,
	}

	#[test]
	fn round_trips_through_disk() {
		let dir = mktemp::Temp::new_dir().unwrap();
		let persister: Persister<Identity> = Persister::new(&dir, "identity.json");
		assert!(persister.load().unwrap().is_none());

		let identity = Identity {
			id: "abc".into(),
			address: "10.0.0.1:3902".into(),
		};
		persister.save(&identity).unwrap();
		assert_eq!(persister.load().unwrap(), Some(identity));
	}
}
