//! File-backed [`SnapshotSink`] writing JSON atomically.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	leaderboard::{LeaderboardSnapshot, SnapshotFuture, SnapshotSink, StoreError},
};

/// Persists snapshots to a JSON file, replacing it through a temporary sibling and a rename so a
/// crash never leaves a half-written file behind.
#[derive(Clone, Debug)]
pub struct FileSnapshotSink {
	path: PathBuf,
}
impl FileSnapshotSink {
	/// Creates a sink writing to `path`; missing parent directories are created on save.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Target file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_now(&self) -> Result<Option<LeaderboardSnapshot>, StoreError> {
		let path = &self.path;

		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create snapshot directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn save_now(&self, snapshot: &LeaderboardSnapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec(snapshot).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize leaderboard snapshot: {e}"),
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SnapshotSink for FileSnapshotSink {
	fn save<'a>(&'a self, snapshot: &'a LeaderboardSnapshot) -> SnapshotFuture<'a, ()> {
		Box::pin(async move { self.save_now(snapshot) })
	}

	fn load(&self) -> SnapshotFuture<'_, Option<LeaderboardSnapshot>> {
		Box::pin(async move { self.load_now() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		config::LeaderboardSizes,
		id::{CategoryId, OwnerKey},
		leaderboard::LeaderboardEngine,
		region::Region,
	};

	fn temp_path(name: &str) -> PathBuf {
		std::env::temp_dir()
			.join(format!("mastery-lookup-{}-{name}", std::process::id()))
			.join("leaderboards.json")
	}

	#[tokio::test]
	async fn snapshot_survives_a_restart() {
		let path = temp_path("restart");
		let sizes = LeaderboardSizes { track: 10, display: 5 };
		let engine = LeaderboardEngine::with_sizes(sizes);

		for (key, score) in [("a", 10), ("b", 30), ("c", 20)] {
			engine.upsert(
				CategoryId::TOTAL_POINTS,
				OwnerKey::new(key).expect("Owner fixture should be valid."),
				key.to_uppercase(),
				Region::Euw,
				score,
			);
		}

		let sink = FileSnapshotSink::new(&path);

		sink.save(&engine.snapshot()).await.expect("Snapshot should be written.");

		assert!(!path.with_extension("tmp").exists());

		let restored =
			LeaderboardEngine::load_from(&sink, sizes).await.expect("Snapshot should load.");

		assert_eq!(restored.snapshot(), engine.snapshot());

		let raw = fs::read_to_string(&path).expect("Snapshot file should be readable.");

		assert!(raw.starts_with(
			r#"{"-1":[{"ownerKey":"b","displayName":"B","region":"EUW","score":30}"#
		));

		fs::remove_dir_all(path.parent().expect("Temp path has a parent.")).ok();
	}

	#[tokio::test]
	async fn missing_file_loads_as_none_and_garbage_fails() {
		let path = temp_path("garbage");
		let sink = FileSnapshotSink::new(&path);

		assert_eq!(sink.load().await.expect("Missing file is not an error."), None);

		fs::create_dir_all(path.parent().expect("Temp path has a parent.")).expect("Mkdir.");
		fs::write(&path, "not json").expect("Fixture should be writable.");

		assert!(matches!(sink.load().await, Err(StoreError::Serialization { .. })));

		fs::remove_dir_all(path.parent().expect("Temp path has a parent.")).ok();
	}
}
