//! The persisted dependency graph: for each target, the set of
//! dependencies (and the mtime stamped for each) that were used the last
//! time it was successfully built.

use crate::error::{BuildError, ErrorWithLocation, Location};
use crate::mtime::Stamp;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Mutex;

/// One target's recorded dependencies, in the order they were declared.
pub type DepSet = IndexMap<String, Stamp>;

/// The in-memory mapping of target to [`DepSet`], with its own lock so it
/// can be shared across the rule threads that mutate it.
///
/// `merge`'s "first write this run replaces, later writes union" policy is
/// driven by a caller-supplied [`SeenSet`]: `ifchange` owns one `SeenSet`
/// per run and passes it in on every call.
pub struct DepsStore {
	map: Mutex<IndexMap<String, DepSet>>,
}

/// Tracks which targets have already had their [`DepSet`] freshly written
/// during the current run, so a second `ifchange` call for the same target
/// accumulates instead of clobbering the first call's dependencies.
#[derive(Default)]
pub struct SeenSet(Mutex<HashSet<String>>);

impl SeenSet {
	pub fn new() -> Self {
		SeenSet(Mutex::new(HashSet::new()))
	}

	/// Returns true if this is the first time `target` has been marked
	/// seen during this run.
	fn mark(&self, target: &str) -> bool {
		self.0.lock().unwrap().insert(target.to_string())
	}
}

impl DepsStore {
	pub fn new() -> Self {
		DepsStore {
			map: Mutex::new(IndexMap::new()),
		}
	}

	/// Load the store from `path`. A missing file is an empty store; a
	/// malformed file is a hard [`BuildError::Persistence`].
	pub fn load(path: &Path) -> Result<Self, BuildError> {
		let text = match std::fs::read_to_string(path) {
			Ok(text) => text,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				return Ok(DepsStore::new());
			}
			Err(e) => {
				return Err(BuildError::Persistence(
					Location {
						file: Some(path),
						line: None,
					}
					.error(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
				));
			}
		};
		let map: IndexMap<String, DepSet> = serde_json::from_str(&text).map_err(|e| {
			let line = std::num::NonZeroU32::new(e.line() as u32);
			BuildError::Persistence(ErrorWithLocation {
				file: Some(path.to_path_buf()),
				line,
				error: Box::new(e) as Box<dyn std::error::Error + Send + Sync>,
			})
		})?;
		Ok(DepsStore {
			map: Mutex::new(map),
		})
	}

	/// Write the store to `path`, via a temporary sibling file that is
	/// then renamed into place, so a crash mid-write cannot truncate the
	/// previous, still-valid, store.
	pub fn save(&self, path: &Path) -> Result<(), BuildError> {
		let map = self.map.lock().unwrap();
		let text = serde_json::to_string_pretty(&*map).map_err(|e| {
			BuildError::Persistence(
				Location {
					file: Some(path),
					line: None,
				}
				.error(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
			)
		})?;
		drop(map);
		let tmp_path = {
			let mut name = path.as_os_str().to_os_string();
			name.push(format!(".tmp.{}", std::process::id()));
			std::path::PathBuf::from(name)
		};
		std::fs::write(&tmp_path, text).map_err(|e| {
			BuildError::Persistence(
				Location {
					file: Some(&tmp_path),
					line: None,
				}
				.error(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
			)
		})?;
		std::fs::rename(&tmp_path, path).map_err(|e| {
			BuildError::Persistence(
				Location {
					file: Some(path),
					line: None,
				}
				.error(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
			)
		})?;
		Ok(())
	}

	/// Get a clone of the recorded `DepSet` for `target`, if any.
	pub fn get(&self, target: &str) -> Option<DepSet> {
		self.map.lock().unwrap().get(target).cloned()
	}

	/// Unconditionally replace the recorded `DepSet` for `target`.
	pub fn set(&self, target: &str, depset: DepSet) {
		self.map.lock().unwrap().insert(target.to_string(), depset);
	}

	/// Record `mydeps` as the dependencies of `target`, following the
	/// run's seen/replace/merge policy:
	///
	/// - no prior entry at all: store as-is, and mark `target` seen.
	/// - prior entry, but not yet seen this run: replace entirely (a
	///   stale dependency from a previous run is discarded).
	/// - prior entry, already seen this run: union-merge, with `mydeps`
	///   winning on key conflicts (a rule that calls `ifchange` more than
	///   once accumulates dependencies instead of clobbering them).
	pub fn record(&self, seen: &SeenSet, target: &str, mydeps: DepSet) {
		let first_write_this_run = seen.mark(target);
		let mut map = self.map.lock().unwrap();
		if !first_write_this_run {
			if let Some(existing) = map.get(target) {
				let mut merged = existing.clone();
				for (dep, stamp) in mydeps {
					merged.insert(dep, stamp);
				}
				map.insert(target.to_string(), merged);
				return;
			}
		}
		map.insert(target.to_string(), mydeps);
	}
}
