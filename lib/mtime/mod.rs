//! Getting, and caching, the `mtime` of files to check if they're outdated.
//!
//! Unlike a plain `Option<Timestamp>`, [`Stamp::Missing`] never compares
//! equal to itself. A file that is missing on both the previous and the
//! current check must still count as *changed*, the same way the reference
//! implementation uses `float('nan')` for this purpose: `nan != nan`, so
//! "missing then" and "missing now" never compare equal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

/// The wire sentinel for [`Stamp::Missing`]. Real mtimes are always
/// non-negative seconds-since-epoch, so a fixed negative number is
/// unambiguous.
const MISSING_SENTINEL: f64 = -1.0;

/// The `mtime` of a file, or the distinguished "missing" value.
#[derive(Clone, Copy, Debug)]
pub enum Stamp {
	/// The file did not exist at the time this was observed.
	Missing,
	/// Seconds since the Unix epoch.
	Mtime(f64),
}

impl Stamp {
	/// Whether this stamp represents a file that existed when observed.
	pub fn exists(&self) -> bool {
		matches!(self, Stamp::Mtime(_))
	}
}

// `Missing` never equals anything, including another `Missing`: this is
// what makes "absent on both runs" still register as a change.
impl PartialEq for Stamp {
	fn eq(&self, other: &Stamp) -> bool {
		match (self, other) {
			(Stamp::Mtime(a), Stamp::Mtime(b)) => a == b,
			_ => false,
		}
	}
}

impl Serialize for Stamp {
	fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
		match self {
			Stamp::Missing => s.serialize_f64(MISSING_SENTINEL),
			Stamp::Mtime(t) => s.serialize_f64(*t),
		}
	}
}

impl<'de> Deserialize<'de> for Stamp {
	fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
		let t = f64::deserialize(d)?;
		Ok(if t < 0.0 { Stamp::Missing } else { Stamp::Mtime(t) })
	}
}

/// Looks up the `mtime` of a file, without any caching.
///
/// Returns [`Stamp::Missing`] if the file does not exist.
pub fn mtime(path: &Path) -> Result<Stamp, Error> {
	match std::fs::metadata(path).and_then(|m| m.modified()) {
		Ok(time) => {
			let secs = time
				.duration_since(UNIX_EPOCH)
				.map(|d| d.as_secs_f64())
				.unwrap_or(0.0);
			Ok(Stamp::Mtime(secs))
		}
		Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Stamp::Missing),
		Err(e) => Err(e),
	}
}

/// A cache of `mtime`s, shared for the lifetime of one build invocation.
///
/// Every query for a given path returns the same answer for the rest of the
/// run, until [`invalidate`][Self::invalidate] is called for that path (a
/// rule does this right after it has (re)written the file, so the next
/// query observes the fresh mtime rather than the pre-build one).
pub struct MtimeCache {
	cache: Mutex<HashMap<PathBuf, Stamp>>,
}

impl MtimeCache {
	pub fn new() -> Self {
		MtimeCache {
			cache: Mutex::new(HashMap::new()),
		}
	}

	/// Look up the `mtime` of `path`, consulting (and populating) the
	/// cache.
	pub fn getmtime(&self, path: &Path) -> Result<Stamp, Error> {
		if let Some(stamp) = self.cache.lock().unwrap().get(path) {
			return Ok(*stamp);
		}
		let stamp = mtime(path)?;
		self.cache.lock().unwrap().insert(path.to_path_buf(), stamp);
		Ok(stamp)
	}

	/// Drop any cached value for `path`. The next [`getmtime`][Self::getmtime]
	/// will re-stat the filesystem.
	pub fn invalidate(&self, path: &Path) {
		self.cache.lock().unwrap().remove(path);
	}
}
