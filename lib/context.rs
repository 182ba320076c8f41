//! The explicit, reference-counted value carrying all process-wide state
//! for one build invocation, threaded through every call instead of using
//! true global/static variables.

use crate::depsstore::{DepsStore, SeenSet};
use crate::mtime::MtimeCache;
use crate::process::Permits;
use crate::rules::RuleRegistry;
use crate::scheduler::{RunningMap, WaitForEdges};
use std::sync::Arc;

/// Everything [`crate::build::ifchange`] and the rules it runs need: the
/// mtime cache, the persisted dependency store, the scheduler's
/// bookkeeping, the concurrency permit pool, and the rule registry.
///
/// Cloning a `BuildContext` is cheap: it is a bundle of `Arc`s, so every
/// rule thread gets its own handle to the same shared state.
#[derive(Clone)]
pub struct BuildContext {
	pub mtime: Arc<MtimeCache>,
	pub deps_store: Arc<DepsStore>,
	pub seen: Arc<SeenSet>,
	pub running: Arc<RunningMap>,
	pub wait_for: Arc<WaitForEdges>,
	pub permits: Arc<Permits>,
	pub registry: Arc<RuleRegistry>,
}

impl BuildContext {
	pub fn new(registry: Arc<RuleRegistry>, jobs: usize) -> Self {
		BuildContext {
			mtime: Arc::new(MtimeCache::new()),
			deps_store: Arc::new(DepsStore::new()),
			seen: Arc::new(SeenSet::new()),
			running: Arc::new(RunningMap::new()),
			wait_for: Arc::new(WaitForEdges::new()),
			permits: Arc::new(Permits::new(jobs)),
			registry,
		}
	}

	/// Like [`new`][Self::new], but starting from an already-loaded
	/// [`DepsStore`] (the persisted graph from a previous run).
	pub fn with_deps_store(registry: Arc<RuleRegistry>, jobs: usize, deps_store: DepsStore) -> Self {
		BuildContext {
			deps_store: Arc::new(deps_store),
			..BuildContext::new(registry, jobs)
		}
	}
}
