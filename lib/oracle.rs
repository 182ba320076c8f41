//! The recursive up-to-date check: decides whether a target's build may be
//! skipped entirely.

use crate::context::BuildContext;
use crate::error::BuildError;
use std::collections::HashSet;
use std::path::Path;

/// Returns true iff `target` may be skipped: it exists, has a recorded
/// `DepSet`, every recorded dependency's mtime still matches the stamp,
/// and every one of those dependencies is itself up to date.
///
/// A target that is re-entered while its own check is still on the current
/// recursion stack (a cycle in the recorded graph) is treated as not up to
/// date, rather than recursing forever. A target reached a second time
/// through a different path (a diamond: two dependents sharing one
/// dependency) is not a cycle, and must be revisited so a shared node that
/// is genuinely up to date doesn't make every one of its dependents look
/// stale.
pub fn is_up_to_date(ctx: &BuildContext, target: &str) -> Result<bool, BuildError> {
	let mut visiting = HashSet::new();
	let mut verified = HashSet::new();
	check(ctx, target, &mut visiting, &mut verified)
}

fn check(
	ctx: &BuildContext,
	target: &str,
	visiting: &mut HashSet<String>,
	verified: &mut HashSet<String>,
) -> Result<bool, BuildError> {
	if verified.contains(target) {
		return Ok(true);
	}
	if !visiting.insert(target.to_string()) {
		return Ok(false);
	}

	let result = (|| -> Result<bool, BuildError> {
		if !ctx.mtime.getmtime(Path::new(target))?.exists() {
			return Ok(false);
		}

		let depset = match ctx.deps_store.get(target) {
			Some(depset) => depset,
			None => return Ok(false),
		};

		for (dep, stamp) in &depset {
			let current = ctx.mtime.getmtime(Path::new(dep))?;
			if current != *stamp {
				return Ok(false);
			}
			if !check(ctx, dep, visiting, verified)? {
				return Ok(false);
			}
		}

		Ok(true)
	})();

	visiting.remove(target);
	if matches!(result, Ok(true)) {
		verified.insert(target.to_string());
	}
	result
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::context::BuildContext;
	use crate::depsstore::DepSet;
	use crate::mtime::Stamp;
	use crate::rules::RuleRegistry;
	use std::sync::Arc;

	fn ctx() -> BuildContext {
		BuildContext::new(Arc::new(RuleRegistry::new()), 1)
	}

	#[test]
	fn missing_target_is_not_up_to_date() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = ctx();
		let target = dir.path().join("nope").to_string_lossy().into_owned();
		assert!(!is_up_to_date(&ctx, &target).unwrap());
	}

	#[test]
	fn target_without_recorded_depset_is_not_up_to_date() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = ctx();
		let target = dir.path().join("f");
		std::fs::write(&target, b"x").unwrap();
		assert!(!is_up_to_date(&ctx, &target.to_string_lossy()).unwrap());
	}

	#[test]
	fn matching_stamps_are_up_to_date() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = ctx();
		let dep = dir.path().join("dep");
		let target = dir.path().join("out");
		std::fs::write(&dep, b"x").unwrap();
		std::fs::write(&target, b"y").unwrap();

		let dep_stamp = ctx.mtime.getmtime(&dep).unwrap();
		let mut deps = DepSet::new();
		deps.insert(dep.to_string_lossy().into_owned(), dep_stamp);
		ctx.deps_store.set(&target.to_string_lossy(), deps);
		// `dep` is itself a leaf with no dependencies of its own; it still
		// needs a recorded (empty) DepSet to count as up to date, the same
		// way `ExistsOnlyRule` registers one for a plain source file.
		ctx.deps_store.set(&dep.to_string_lossy(), DepSet::new());

		assert!(is_up_to_date(&ctx, &target.to_string_lossy()).unwrap());
	}

	#[test]
	fn changed_dependency_is_not_up_to_date() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = ctx();
		let dep = dir.path().join("dep");
		let target = dir.path().join("out");
		std::fs::write(&dep, b"x").unwrap();
		std::fs::write(&target, b"y").unwrap();

		let mut deps = DepSet::new();
		deps.insert(dep.to_string_lossy().into_owned(), Stamp::Mtime(1.0));
		ctx.deps_store.set(&target.to_string_lossy(), deps);

		assert!(!is_up_to_date(&ctx, &target.to_string_lossy()).unwrap());
	}

	#[test]
	fn shared_dependency_reached_twice_is_still_up_to_date() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = ctx();
		let common = dir.path().join("common.h");
		let a = dir.path().join("a.o");
		let b = dir.path().join("b.o");
		let prog = dir.path().join("prog");
		std::fs::write(&common, b"x").unwrap();
		std::fs::write(&a, b"x").unwrap();
		std::fs::write(&b, b"x").unwrap();
		std::fs::write(&prog, b"x").unwrap();

		let common_stamp = ctx.mtime.getmtime(&common).unwrap();
		ctx.deps_store.set(&common.to_string_lossy(), DepSet::new());
		let mut a_deps = DepSet::new();
		a_deps.insert(common.to_string_lossy().into_owned(), common_stamp);
		ctx.deps_store.set(&a.to_string_lossy(), a_deps);

		let mut b_deps = DepSet::new();
		b_deps.insert(common.to_string_lossy().into_owned(), common_stamp);
		ctx.deps_store.set(&b.to_string_lossy(), b_deps);

		let a_stamp = ctx.mtime.getmtime(&a).unwrap();
		let b_stamp = ctx.mtime.getmtime(&b).unwrap();
		let mut prog_deps = DepSet::new();
		prog_deps.insert(a.to_string_lossy().into_owned(), a_stamp);
		prog_deps.insert(b.to_string_lossy().into_owned(), b_stamp);
		ctx.deps_store.set(&prog.to_string_lossy(), prog_deps);

		assert!(is_up_to_date(&ctx, &prog.to_string_lossy()).unwrap());
	}

	#[test]
	fn self_referential_depset_does_not_recurse_forever() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = ctx();
		let target = dir.path().join("out");
		std::fs::write(&target, b"y").unwrap();
		let stamp = ctx.mtime.getmtime(&target).unwrap();

		let mut deps = DepSet::new();
		deps.insert(target.to_string_lossy().into_owned(), stamp);
		ctx.deps_store.set(&target.to_string_lossy(), deps);

		assert!(!is_up_to_date(&ctx, &target.to_string_lossy()).unwrap());
	}
}
