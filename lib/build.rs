//! `ifchange`: the primitive by which a rule (or the entry point) declares
//! "I depend on these targets; rebuild them first and record them as my
//! dependencies."
//!
//! This is the central primitive the whole engine is built around (see
//! the module-level overview in the crate root). Everything else,
//! [`crate::oracle`], [`crate::scheduler`], [`crate::depsstore`], exists
//! to make this one function correct and concurrent.

use crate::context::BuildContext;
use crate::depsstore::DepSet;
use crate::error::BuildError;
use crate::oracle::is_up_to_date;
use crate::scheduler::TaskSlot;
use log::{debug, error};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// Declares that `me` depends on `targets`: stamps each dependency's
/// current mtime, schedules a rebuild for any that are not up to date,
/// waits for all of them, and, if every one of them succeeded, records
/// the (possibly refreshed) dependency set for `me`.
///
/// Siblings are always all awaited, even once one has failed, so that a
/// multi-dependency failure is reported in full rather than stopping at
/// the first error. On any failure, `me`'s dependency record is left
/// untouched: a caller's `DepSet` is only ever updated on success.
pub fn ifchange(ctx: &BuildContext, me: &str, targets: &[impl AsRef<str>]) -> Result<(), BuildError> {
	let mut mydeps = DepSet::new();
	let mut scheduled: Vec<(String, Arc<TaskSlot>)> = Vec::new();

	for dep in targets {
		let dep = dep.as_ref();
		let stamp = ctx.mtime.getmtime(Path::new(dep))?;
		mydeps.insert(dep.to_string(), stamp);

		if is_up_to_date(ctx, dep)? {
			continue;
		}

		let slot = schedule(ctx, dep);
		scheduled.push((dep.to_string(), slot));
	}

	let mut failed = false;

	for (dep, slot) in scheduled {
		ctx.wait_for.try_add(me, &dep)?;
		let result = slot.wait();
		ctx.wait_for.remove(me);

		match result {
			Err(err) => {
				error!(target: "rudo::build", "{}: {}", dep, err);
				failed = true;
			}
			Ok((built, status)) => {
				let stamp = ctx.mtime.getmtime(Path::new(&built))?;
				if status != 0 {
					error!(target: "rudo::build", "{}", BuildError::RuleFailure(built.clone()));
					failed = true;
				}
				mydeps.insert(built, stamp);
			}
		}
	}

	if failed {
		eprintln!("rudo: *** [{}] failed", me);
		return Err(BuildError::DependencyFailure(me.to_string()));
	}

	ctx.deps_store.record(&ctx.seen, me, mydeps);
	Ok(())
}

/// Returns the [`TaskSlot`] for `target`'s build, reusing an already
/// in-flight one if there is one, otherwise resolving its rule and
/// spawning a fresh thread to run it.
fn schedule(ctx: &BuildContext, target: &str) -> Arc<TaskSlot> {
	let ctx = ctx.clone();
	let running = ctx.running.clone();
	let target_owned = target.to_string();
	running.get_or_start(target, move |slot| {
		println!("{}", target_owned);
		let ctx = ctx.clone();
		let target = target_owned.clone();
		thread::spawn(move || {
			let rule = ctx.registry.get_rule(&target);
			debug!(target: "rudo::build", "running rule for {}", target);
			let result = rule.run(&ctx, &target).map_err(Arc::new);
			slot.finish(result);
		});
	})
}
