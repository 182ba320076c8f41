//! Bounded-concurrency dispatch of rule tasks.
//!
//! Each freshly scheduled target gets its own OS thread running its rule;
//! the thread itself is unbounded (dependency analysis and graph
//! bookkeeping are cheap), only the process-spawning operation inside a
//! rule is bounded, via [`crate::process::Permits`]. [`RunningMap`] ensures
//! at most one such thread per target is ever in flight within a run: a
//! second caller naming the same target gets a handle to the same
//! [`TaskSlot`] and observes the same result.

use crate::error::BuildError;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// The result a rule thread reports back: the target it built (which must
/// equal the target it was asked to build) and its exit status, or an
/// internal error if the rule itself could not run to completion.
pub type TaskResult = Result<(String, i32), Arc<BuildError>>;

/// A one-shot, multi-consumer result slot: any number of callers may
/// [`wait`][Self::wait] on it and all observe the same [`TaskResult`] once
/// the scheduled thread finishes.
pub struct TaskSlot {
	state: Mutex<Option<TaskResult>>,
	condvar: Condvar,
}

impl TaskSlot {
	fn new() -> Self {
		TaskSlot {
			state: Mutex::new(None),
			condvar: Condvar::new(),
		}
	}

	/// Record the task's outcome and wake every waiter. Called exactly
	/// once, by the thread running the scheduled rule.
	pub fn finish(&self, result: TaskResult) {
		*self.state.lock().unwrap() = Some(result);
		self.condvar.notify_all();
	}

	/// Block until the task has finished, then return its result.
	pub fn wait(&self) -> TaskResult {
		let mut state = self.state.lock().unwrap();
		while state.is_none() {
			state = self.condvar.wait(state).unwrap();
		}
		state.clone().unwrap()
	}
}

/// Deduplicates in-flight builds by target name.
#[derive(Default)]
pub struct RunningMap(Mutex<HashMap<String, Arc<TaskSlot>>>);

impl RunningMap {
	pub fn new() -> Self {
		RunningMap(Mutex::new(HashMap::new()))
	}

	/// Returns the existing slot for `target` if a build is already in
	/// flight, or installs and returns a fresh one via `start` if not.
	/// `start` is called with the new slot already installed in the map,
	/// so that any recursive `ifchange` reached from within the rule that
	/// names `target` again sees the very slot it is running under.
	pub fn get_or_start(&self, target: &str, start: impl FnOnce(Arc<TaskSlot>)) -> Arc<TaskSlot> {
		let mut map = self.0.lock().unwrap();
		if let Some(slot) = map.get(target) {
			return slot.clone();
		}
		let slot = Arc::new(TaskSlot::new());
		map.insert(target.to_string(), slot.clone());
		drop(map);
		start(slot.clone());
		slot
	}
}

/// Records which in-flight target each caller is currently blocked on, so
/// the scheduler can detect a wait that would close a cycle before it
/// blocks (rather than deadlocking, or in the reference implementation's
/// case, livelocking forever on a task that never completes).
#[derive(Default)]
pub struct WaitForEdges(Mutex<HashMap<String, String>>);

impl WaitForEdges {
	pub fn new() -> Self {
		WaitForEdges(Mutex::new(HashMap::new()))
	}

	/// If `waiting` blocking on `blocked_on` would close a cycle (i.e.
	/// `blocked_on` is itself, transitively, already waiting on `waiting`),
	/// returns an error instead of recording the edge. Otherwise records
	/// the edge and returns `Ok`.
	pub fn try_add(&self, waiting: &str, blocked_on: &str) -> Result<(), BuildError> {
		let mut edges = self.0.lock().unwrap();
		let mut cursor = blocked_on;
		loop {
			if cursor == waiting {
				return Err(BuildError::Cycle {
					waiting: waiting.to_string(),
					blocked_on: blocked_on.to_string(),
				});
			}
			match edges.get(cursor) {
				Some(next) => cursor = next,
				None => break,
			}
		}
		edges.insert(waiting.to_string(), blocked_on.to_string());
		Ok(())
	}

	pub fn remove(&self, waiting: &str) {
		self.0.lock().unwrap().remove(waiting);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn second_caller_reuses_the_same_slot() {
		let running = RunningMap::new();
		let mut started = 0;
		let slot_a = running.get_or_start("x", |slot| {
			started += 1;
			slot.finish(Ok(("x".to_string(), 0)));
		});
		let slot_b = running.get_or_start("x", |slot| {
			started += 1;
			slot.finish(Ok(("x".to_string(), 1)));
		});
		assert_eq!(started, 1);
		assert!(Arc::ptr_eq(&slot_a, &slot_b));
		assert_eq!(slot_a.wait().unwrap().1, 0);
	}

	#[test]
	fn direct_cycle_is_rejected() {
		let edges = WaitForEdges::new();
		edges.try_add("b", "a").unwrap();
		assert!(matches!(
			edges.try_add("a", "b"),
			Err(BuildError::Cycle { .. })
		));
	}

	#[test]
	fn transitive_cycle_is_rejected() {
		let edges = WaitForEdges::new();
		edges.try_add("b", "a").unwrap();
		edges.try_add("c", "b").unwrap();
		assert!(matches!(
			edges.try_add("a", "c"),
			Err(BuildError::Cycle { .. })
		));
	}

	#[test]
	fn unrelated_waits_do_not_conflict() {
		let edges = WaitForEdges::new();
		edges.try_add("b", "a").unwrap();
		assert!(edges.try_add("d", "c").is_ok());
	}
}
