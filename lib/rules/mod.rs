//! Resolving a target name to the rule that builds it.

pub mod compile;
pub mod link;

use crate::context::BuildContext;
use crate::error::BuildError;
use std::collections::HashMap;
use std::sync::Arc;

/// A build rule: given the target it was asked to build, does whatever
/// work produces it and reports the target (which must equal what it was
/// asked for) and an exit status (0 = success).
///
/// Rules may themselves call [`crate::build::ifchange`] to declare and
/// build their own dependencies before doing their own work.
pub trait Rule: Send + Sync {
	fn run(&self, ctx: &BuildContext, target: &str) -> Result<(String, i32), BuildError>;
}

/// The fallback rule for any target with no matching rule: it succeeds,
/// with an empty recorded `DepSet`, if the file already exists on disk;
/// otherwise it fails with [`BuildError::NoRule`]. This is what makes a
/// plain source file a valid leaf of the dependency graph.
pub struct ExistsOnlyRule;

impl Rule for ExistsOnlyRule {
	fn run(&self, ctx: &BuildContext, target: &str) -> Result<(String, i32), BuildError> {
		if ctx.mtime.getmtime(target.as_ref())?.exists() {
			ctx.deps_store.set(target, crate::depsstore::DepSet::new());
			Ok((target.to_string(), 0))
		} else {
			Err(BuildError::NoRule(target.to_string()))
		}
	}
}

/// Maps a target name to the [`Rule`] that builds it.
///
/// Resolution order: an exact match on the target name, then
/// `"default" + extension`, then the [`ExistsOnlyRule`] fallback.
pub struct RuleRegistry {
	exact: HashMap<String, Arc<dyn Rule>>,
	by_extension: HashMap<String, Arc<dyn Rule>>,
	fallback: Arc<dyn Rule>,
}

impl RuleRegistry {
	pub fn new() -> Self {
		RuleRegistry {
			exact: HashMap::new(),
			by_extension: HashMap::new(),
			fallback: Arc::new(ExistsOnlyRule),
		}
	}

	/// Register `rule` under an exact target name, e.g. `"bld/prog"`.
	pub fn register(&mut self, target: impl Into<String>, rule: Arc<dyn Rule>) {
		self.exact.insert(target.into(), rule);
	}

	/// Register `rule` as the default rule for every target ending in
	/// `extension` (including the dot, e.g. `".o"`) that has no exact
	/// match of its own.
	pub fn register_default(&mut self, extension: impl Into<String>, rule: Arc<dyn Rule>) {
		self.by_extension.insert(extension.into(), rule);
	}

	pub fn get_rule(&self, target: &str) -> Arc<dyn Rule> {
		if let Some(rule) = self.exact.get(target) {
			return rule.clone();
		}
		if let Some(dot) = target.rfind('.') {
			if let Some(rule) = self.by_extension.get(&target[dot..]) {
				return rule.clone();
			}
		}
		self.fallback.clone()
	}
}
