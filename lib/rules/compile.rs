//! A reference rule: compile one source file into one object file, picking
//! up header dependencies dynamically from the compiler's own Make-style
//! depfile output.
//!
//! This is the canonical demonstration of the engine's design: the rule
//! does not know its own header dependencies ahead of time; it discovers
//! them by asking the compiler to emit a depfile, then feeding that
//! depfile's contents back through `ifchange`.

use crate::build::ifchange;
use crate::context::BuildContext;
use crate::depfile::read_dep_list;
use crate::error::BuildError;
use crate::process::aspawn;
use crate::rules::Rule;
use std::io::Write;
use std::path::Path;

/// Compiles `source` into `object`, with GCC/Clang-style depfile output at
/// `depfile`. `cc` is the compiler to invoke (its path, plus any flags the
/// caller wants on every invocation, e.g. `-Wall`); `extra_args` are
/// appended after the fixed `-c -o object -MMD -MF depfile source` shape.
pub struct CompileRule {
	pub source: String,
	pub object: String,
	pub depfile: String,
	pub cc: String,
	pub extra_args: Vec<String>,
}

impl Rule for CompileRule {
	fn run(&self, ctx: &BuildContext, target: &str) -> Result<(String, i32), BuildError> {
		assert_eq!(target, self.object, "rule asked to build a different target than it was registered for");

		// Step 1: if a depfile survives from a prior build, its contents
		// are last run's best guess at our dependencies (including the
		// source file itself, which a `-MMD`-style depfile always lists);
		// rebuild those (transitively) before we recompile. If there is no
		// prior depfile yet, we have no dependency knowledge at all, and
		// compile blind, the bootstrap case closed further down.
		let had_prior_depfile = Path::new(&self.depfile).exists();
		if had_prior_depfile {
			let prior_deps = read_dep_list(Path::new(&self.depfile))?;
			ifchange(ctx, target, &prior_deps)?;
		}

		let mut args = vec![
			"-c".to_string(),
			self.source.clone(),
			"-o".to_string(),
			self.object.clone(),
			"-MMD".to_string(),
			"-MF".to_string(),
			self.depfile.clone(),
		];
		args.extend(self.extra_args.iter().cloned());

		let output = aspawn(&ctx.permits, &self.cc, &args).map_err(|e| BuildError::Spawn(target.to_string(), e))?;
		if output.status != 0 {
			std::io::stderr().write_all(&output.stderr).ok();
			return Ok((target.to_string(), output.status));
		}

		// Both were just (re)written; dependents must see the fresh mtime.
		ctx.mtime.invalidate(Path::new(&self.object));
		ctx.mtime.invalidate(Path::new(&self.depfile));

		// The depfile itself is a dependency: if its *contents* change
		// (different headers next time) we must reconsider this target.
		ifchange(ctx, target, &[self.depfile.clone()])?;

		// Bootstrap case: there was no prior depfile, so the one we just
		// wrote is the first real dependency information we have. Feed it
		// back through ifchange now so DepsStore ends up accurate even on
		// the very first build.
		if !had_prior_depfile {
			let fresh_deps = read_dep_list(Path::new(&self.depfile))?;
			ifchange(ctx, target, &fresh_deps)?;
		}

		Ok((target.to_string(), 0))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::rules::RuleRegistry;
	use std::sync::Arc;

	fn have_cc() -> bool {
		std::process::Command::new("cc")
			.arg("--version")
			.stdout(std::process::Stdio::null())
			.stderr(std::process::Stdio::null())
			.status()
			.map(|s| s.success())
			.unwrap_or(false)
	}

	#[test]
	fn compiles_and_records_header_dependency() {
		if !have_cc() {
			return;
		}
		let dir = tempfile::tempdir().unwrap();
		let header = dir.path().join("common.h");
		let source = dir.path().join("x.c");
		let object = dir.path().join("x.o");
		let depfile = dir.path().join("x.d");

		std::fs::write(&header, "#define VALUE 1\n").unwrap();
		std::fs::write(&source, "#include \"common.h\"\nint main(void) { return VALUE - 1; }\n").unwrap();

		let mut registry = RuleRegistry::new();
		registry.register(
			object.to_string_lossy().into_owned(),
			Arc::new(CompileRule {
				source: source.to_string_lossy().into_owned(),
				object: object.to_string_lossy().into_owned(),
				depfile: depfile.to_string_lossy().into_owned(),
				cc: "cc".to_string(),
				extra_args: vec![],
			}),
		);

		let ctx = BuildContext::new(Arc::new(registry), 2);
		crate::build::ifchange(&ctx, "all", &[object.to_string_lossy().into_owned()]).unwrap();

		assert!(object.exists());
		assert!(depfile.exists());
		let recorded = ctx.deps_store.get(&object.to_string_lossy()).unwrap();
		assert!(recorded.contains_key(&header.to_string_lossy().into_owned()));
	}
}
