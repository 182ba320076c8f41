//! A reference rule: link a list of object files (and libraries) into one
//! executable.

use crate::build::ifchange;
use crate::context::BuildContext;
use crate::error::BuildError;
use crate::process::aspawn;
use crate::rules::Rule;
use std::io::Write;
use std::path::Path;

/// Links `objects` (and `libs`, passed through unchanged after them) into
/// `output`, using `cc` as the linker driver.
pub struct LinkRule {
	pub output: String,
	pub objects: Vec<String>,
	pub libs: Vec<String>,
	pub cc: String,
}

impl Rule for LinkRule {
	fn run(&self, ctx: &BuildContext, target: &str) -> Result<(String, i32), BuildError> {
		assert_eq!(target, self.output, "rule asked to build a different target than it was registered for");

		ifchange(ctx, target, &self.objects)?;

		let mut args = vec!["-o".to_string(), self.output.clone()];
		args.extend(self.objects.iter().cloned());
		args.extend(self.libs.iter().cloned());

		let output = aspawn(&ctx.permits, &self.cc, &args).map_err(|e| BuildError::Spawn(target.to_string(), e))?;
		if output.status != 0 {
			std::io::stderr().write_all(&output.stderr).ok();
			return Ok((target.to_string(), output.status));
		}

		ctx.mtime.invalidate(Path::new(&self.output));
		Ok((target.to_string(), 0))
	}
}
