//! Spawning external commands under the global concurrency bound.

use std::io;
use std::process::{Command, Stdio};
use std::sync::{Condvar, Mutex};
use std::thread;

/// A counting permit pool, sized to the concurrency bound (`--jobs`, or the
/// detected CPU count). One permit is held for the lifetime of exactly one
/// child process; bookkeeping above the spawn (dependency analysis, graph
/// mutation, thread creation) needs no permit at all.
pub struct Permits {
	available: Mutex<usize>,
	condvar: Condvar,
}

impl Permits {
	pub fn new(count: usize) -> Self {
		Permits {
			available: Mutex::new(count.max(1)),
			condvar: Condvar::new(),
		}
	}

	fn acquire(&self) {
		let mut available = self.available.lock().unwrap();
		while *available == 0 {
			available = self.condvar.wait(available).unwrap();
		}
		*available -= 1;
	}

	fn release(&self) {
		*self.available.lock().unwrap() += 1;
		self.condvar.notify_one();
	}
}

/// The outcome of running one child process: its exit status (0 means
/// success) and whatever it wrote to stderr.
pub struct ProcessOutput {
	pub status: i32,
	pub stderr: Vec<u8>,
}

/// Spawns `program` with `args` (no shell interpolation), after acquiring a
/// permit from `permits`. Stdout is inherited by this process; stderr is
/// captured and returned. Internal spawn failures (missing executable,
/// permissions) are reported as a failing [`ProcessOutput`] rather than
/// propagated, matching the reference implementation's `SpawnError`
/// handling: the caller decides what a failed spawn means for its target.
pub fn aspawn(permits: &Permits, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
	permits.acquire();
	let result = (|| -> io::Result<ProcessOutput> {
		let mut child = Command::new(program)
			.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::inherit())
			.stderr(Stdio::piped())
			.spawn()?;

		// Read stderr on its own thread so a chatty child can't deadlock us
		// by filling its pipe buffer before we get around to `wait()`.
		let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
		let reader = thread::spawn(move || {
			use std::io::Read;
			let mut buf = Vec::new();
			let _ = stderr_pipe.read_to_end(&mut buf);
			buf
		});

		let status = child.wait()?;
		let stderr = reader.join().unwrap_or_default();
		Ok(ProcessOutput {
			status: status.code().unwrap_or(1),
			stderr,
		})
	})();
	permits.release();
	result
}
