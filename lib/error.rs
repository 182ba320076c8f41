//! Errors at a specific line in a file, and the engine's own error type.

use std::error::Error;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// A line in a file: the place where something went wrong.
///
/// Both fields are optional, in case they are not known.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Location<'a> {
	pub file: Option<&'a Path>,
	pub line: Option<NonZeroU32>,
}

impl Location<'static> {
	/// A [`Location`] with no location information.
	pub const UNKNOWN: Self = Location {
		file: None,
		line: None,
	};
}

/// An error which happened at a specific line in some file.
///
/// Use [`at`][AddLocationToError::at] on an [`Error`], or
/// [`err_at`][AddLocationToResult::err_at] on a [`Result`] to make one.
#[derive(Debug)]
pub struct ErrorWithLocation<T> {
	pub file: Option<PathBuf>,
	pub line: Option<NonZeroU32>,
	pub error: T,
}

impl<'a> Location<'a> {
	/// Create an error containing location information.
	pub fn error<E>(&self, error: E) -> ErrorWithLocation<E> {
		ErrorWithLocation {
			file: self.file.map(|p| p.to_path_buf()),
			line: self.line,
			error,
		}
	}
}

impl<A> ErrorWithLocation<A> {
	/// Get the location at which the error occurred.
	pub fn location(&self) -> Location {
		Location {
			file: self.file.as_ref().map(PathBuf::as_path),
			line: self.line,
		}
	}
}

/// Extension trait: adds [`err_at()`][Self::err_at] to [`Result`].
pub trait AddLocationToResult {
	type WithLocation;
	/// Add location information to the error.
	fn err_at(self, location: Location) -> Self::WithLocation;
}

/// Extension trait: adds [`at()`][Self::at] to any [`Error`].
pub trait AddLocationToError {
	type WithLocation;
	/// Add location information to the error.
	fn at(self, location: Location) -> Self::WithLocation;
}

impl<T, E> AddLocationToResult for Result<T, E> {
	type WithLocation = Result<T, ErrorWithLocation<E>>;
	fn err_at(self, location: Location) -> Self::WithLocation {
		self.map_err(|e| location.error(e))
	}
}

impl<E: Error> AddLocationToError for E {
	type WithLocation = ErrorWithLocation<E>;
	fn at(self, location: Location) -> Self::WithLocation {
		location.error(self)
	}
}

impl<'a> fmt::Display for Location<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if let Some(file) = self.file.as_ref() {
			write!(f, "{}", file.display())?;
		}
		if let Some(line) = self.line {
			write!(f, ":{}", line)?;
		}
		Ok(())
	}
}

impl<T: fmt::Display> fmt::Display for ErrorWithLocation<T> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.location() != Location::UNKNOWN {
			write!(f, "{}: ", self.location())?;
		}
		write!(f, "{}", self.error)
	}
}

impl<T: Error> Error for ErrorWithLocation<T> {}

/// The one error type threaded through the whole engine.
///
/// Every variant here corresponds to one of the error kinds the design
/// calls out: a target with no rule and no file, a rule that returned
/// non-zero, a dependency that failed (so its dependent never even ran its
/// own command), a malformed or unwritable `.deps` file, a process that
/// could not even be spawned, and a dependency wait that would have closed
/// a cycle among in-flight builds.
#[derive(Debug)]
pub enum BuildError {
	/// `target` has no matching rule, and does not exist on disk.
	NoRule(String),
	/// The rule for `target` returned a non-zero exit status; its stderr
	/// has already been forwarded to our own stderr.
	RuleFailure(String),
	/// At least one dependency of `target` failed, so `target`'s own
	/// command never ran.
	DependencyFailure(String),
	/// The on-disk dependency file could not be read, parsed, written, or
	/// renamed into place.
	Persistence(ErrorWithLocation<Box<dyn Error + Send + Sync>>),
	/// The child process for `target` could not be started at all.
	Spawn(String, std::io::Error),
	/// Waiting for `blocked_on` from `waiting` would have closed a cycle
	/// among the builds currently in flight.
	Cycle { waiting: String, blocked_on: String },
	/// Any other I/O failure (e.g. a `stat` that failed for a reason other
	/// than "file not found").
	Io(std::io::Error),
}

impl fmt::Display for BuildError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			BuildError::NoRule(target) => {
				write!(f, "no rule to make target {:?}, and it does not exist", target)
			}
			BuildError::RuleFailure(target) => write!(f, "{}: rule failed", target),
			BuildError::DependencyFailure(target) => {
				write!(f, "{}: not built because a dependency failed", target)
			}
			BuildError::Persistence(e) => write!(f, "{}", e),
			BuildError::Spawn(target, e) => write!(f, "{}: failed to start: {}", target, e),
			BuildError::Cycle { waiting, blocked_on } => write!(
				f,
				"dependency cycle: {:?} is waiting on {:?}, which is (transitively) waiting on {:?}",
				waiting, blocked_on, waiting
			),
			BuildError::Io(e) => write!(f, "{}", e),
		}
	}
}

impl Error for BuildError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			BuildError::Spawn(_, e) => Some(e),
			BuildError::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for BuildError {
	fn from(e: std::io::Error) -> Self {
		BuildError::Io(e)
	}
}
