//! This library crate contains the re-usable parts of `rudo`, a minimal
//! redo-style build engine.
//!
//! # Core pieces
//!
//! - [`mtime`]: a process-wide cache of filesystem modification times, with
//!   a "missing" sentinel that never compares equal to itself.
//! - [`depsstore`]: the on-disk (and in-memory) record of which dependencies,
//!   stamped at which mtime, each target was last built from.
//! - [`oracle`]: the recursive up-to-date check that decides whether a
//!   target may be skipped.
//! - [`scheduler`]: bounded-concurrency dispatch of rule tasks, with
//!   deduplication of in-flight builds and cycle detection.
//! - [`process`]: spawns external commands under the concurrency bound.
//! - [`rules`]: resolves a target name to the [`rules::Rule`] that builds
//!   it, plus a couple of reference rules (C compile, link).
//! - [`build`]: the `ifchange` primitive that ties all of the above
//!   together.
//! - [`depfile`]: parsing of `Makefile`-style dependency files, as emitted
//!   by compilers such as GCC and Clang.
//!
//! # Error handling
//!
//! [`error::BuildError`] is the single error type threaded through the
//! engine; [`error::ErrorWithLocation`] adds file/line information to
//! parse errors, in the spirit of carrying enough context to point a user
//! at the problem.

pub mod build;
pub mod context;
pub mod depfile;
pub mod depsstore;
pub mod error;
pub mod mtime;
pub mod oracle;
pub mod process;
pub mod rules;
pub mod scheduler;
