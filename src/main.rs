mod logger;

use log::LevelFilter;
use rudo::context::BuildContext;
use rudo::depsstore::DepsStore;
use rudo::error::BuildError;
use rudo::rules::compile::CompileRule;
use rudo::rules::link::LinkRule;
use rudo::rules::RuleRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use structopt::StructOpt;

/// A minimal redo-style build engine.
///
/// With no positional targets, builds the reference project's default
/// target (the linked `bld/prog` executable).
#[derive(StructOpt)]
#[structopt(name = "rudo")]
struct Options {
	/// Number of external commands to run at once. Defaults to the
	/// detected number of CPUs.
	#[structopt(short = "j", long = "jobs")]
	jobs: Option<usize>,

	/// Where to read and write the persisted dependency graph.
	#[structopt(long = "deps-file", parse(from_os_str), default_value = ".deps")]
	deps_file: PathBuf,

	/// Compiler to invoke for `.c` sources. Falls back to the `CC`
	/// environment variable, then to `cc`, if not given.
	#[structopt(long = "cc")]
	cc: Option<String>,

	/// Targets to build. Defaults to the reference project's linked
	/// executable.
	targets: Vec<String>,

	#[structopt(subcommand)]
	cmd: Option<Subcommand>,
}

#[derive(StructOpt)]
enum Subcommand {
	/// Build (if needed), then run the resulting artifact.
	#[structopt(name = "run")]
	Run {
		/// Arguments forwarded to the built artifact.
		args: Vec<String>,
	},
}

const DEFAULT_TARGET: &str = "bld/prog";
const SRC_DIR: &str = "src";
const BLD_DIR: &str = "bld";

fn main() {
	log::set_max_level(LevelFilter::Info);
	log::set_logger(&logger::Logger).expect("installing logger");

	let options = Options::from_args();

	let cc = options
		.cc
		.clone()
		.or_else(|| std::env::var("CC").ok())
		.unwrap_or_else(|| "cc".to_string());

	if let Err(e) = std::fs::create_dir_all(BLD_DIR) {
		eprintln!("rudo: could not create {}: {}", BLD_DIR, e);
		std::process::exit(1);
	}

	let registry = match build_registry(&cc) {
		Ok(registry) => registry,
		Err(e) => {
			eprintln!("rudo: {}", e);
			std::process::exit(1);
		}
	};

	let jobs = options.jobs.unwrap_or_else(detect_jobs);

	let deps_store = match DepsStore::load(&options.deps_file) {
		Ok(store) => store,
		Err(e) => {
			eprintln!("rudo: {}", e);
			std::process::exit(1);
		}
	};

	let targets: Vec<String> = if options.targets.is_empty() {
		vec![DEFAULT_TARGET.to_string()]
	} else {
		options.targets.clone()
	};

	let ctx = BuildContext::with_deps_store(Arc::new(registry), jobs, deps_store);

	let start = Instant::now();
	let result = rudo::build::ifchange(&ctx, "all", &targets);
	let elapsed = start.elapsed();

	match result {
		Ok(()) => {
			if let Err(e) = ctx.deps_store.save(&options.deps_file) {
				eprintln!("rudo: {}", e);
				std::process::exit(1);
			}
			println!("rudo: build finished in {:.2}s", elapsed.as_secs_f64());
		}
		Err(e) => {
			eprintln!("rudo: {}", e);
			std::process::exit(1);
		}
	}

	if let Some(Subcommand::Run { args }) = options.cmd {
		let program = targets
			.first()
			.cloned()
			.unwrap_or_else(|| DEFAULT_TARGET.to_string());
		let status = std::process::Command::new(Path::new(".").join(&program))
			.args(&args)
			.status();
		match status {
			Ok(status) => std::process::exit(status.code().unwrap_or(1)),
			Err(e) => {
				eprintln!("rudo: could not run {}: {}", program, e);
				std::process::exit(1);
			}
		}
	}
}

fn detect_jobs() -> usize {
	std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1)
}

/// Builds the reference project's rule set: every `src/*.c` compiles to
/// `bld/<name>.dbg.o` (with a `bld/<name>.dbg.d` depfile alongside it),
/// and all of those objects link into `bld/prog`.
fn build_registry(cc: &str) -> Result<RuleRegistry, BuildError> {
	let mut registry = RuleRegistry::new();
	let mut objects = Vec::new();

	let entries = std::fs::read_dir(SRC_DIR).map_err(BuildError::Io)?;
	let mut sources: Vec<PathBuf> = entries
		.filter_map(|e| e.ok())
		.map(|e| e.path())
		.filter(|p| p.extension().map_or(false, |ext| ext == "c"))
		.collect();
	sources.sort();

	for source in sources {
		let stem = source
			.file_stem()
			.expect("source file has a name")
			.to_string_lossy()
			.into_owned();
		let object = format!("{}/{}.dbg.o", BLD_DIR, stem);
		let depfile = format!("{}/{}.dbg.d", BLD_DIR, stem);
		registry.register(
			object.clone(),
			Arc::new(CompileRule {
				source: source.to_string_lossy().into_owned(),
				object: object.clone(),
				depfile,
				cc: cc.to_string(),
				extra_args: vec!["-g".to_string()],
			}),
		);
		objects.push(object);
	}

	registry.register(
		DEFAULT_TARGET.to_string(),
		Arc::new(LinkRule {
			output: DEFAULT_TARGET.to_string(),
			objects,
			libs: vec![],
			cc: cc.to_string(),
		}),
	);

	Ok(registry)
}
