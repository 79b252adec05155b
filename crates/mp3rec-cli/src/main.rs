use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use mp3rec_core::{CollisionPolicy, RecoveryConfig, RecoveryDriver, RecoveryStatus, ResolvedTag, Scanner};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
	name = "mp3rec",
	version,
	about = "Recover MP3 file names from their ID3 tags",
	after_help = "The legacy form `mp3rec i=<input directory> o=<output directory>` is also accepted."
)]
struct Cli {
	/// Directory to scan recursively for recovered files
	input: PathBuf,
	/// Directory to copy renamed files into (mirrors the input layout)
	output: PathBuf,
	/// Substring a file name must contain to be considered
	#[arg(long, default_value = "mp3")]
	filter: String,
	/// What to do when two files resolve to the same name
	#[arg(long, value_enum, default_value = "overwrite")]
	on_collision: Collision,
	/// Compare SHA-256 of every copy against its source
	#[arg(long)]
	verify: bool,
	/// Show what would be recovered without writing anything
	#[arg(long)]
	dry_run: bool,
	/// Write a JSON report of the run to this file
	#[arg(long)]
	report: Option<PathBuf>,
	/// More log output (-v info, -vv debug)
	#[arg(short, long, action = ArgAction::Count)]
	verbose: u8,
	/// Only log errors
	#[arg(short, long, conflicts_with = "verbose")]
	quiet: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Collision {
	Overwrite,
	Suffix,
}

impl From<Collision> for CollisionPolicy {
	fn from(value: Collision) -> Self {
		match value {
			Collision::Overwrite => CollisionPolicy::Overwrite,
			Collision::Suffix => CollisionPolicy::Suffix,
		}
	}
}

/// Options whose value is the following token
const VALUE_OPTIONS: [&str; 3] = ["--filter", "--on-collision", "--report"];

/// Turn `i=<dir>` and `o=<dir>` tokens into the two positional arguments.
///
/// The value of an option (`--report o=run.json`) is passed through as is.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
	I: IntoIterator<Item = OsString>,
{
	let mut rest = Vec::new();
	let mut input = None;
	let mut output = None;
	let mut option_value = false;

	for arg in args {
		if std::mem::take(&mut option_value) {
			rest.push(arg);
			continue;
		}
		match arg.to_str() {
			Some(s) if s.starts_with("i=") => input = Some(OsString::from(&s[2..])),
			Some(s) if s.starts_with("o=") => output = Some(OsString::from(&s[2..])),
			Some(s) => {
				option_value = VALUE_OPTIONS.contains(&s);
				rest.push(arg);
			}
			None => rest.push(arg),
		}
	}

	rest.extend(input);
	rest.extend(output);
	rest
}

/// Console line for a recovered file: `<n>. <artist> - <title>`
fn recovered_line(sequence: u64, resolved: &ResolvedTag) -> String {
	format!("{}. {} - {}", sequence, resolved.artist(), resolved.title())
}

fn init_tracing(verbose: u8, quiet: bool) {
	let default_level = match (quiet, verbose) {
		(true, _) => "error",
		(false, 0) => "warn",
		(false, 1) => "info",
		(false, _) => "debug",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn main() -> Result<()> {
	let cli = Cli::parse_from(normalize_args(std::env::args_os()));
	init_tracing(cli.verbose, cli.quiet);

	println!("scanning {} and outputting to {}", cli.input.display(), cli.output.display());

	let config = RecoveryConfig {
		name_filter: cli.filter.clone(),
		collision_policy: cli.on_collision.into(),
		verify_copies: cli.verify,
		dry_run: cli.dry_run,
	};

	tracing::debug!("Recovery config: {:?}", config);

	// Scan up front so the progress bar knows its length.
	let records = Scanner::new(config.name_filter.clone()).scan(&cli.input)?;

	let bar = ProgressBar::new(records.len() as u64);
	bar.set_style(
		ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} recovered: {msg}")
			.unwrap_or_else(|_| ProgressStyle::default_bar()),
	);

	let mut driver = RecoveryDriver::new(config);
	let progress = bar.clone();
	driver.set_progress_callback(move |p| {
		match &p.file.status {
			RecoveryStatus::Recovered { .. } | RecoveryStatus::Planned { .. } => {
				if let Some(resolved) = &p.file.resolved {
					progress.println(recovered_line(p.file.sequence.unwrap_or_default(), resolved));
				}
			}
			RecoveryStatus::Skipped { reason } => {
				progress.println(format!("skipped {}: {}", p.file.source_path.display(), reason));
			}
			RecoveryStatus::Failed { reason } => {
				progress.println(format!("❌ failed {}: {}", p.file.source_path.display(), reason));
			}
		}
		progress.set_message(p.recovered.to_string());
		progress.inc(1);
	});

	let report = driver.run_records(&records, &cli.input, &cli.output);
	bar.finish_and_clear();

	if report.failed > 0 {
		println!("⚠️  {} files resolved but could not be written", report.failed);
	}
	println!("{}", report.summary());

	if let Some(path) = cli.report {
		let json = report.to_json().context("failed to serialize report")?;
		fs::write(&path, json).with_context(|| format!("failed to write report to {}", path.display()))?;
		println!("📄 Report written to {}", path.display());
	}

	Ok(())
}
