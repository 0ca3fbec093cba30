use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pw-trace")]
#[command(about = "Record a Chromium performance trace and open it in the Firefox Profiler")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Remote debugging port of the browser
	#[arg(long, global = true, default_value_t = 9222)]
	pub port: u16,

	/// Browser endpoint (ws:// debugger URL or http:// base); overrides --port
	#[arg(long, global = true, value_name = "URL")]
	pub endpoint: Option<String>,

	/// Launch a browser on --port when none is listening
	#[arg(long, global = true)]
	pub launch: bool,

	/// Settings file (defaults to <config dir>/pw-trace/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Origin of the profiler that receives the trace
	#[arg(long, global = true, value_name = "ORIGIN")]
	pub origin: Option<String>,

	/// Largest piece pushed into the profiler page, in KiB
	#[arg(long, global = true, value_name = "KIB")]
	pub max_piece_kb: Option<usize>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List page targets of the browser
	#[command(alias = "ls")]
	Targets,

	/// Record a trace and hand it to the profiler (or a file)
	#[command(alias = "rec")]
	Record {
		/// Target id to trace (defaults to the first traceable page)
		#[arg(short, long)]
		target: Option<String>,

		/// Stop after this many seconds instead of waiting for Ctrl-C
		#[arg(short, long, value_name = "SECS")]
		duration: Option<u64>,

		/// Write the trace to this file instead of opening the profiler
		#[arg(short, long, value_name = "FILE")]
		output: Option<PathBuf>,
	},
}
