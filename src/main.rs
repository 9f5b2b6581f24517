use std::path::PathBuf;

use anyhow::Context;
use structopt::StructOpt;

use forcelayout::pool::resolve_thread_count;
use forcelayout::{run, RunConfig, DEFAULT_ITERATIONS};

/// Force-directed graph layout with sparsification and reference alignment.
#[derive(Debug, StructOpt)]
#[structopt(name = "forcelayout")]
struct Args {
    /// Input graph document (items + picks).
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Output coordinates document.
    #[structopt(parse(from_os_str))]
    output: PathBuf,

    /// Thread count; 0 auto-detects the online CPU count (capped at 16).
    #[structopt(short = "j", long = "threads", default_value = "0")]
    threads: usize,

    /// Force-step iteration count. An explicit 0 falls back to the default,
    /// matching the original CLI's treatment of a non-positive count.
    #[structopt(short = "i", long = "iterations", default_value = "1000")]
    iterations: usize,

    /// Initial positions, applied after the concentric-ring seeding.
    #[structopt(short = "p", long = "positions", parse(from_os_str))]
    positions: Option<PathBuf>,

    /// Reference layout to align the final result to.
    #[structopt(short = "r", long = "reference", parse(from_os_str))]
    reference: Option<PathBuf>,

    /// Suppress per-iteration energy and per-sparsify-step overlap logging.
    #[structopt(short = "q", long = "quiet")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::from_args();
    init_logging(args.quiet);

    let iterations = if args.iterations == 0 { DEFAULT_ITERATIONS } else { args.iterations };
    let threads = resolve_thread_count(args.threads);

    let config = RunConfig {
        input: args.input.clone(),
        output: args.output.clone(),
        positions: args.positions.clone(),
        reference: args.reference.clone(),
        threads,
        iterations,
        quiet: args.quiet,
    };

    run(&config).with_context(|| {
        format!(
            "forcelayout: failed to lay out {} -> {}",
            config.input.display(),
            config.output.display()
        )
    })
}

/// `env_logger` backend on the `log` facade. `-q` only lowers the default
/// filter; an explicit `RUST_LOG` always wins.
fn init_logging(quiet: bool) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if quiet { "warn" } else { "info" }),
    );
    builder.format_timestamp(None).init();
}
