//! Command-line surface for the demo binary.

use clap::Parser;

/// A small demonstration harness for the hook framework: builds one
/// namespace, registers a handful of hooks, and drives a few packets
/// through `hook_slow`.
#[derive(Parser, Debug)]
#[command(name = "nf-hooks-demo")]
#[command(about = "Demonstrates the packet-filtering hook framework")]
#[command(version)]
pub struct Cli {
    /// Logging verbosity: 0=error .. 4+=trace.
    #[arg(short, long, default_value_t = 2)]
    pub verbosity: u64,

    /// Number of concurrent reader tasks to spin up against the demo
    /// chain while the writer registers/unregisters a probe hook.
    #[arg(long, default_value_t = 4)]
    pub readers: usize,
}
