//! CLI argument parsing for the culvert demo runner.
//!
//! Uses clap derive macros for declarative argument definitions. The actual
//! spawn/tee/wait work is in `main.rs` and the `tee` module.

use clap::Parser;

/// Run a command wired to fresh pipes and tee its output.
///
/// The child's stdout and stderr are copied to this terminal with `out> `
/// and `err> ` line prefixes, one reader thread per stream. The runner exits
/// with the child's normalized exit status; 125 means the runner itself
/// failed.
#[derive(Parser, Debug)]
#[command(name = "culvert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Program to run (PATH-resolved, invoked with no arguments).
    pub command: String,

    /// Line to write to the child's standard input, followed by a newline.
    /// May be repeated; stdin is closed after the last line.
    #[arg(short, long, value_name = "LINE")]
    pub send: Vec<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
