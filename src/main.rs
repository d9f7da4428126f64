//! Culvert demo runner: spawn a command wired to fresh pipes, feed its
//! stdin, and tee its output with line prefixes.
//!
//! The process exits with the child's normalized exit status, so an exec
//! failure shows up as 127 at the shell. Failures of the runner itself are
//! reported on stderr and exit 125 to stay distinguishable from any child
//! status.

mod cli;
mod tee;

use std::io;
use std::process::ExitCode;
use std::thread::JoinHandle;

use cli::Cli;
use culvert::{CulvertError, ExitStatus, PipeWriter, spawn};

/// Exit code when the runner fails, as opposed to the child.
const RUNNER_FAILURE: u8 = 125;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match run(cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(RUNNER_FAILURE)
        }
    }
}

fn run(cli: Cli) -> io::Result<ExitStatus> {
    let mut child = spawn(&cli.command).map_err(io::Error::other)?;
    let (Some(mut stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(io::Error::other("spawn returned a handle missing endpoints"));
    };

    // Drain both output streams while stdin is being fed, one thread per
    // stream, so a chatty child never deadlocks on a full pipe buffer.
    let out_thread = tee::spawn_tee_thread(stdout, "out> ");
    let err_thread = tee::spawn_tee_thread(stderr, "err> ");

    feed_stdin(&mut stdin, &cli.send)?;
    // End-of-stream for the child's input.
    drop(stdin);

    join_tee(out_thread)?;
    join_tee(err_thread)?;

    child.wait().map_err(io::Error::other)
}

/// Write each line plus a newline to the child's stdin, byte by byte.
///
/// A broken pipe means the child closed its input (or already exited);
/// the remaining lines are dropped and the child's exit status is still
/// what the run reports. Other write failures abort the run.
fn feed_stdin(stdin: &mut PipeWriter, lines: &[String]) -> io::Result<()> {
    for line in lines {
        for &byte in line.as_bytes().iter().chain(b"\n") {
            match stdin.write_byte(byte) {
                Ok(()) => {}
                Err(CulvertError::Write { source })
                    if source.kind() == io::ErrorKind::BrokenPipe =>
                {
                    return Ok(());
                }
                Err(err) => return Err(io::Error::other(err)),
            }
        }
    }
    Ok(())
}

fn join_tee(handle: JoinHandle<io::Result<()>>) -> io::Result<()> {
    handle
        .join()
        .map_err(|_| io::Error::other("tee thread panicked"))?
}
