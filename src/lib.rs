//! Culvert: minimal pipe-wired subprocess plumbing for embedding host
//! runtimes.
//!
//! One spawn shape: fork the command with three fresh pipes on its standard
//! descriptors, no arguments, inherited environment. One I/O shape:
//! byte-granular blocking reads and writes on owned pipe endpoints, with
//! `Ok(None)` as end-of-stream. One reap shape: a consuming `wait` that
//! returns the child's termination status normalized to a single byte.
//!
//! The library never prints or logs; every failure comes back as a
//! [`CulvertError`] for the embedding caller to report. Unix only.
//!
//! ```no_run
//! let mut child = culvert::spawn("cat")?;
//! let mut stdin = child.stdin.take().unwrap();
//! let mut stdout = child.stdout.take().unwrap();
//!
//! stdin.write_byte(b'a')?;
//! stdin.write_byte(b'b')?;
//! drop(stdin); // end-of-stream for the child's input
//!
//! assert_eq!(stdout.read_byte()?, Some(b'a'));
//! assert_eq!(stdout.read_byte()?, Some(b'b'));
//! assert_eq!(stdout.read_byte()?, None);
//! assert_eq!(child.wait()?.code(), 0);
//! # Ok::<(), culvert::CulvertError>(())
//! ```

#[cfg(not(unix))]
compile_error!("culvert is built on fork, pipes, and waitpid; it requires a Unix platform");

pub mod error;
pub mod input;
pub mod pipe;
pub mod process;

pub use error::{CulvertError, Result};
pub use input::{read_file, read_line};
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use process::{ChildProcess, EXEC_FAILURE_CODE, ExitStatus, spawn};
