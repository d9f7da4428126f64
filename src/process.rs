//! Child process launch, handle, and reap.
//!
//! [`spawn`] allocates three close-on-exec pipes, forks, wires the child
//! ends onto the child's standard descriptors, and execs the command with no
//! arguments and the inherited environment. The returned handle owns the
//! parent-side endpoints; consuming it with [`ChildProcess::wait`] reaps the
//! child exactly once.

use std::ffi::{CStr, CString};
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, fork};

use crate::error::{CulvertError, Result};
use crate::pipe::{Pipe, PipeReader, PipeWriter};

/// Exit status of a child whose exec failed after the fork.
///
/// Matches the shell convention for "command not found". A child that cannot
/// exec terminates immediately with this status; it never falls through into
/// code belonging to the parent.
pub const EXEC_FAILURE_CODE: u8 = 127;

/// Spawn `command` wired to fresh stdin/stdout/stderr pipes.
///
/// The command is a bare program name or path, resolved through `PATH` and
/// invoked with no arguments beyond the program name itself. The child
/// inherits the spawner's environment. Exec failure (missing binary, not
/// executable) is only detectable inside the child and surfaces as exit
/// status [`EXEC_FAILURE_CODE`] through [`ChildProcess::wait`], with the
/// child's streams ending immediately.
///
/// Fails with [`CulvertError::Spawn`] if pipe or fork allocation fails; no
/// child exists in that case and every descriptor already allocated is
/// released on the way out.
///
/// # Examples
///
/// ```no_run
/// let mut child = culvert::spawn("cat")?;
/// let mut stdin = child.stdin.take().unwrap();
/// let mut stdout = child.stdout.take().unwrap();
///
/// stdin.write_byte(b'a')?;
/// drop(stdin);
///
/// assert_eq!(stdout.read_byte()?, Some(b'a'));
/// assert_eq!(stdout.read_byte()?, None);
/// assert!(child.wait()?.success());
/// # Ok::<(), culvert::CulvertError>(())
/// ```
pub fn spawn(command: &str) -> Result<ChildProcess> {
    let program = CString::new(command).map_err(|_| CulvertError::Spawn {
        command: command.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "command contains a NUL byte"),
    })?;

    let stdin = Pipe::new().map_err(|errno| spawn_error(command, errno))?;
    let stdout = Pipe::new().map_err(|errno| spawn_error(command, errno))?;
    let stderr = Pipe::new().map_err(|errno| spawn_error(command, errno))?;

    // Built before the fork so the child never allocates: argv is the
    // program name followed by the NULL terminator execvp expects.
    let argv: [*const libc::c_char; 2] = [program.as_ptr(), std::ptr::null()];

    // SAFETY: the child branch runs only async-signal-safe calls (dup2,
    // signal, execvp, _exit); the program string and argv array are built
    // before the fork.
    match unsafe { fork() }.map_err(|errno| spawn_error(command, errno))? {
        ForkResult::Child => exec_child(&program, &argv, stdin.read, stdout.write, stderr.write),
        ForkResult::Parent { child } => Ok(ChildProcess {
            pid: child,
            stdin: Some(PipeWriter::new(stdin.write)),
            stdout: Some(PipeReader::new(stdout.read)),
            stderr: Some(PipeReader::new(stderr.read)),
        }),
        // The child-facing pipe ends drop (close) here in the parent.
    }
}

fn spawn_error(command: &str, errno: Errno) -> CulvertError {
    CulvertError::Spawn {
        command: command.to_string(),
        source: errno.into(),
    }
}

/// Child-side tail of the fork. Never returns.
fn exec_child(
    program: &CStr,
    argv: &[*const libc::c_char; 2],
    stdin: OwnedFd,
    stdout: OwnedFd,
    stderr: OwnedFd,
) -> ! {
    // dup2 clears close-on-exec on the duplicate, so exactly descriptors
    // 0/1/2 survive the exec; every other pipe end closes with it.
    let wired = dup2(stdin.as_raw_fd(), libc::STDIN_FILENO).is_ok()
        && dup2(stdout.as_raw_fd(), libc::STDOUT_FILENO).is_ok()
        && dup2(stderr.as_raw_fd(), libc::STDERR_FILENO).is_ok();

    if wired {
        // The Rust runtime ignores SIGPIPE process-wide and the disposition
        // would survive the exec; give the child the default back.
        unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL) };
        // Program name is the only argument; environment is inherited.
        // Returns only on failure.
        // SAFETY: program is a valid NUL-terminated string and argv points
        // at it followed by the NULL terminator, both alive across the call.
        unsafe { libc::execvp(program.as_ptr(), argv.as_ptr()) };
    }

    // SAFETY: _exit is async-signal-safe and does not run any cleanup that
    // belongs to the parent's image.
    unsafe { libc::_exit(i32::from(EXEC_FAILURE_CODE)) }
}

/// Handle to a spawned child and the pipe endpoints wired to it.
///
/// The endpoints start out held by the handle. Take them out (for example to
/// drive stdout and stderr from one thread each, which is how callers avoid
/// pipe-buffer deadlock on chatty children) and they live independently of
/// the handle, staying readable even after the child is reaped.
///
/// Dropping the handle without waiting closes whichever endpoints it still
/// holds but does not signal or reap the child.
#[derive(Debug)]
pub struct ChildProcess {
    pid: Pid,
    /// Write end connected to the child's standard input. Dropping it is
    /// how the child's input reaches end-of-stream.
    pub stdin: Option<PipeWriter>,
    /// Read end connected to the child's standard output.
    pub stdout: Option<PipeReader>,
    /// Read end connected to the child's standard error.
    pub stderr: Option<PipeReader>,
}

impl ChildProcess {
    /// OS process id of the child.
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Block until the child terminates, reap it, and return its normalized
    /// exit status.
    ///
    /// Consuming the handle makes a second wait unrepresentable. The stdin
    /// endpoint still held by the handle is closed before blocking, so a
    /// child reading its input sees end-of-stream rather than deadlocking
    /// against its own waiter. Endpoints still held when `wait` returns are
    /// released with the handle; endpoints taken out beforehand are not
    /// touched, reaping does not close pipes.
    ///
    /// A child that fills a pipe buffer nobody drains blocks on that write,
    /// and `wait` blocks with it. Drain stdout and stderr concurrently while
    /// waiting on children that produce real output.
    ///
    /// Fails with [`CulvertError::Wait`] if the reap itself fails; a
    /// fabricated status is never returned.
    pub fn wait(mut self) -> Result<ExitStatus> {
        drop(self.stdin.take());
        let status = waitpid(self.pid, None).map_err(|errno| CulvertError::Wait {
            pid: self.pid.as_raw(),
            source: errno.into(),
        })?;
        ExitStatus::from_wait_status(status).ok_or_else(|| CulvertError::Wait {
            pid: self.pid.as_raw(),
            source: io::Error::other(format!("unexpected wait status: {status:?}")),
        })
    }
}

/// Normalized termination status of a reaped child, always one byte.
///
/// A normal exit keeps the low 8 bits of its exit code; termination by
/// signal N maps to 128 + N, the shell convention. Produced exactly once per
/// child, by [`ChildProcess::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(u8);

impl ExitStatus {
    /// The normalized code, 0 through 255.
    pub fn code(self) -> u8 {
        self.0
    }

    /// True when the child exited 0.
    pub fn success(self) -> bool {
        self.0 == 0
    }

    fn from_wait_status(status: WaitStatus) -> Option<ExitStatus> {
        match status {
            WaitStatus::Exited(_, code) => Some(ExitStatus((code & 0xff) as u8)),
            WaitStatus::Signaled(_, signal, _) => Some(ExitStatus((128 + signal as i32) as u8)),
            // Stop/continue/trace states are not terminations.
            _ => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit status {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn drain_to_string(reader: &mut PipeReader) -> String {
        let mut bytes = Vec::new();
        while let Some(byte) = reader.read_byte().unwrap() {
            bytes.push(byte);
        }
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn cat_echoes_bytes_in_order_then_ends_the_stream() {
        let mut child = spawn("cat").unwrap();
        let mut stdin = child.stdin.take().unwrap();
        let mut stdout = child.stdout.take().unwrap();

        stdin.write_byte(b'a').unwrap();
        stdin.write_byte(b'b').unwrap();
        drop(stdin);

        assert_eq!(stdout.read_byte().unwrap(), Some(b'a'));
        assert_eq!(stdout.read_byte().unwrap(), Some(b'b'));
        assert_eq!(stdout.read_byte().unwrap(), None);
        assert_eq!(child.wait().unwrap().code(), 0);
    }

    #[test]
    fn exit_code_comes_back_verbatim() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "exit42.sh", "#!/bin/sh\nexit 42\n");

        let child = spawn(script.to_str().unwrap()).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.code(), 42);
        assert!(!status.success());
    }

    #[test]
    fn quiet_success_reports_zero() {
        let child = spawn("true").unwrap();
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn missing_command_terminates_with_exec_failure_status() {
        let mut child = spawn("/no/such/binary/anywhere").unwrap();
        let mut stdout = child.stdout.take().unwrap();

        // No fallback logic runs in the child: its stdout ends immediately.
        assert_eq!(stdout.read_byte().unwrap(), None);
        assert_eq!(child.wait().unwrap().code(), EXEC_FAILURE_CODE);
    }

    #[test]
    fn stderr_output_and_exit_code_are_independent() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "noisy.sh", "#!/bin/sh\necho boom >&2\nexit 2\n");

        let mut child = spawn(script.to_str().unwrap()).unwrap();
        let mut stderr = child.stderr.take().unwrap();

        // Reap without draining stderr at all.
        assert_eq!(child.wait().unwrap().code(), 2);
        // The taken endpoint still drains after the reap.
        assert_eq!(drain_to_string(&mut stderr), "boom\n");
    }

    #[test]
    fn reads_after_child_exit_end_the_stream_instead_of_blocking() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "quiet.sh", "#!/bin/sh\nexit 0\n");

        let mut child = spawn(script.to_str().unwrap()).unwrap();
        let mut stdout = child.stdout.take().unwrap();
        assert_eq!(child.wait().unwrap().code(), 0);

        assert_eq!(stdout.read_byte().unwrap(), None);
    }

    #[test]
    fn signal_death_normalizes_to_128_plus_signal_number() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "selfkill.sh", "#!/bin/sh\nkill -9 $$\n");

        let child = spawn(script.to_str().unwrap()).unwrap();
        assert_eq!(child.wait().unwrap().code(), 137);
    }

    #[test]
    #[serial]
    fn child_inherits_the_spawner_environment() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "probe.sh",
            "#!/bin/sh\nprintf '%s' \"$CULVERT_TEST_MARKER\"\n",
        );

        // SAFETY: the test is serialized; no other thread is reading the
        // environment concurrently.
        unsafe { env::set_var("CULVERT_TEST_MARKER", "plumbing") };

        let mut child = spawn(script.to_str().unwrap()).unwrap();
        let mut stdout = child.stdout.take().unwrap();
        assert_eq!(drain_to_string(&mut stdout), "plumbing");
        assert!(child.wait().unwrap().success());

        // SAFETY: as above.
        unsafe { env::remove_var("CULVERT_TEST_MARKER") };
    }

    #[test]
    fn concurrent_spawns_from_multiple_threads_all_exec() {
        let workers: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| spawn("true").unwrap().wait().unwrap()))
            .collect();
        for worker in workers {
            assert!(worker.join().unwrap().success());
        }
    }

    #[test]
    fn command_with_interior_nul_is_a_spawn_error() {
        let err = spawn("bad\0name").unwrap_err();
        assert!(matches!(err, CulvertError::Spawn { .. }));
    }

    #[test]
    fn pid_is_exposed_and_positive() {
        let child = spawn("true").unwrap();
        assert!(child.pid() > 0);
        child.wait().unwrap();
    }

    #[test]
    fn normalization_keeps_the_low_eight_bits_of_an_exit() {
        let status = ExitStatus::from_wait_status(WaitStatus::Exited(Pid::from_raw(1), 3));
        assert_eq!(status.map(ExitStatus::code), Some(3));
    }

    #[test]
    fn normalization_maps_signals_past_128() {
        let status = ExitStatus::from_wait_status(WaitStatus::Signaled(
            Pid::from_raw(1),
            Signal::SIGKILL,
            false,
        ));
        assert_eq!(status.map(ExitStatus::code), Some(137));
    }

    #[test]
    fn stop_states_are_not_terminations() {
        let status =
            ExitStatus::from_wait_status(WaitStatus::Stopped(Pid::from_raw(1), Signal::SIGSTOP));
        assert!(status.is_none());
    }

    #[test]
    fn display_shows_the_normalized_code() {
        let status = ExitStatus::from_wait_status(WaitStatus::Exited(Pid::from_raw(1), 7));
        assert_eq!(status.unwrap().to_string(), "exit status 7");
    }
}
