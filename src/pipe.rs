//! Pipe allocation and byte-granular pipe I/O.
//!
//! Pipes are allocated with `O_CLOEXEC` so descriptors never leak into an
//! exec'd child; the launcher's `dup2` onto 0/1/2 clears the flag on exactly
//! the duplicates a child is meant to keep. Each endpoint owns its
//! descriptor and closes it on drop, which is what signals end-of-stream to
//! the peer.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::error::{CulvertError, Result};

/// A connected pipe pair, both ends close-on-exec.
///
/// Crate-internal building block: the launcher allocates three of these and
/// splits them across the fork.
pub(crate) struct Pipe {
    pub(crate) read: OwnedFd,
    pub(crate) write: OwnedFd,
}

impl Pipe {
    pub(crate) fn new() -> nix::Result<Pipe> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(Pipe { read, write })
    }
}

/// Create a connected pipe: bytes written to the [`PipeWriter`] come out of
/// the [`PipeReader`] in order.
///
/// Both descriptors are close-on-exec, like the ones [`spawn`](crate::spawn)
/// allocates. Dropping the writer ends the reader's stream.
pub fn pipe() -> Result<(PipeReader, PipeWriter)> {
    let pipe = Pipe::new().map_err(|errno| CulvertError::Pipe {
        source: errno.into(),
    })?;
    Ok((PipeReader { fd: pipe.read }, PipeWriter { fd: pipe.write }))
}

/// Owned read end of a pipe.
///
/// Dropping the reader closes the descriptor; a peer still writing will then
/// see a broken pipe.
#[derive(Debug)]
pub struct PipeReader {
    fd: OwnedFd,
}

impl PipeReader {
    pub(crate) fn new(fd: OwnedFd) -> Self {
        PipeReader { fd }
    }

    /// Read one byte, blocking until data arrives or the stream ends.
    ///
    /// Returns `Ok(None)` at end-of-stream: every write end of the pipe has
    /// been closed and all buffered bytes have been drained. Callers loop on
    /// this to consume a stream. Interrupted reads are retried.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = 0u8;
        loop {
            // SAFETY: the descriptor is owned by self and open; the buffer
            // is one valid writable byte.
            let n = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    &mut byte as *mut u8 as *mut libc::c_void,
                    1,
                )
            };
            match n {
                0 => return Ok(None),
                1 => return Ok(Some(byte)),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(CulvertError::Read { source: err });
                    }
                }
            }
        }
    }
}

/// Owned write end of a pipe.
///
/// Dropping the writer closes the descriptor, which the reading peer sees as
/// end-of-stream once it drains the buffer. There is no separate close
/// operation; drop is close.
#[derive(Debug)]
pub struct PipeWriter {
    fd: OwnedFd,
}

impl PipeWriter {
    pub(crate) fn new(fd: OwnedFd) -> Self {
        PipeWriter { fd }
    }

    /// Write one byte, blocking if the pipe buffer is full.
    ///
    /// No buffering or coalescing happens on this side; the byte is handed
    /// to the kernel before the call returns. A failure (for example a
    /// broken pipe after the reader closed) is reported on the call that
    /// encountered it and is never retried, except for interrupted writes.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        loop {
            // SAFETY: the descriptor is owned by self and open; the buffer
            // is one valid readable byte.
            let n = unsafe {
                libc::write(
                    self.fd.as_raw_fd(),
                    &byte as *const u8 as *const libc::c_void,
                    1,
                )
            };
            match n {
                1 => return Ok(()),
                0 => {
                    return Err(CulvertError::Write {
                        source: io::Error::new(io::ErrorKind::WriteZero, "wrote zero bytes"),
                    });
                }
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(CulvertError::Write { source: err });
                    }
                }
            }
        }
    }
}

impl AsRawFd for PipeReader {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsRawFd for PipeWriter {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for PipeReader {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsFd for PipeWriter {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl From<PipeReader> for OwnedFd {
    fn from(reader: PipeReader) -> OwnedFd {
        reader.fd
    }
}

impl From<PipeWriter> for OwnedFd {
    fn from(writer: PipeWriter) -> OwnedFd {
        writer.fd
    }
}
