//! Line-buffered prefix tee for child output streams.
//!
//! The runner drains stdout and stderr on one thread each and copies every
//! line to its own stdout behind an `out> ` or `err> ` prefix. Lines go out
//! as single writes so the two streams never interleave mid-line.

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use culvert::PipeReader;

/// Copy `reader` to `sink` line by line, prefixing each line.
///
/// Bytes are pulled one at a time until end-of-stream. Each completed line
/// is written whole as `prefix + line + newline`; a trailing unterminated
/// line is written without an added newline.
pub fn tee_lines<W: Write>(reader: &mut PipeReader, prefix: &str, sink: &mut W) -> io::Result<()> {
    let mut line: Vec<u8> = Vec::new();
    loop {
        match reader.read_byte().map_err(io::Error::other)? {
            Some(b'\n') => {
                flush_line(prefix, &line, true, sink)?;
                line.clear();
            }
            Some(byte) => line.push(byte),
            None => {
                if !line.is_empty() {
                    flush_line(prefix, &line, false, sink)?;
                }
                return Ok(());
            }
        }
    }
}

fn flush_line<W: Write>(
    prefix: &str,
    line: &[u8],
    terminated: bool,
    sink: &mut W,
) -> io::Result<()> {
    let mut out = Vec::with_capacity(prefix.len() + line.len() + 1);
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(line);
    if terminated {
        out.push(b'\n');
    }
    sink.write_all(&out)
}

/// Drain `reader` on its own thread, teeing to this process's stdout.
pub fn spawn_tee_thread(
    mut reader: PipeReader,
    prefix: &'static str,
) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || tee_lines(&mut reader, prefix, &mut io::stdout()))
}
