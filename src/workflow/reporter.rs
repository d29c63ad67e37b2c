// src/workflow/reporter.rs

//! User-facing output
//!
//! Pipeline steps write their messages through a [`Reporter`] rather than
//! straight to stdout, so a nested install shares its parent's output and
//! tests can read back exactly what a user would have seen.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Line-oriented, append-only output sink shared by cloned contexts
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Reporter {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// A reporter whose output is kept in memory
    pub fn capture() -> (Self, CapturedOutput) {
        let buffer = CapturedOutput::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    /// Write one informational line
    pub fn info(&self, line: impl Display) {
        self.write_line(format_args!("{}", line));
    }

    /// Write one error line
    pub fn error(&self, line: impl Display) {
        self.write_line(format_args!("Error: {}", line));
    }

    fn write_line(&self, args: std::fmt::Arguments<'_>) {
        // Output is best effort; a closed stdout must not abort an install
        match self.sink.lock() {
            Ok(mut sink) => {
                let written = sink
                    .write_fmt(args)
                    .and_then(|_| sink.write_all(b"\n"))
                    .and_then(|_| sink.flush());
                if let Err(e) = written {
                    debug!("Failed to write output line: {}", e);
                }
            }
            Err(_) => debug!("Output sink lock poisoned, line dropped"),
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

/// In-memory copy of everything written to a captured [`Reporter`]
#[derive(Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| io::Error::other("captured output lock poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
