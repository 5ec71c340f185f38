//! Output demultiplexer.
//!
//! stdout carries exactly one JSON result and is buffered verbatim. stderr
//! carries newline-delimited progress events mixed with free-form log text;
//! it is split into lines as chunks arrive and each complete line is checked
//! for a progress event. Anything else on stderr is kept only as a bounded
//! diagnostic tail.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crew_models::ProgressEvent;

use crate::config::DEFAULT_STDERR_LIMIT;

/// Regex matching ANSI CSI escape sequences (colours, cursor movement).
static ANSI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-9;?]*[a-zA-Z]").expect("Invalid ANSI regex"));

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    ANSI_REGEX.replace_all(s, "").to_string()
}

/// Reassembles lines from arbitrarily split byte chunks.
///
/// A line longer than `max_line` bytes is discarded whole: its bytes are
/// dropped as they arrive and nothing is returned for it.
#[derive(Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
    max_line: usize,
    oversized: bool,
}

impl LineSplitter {
    /// Creates an empty splitter that holds at most `max_line` bytes.
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            oversized: false,
        }
    }

    /// Feeds a chunk and returns every line it completed, in order.
    ///
    /// The trailing fragment after the last `\n` is held until a later
    /// chunk completes it. Each byte is scanned once.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            self.append(&rest[..pos]);
            if let Some(line) = self.take_line() {
                lines.push(line);
            }
            rest = &rest[pos + 1..];
        }
        self.append(rest);
        lines
    }

    /// Returns the unterminated fragment left at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() && !self.oversized {
            return None;
        }
        self.take_line()
    }

    /// Bytes held waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn append(&mut self, bytes: &[u8]) {
        if self.oversized {
            return;
        }
        if self.pending.len() + bytes.len() > self.max_line {
            trace!(
                held = self.pending.len(),
                limit = self.max_line,
                "discarding oversized stderr line"
            );
            self.pending = Vec::new();
            self.oversized = true;
            return;
        }
        self.pending.extend_from_slice(bytes);
    }

    fn take_line(&mut self) -> Option<String> {
        let mut line = std::mem::take(&mut self.pending);
        if std::mem::replace(&mut self.oversized, false) {
            return None;
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_STDERR_LIMIT)
    }
}

/// Raw output captured from a finished worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Entire stdout, lossily decoded.
    pub stdout: String,
    /// Tail of stderr, lossily decoded.
    pub stderr: String,
}

impl CapturedOutput {
    /// Creates captured output from strings.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Splits one worker's stdout and stderr streams.
#[derive(Debug)]
pub struct Demultiplexer {
    stdout: Vec<u8>,
    stderr_lines: LineSplitter,
    stderr_tail: Vec<u8>,
    stderr_limit: usize,
}

impl Demultiplexer {
    /// Creates a demultiplexer keeping at most `stderr_limit` bytes of stderr.
    ///
    /// The same limit bounds a single stderr line.
    pub fn new(stderr_limit: usize) -> Self {
        Self {
            stdout: Vec::new(),
            stderr_lines: LineSplitter::new(stderr_limit),
            stderr_tail: Vec::new(),
            stderr_limit,
        }
    }

    /// Buffers a stdout chunk.
    pub fn on_stdout(&mut self, chunk: &[u8]) {
        self.stdout.extend_from_slice(chunk);
    }

    /// Feeds a stderr chunk and returns the progress events it completed.
    pub fn on_stderr(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        self.keep_stderr(chunk);
        self.stderr_lines
            .push(chunk)
            .iter()
            .filter_map(|line| parse_line(line))
            .collect()
    }

    /// Flushes the final stderr fragment and returns the captured output.
    pub fn finish(&mut self) -> (Option<ProgressEvent>, CapturedOutput) {
        let last = self
            .stderr_lines
            .finish()
            .and_then(|line| parse_line(&line));
        let captured = CapturedOutput {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr_tail).into_owned(),
        };
        (last, captured)
    }

    fn keep_stderr(&mut self, chunk: &[u8]) {
        self.stderr_tail.extend_from_slice(chunk);
        if self.stderr_tail.len() > self.stderr_limit {
            let excess = self.stderr_tail.len() - self.stderr_limit;
            self.stderr_tail.drain(..excess);
        }
    }
}

fn parse_line(line: &str) -> Option<ProgressEvent> {
    let event = ProgressEvent::from_line(line);
    if event.is_none() && !line.trim().is_empty() {
        trace!(line = %line, "ignoring stderr line");
    }
    event
}
