//! Terminator-preserving line reader.
//!
//! A $batch payload has to be reassemblable byte for byte, so every line
//! keeps the exact terminator it was read with (`\r`, `\n`, `\r\n`, or none
//! at end of stream). The reader is buffered but its output never depends on
//! the buffer capacity: a `\r` sitting at the end of one fill is matched
//! against the first byte of the next fill before the terminator is decided.

use crate::error::BatchError;
use std::io::Read;

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// The exact byte sequence that ended a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Cr,
    Lf,
    CrLf,
    /// Unterminated final line at end of stream.
    None,
}

impl Terminator {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Terminator::Cr => b"\r",
            Terminator::Lf => b"\n",
            Terminator::CrLf => b"\r\n",
            Terminator::None => b"",
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Terminator::None)
    }
}

/// One line of the payload: content bytes plus the terminator that followed
/// them. Content never contains terminator bytes; `raw()` reproduces the
/// original wire bytes exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    content: Vec<u8>,
    terminator: Terminator,
}

impl Line {
    pub fn new(content: Vec<u8>, terminator: Terminator) -> Self {
        Self {
            content,
            terminator,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Content as UTF-8, for header and request-line contexts. Body bytes
    /// are never forced through this.
    pub fn content_str(&self) -> Result<&str, BatchError> {
        std::str::from_utf8(&self.content).map_err(|_| {
            BatchError::invalid_mime_header(format!(
                "line is not valid UTF-8: {}",
                String::from_utf8_lossy(&self.content)
            ))
        })
    }

    /// The original wire bytes: content followed by the terminator.
    pub fn raw(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.content.len() + self.terminator.len());
        bytes.extend_from_slice(&self.content);
        bytes.extend_from_slice(self.terminator.as_bytes());
        bytes
    }

    /// Length of `raw()` without materializing it.
    pub fn raw_len(&self) -> usize {
        self.content.len() + self.terminator.len()
    }

    /// Rebuilds a line from a raw byte prefix, re-deriving the terminator
    /// from the trailing bytes. Used when a declared Content-Length cuts a
    /// line short.
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        if bytes.ends_with(b"\r\n") {
            let mut content = bytes;
            content.truncate(content.len() - 2);
            Line::new(content, Terminator::CrLf)
        } else if bytes.ends_with(b"\n") {
            let mut content = bytes;
            content.pop();
            Line::new(content, Terminator::Lf)
        } else if bytes.ends_with(b"\r") {
            let mut content = bytes;
            content.pop();
            Line::new(content, Terminator::Cr)
        } else {
            Line::new(bytes, Terminator::None)
        }
    }

    /// Copy of this line with the terminator dropped.
    pub fn without_terminator(&self) -> Line {
        Line::new(self.content.clone(), Terminator::None)
    }
}

/// Forward-only reader producing [`Line`] values until the stream is drained.
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    filled: usize,
    eof: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    /// Reader with an explicit buffer capacity. Output is identical for any
    /// capacity >= 1; small capacities only cost extra read calls.
    pub fn with_buffer_size(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0; buffer_size.max(1)],
            pos: 0,
            filled: 0,
            eof: false,
        }
    }

    fn fill(&mut self) -> Result<(), BatchError> {
        if self.pos < self.filled || self.eof {
            return Ok(());
        }
        loop {
            match self.inner.read(&mut self.buffer) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BatchError::Io(e)),
            }
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, BatchError> {
        self.fill()?;
        if self.pos < self.filled {
            Ok(Some(self.buffer[self.pos]))
        } else {
            Ok(None)
        }
    }

    fn consume_byte(&mut self) {
        self.pos += 1;
    }

    /// Reads the next line, or `None` once the stream is exhausted. A wholly
    /// empty stream yields no lines at all.
    pub fn next_line(&mut self) -> Result<Option<Line>, BatchError> {
        if self.peek_byte()?.is_none() {
            return Ok(None);
        }

        let mut content = Vec::new();
        loop {
            match self.peek_byte()? {
                None => {
                    // Unterminated final line.
                    return Ok(Some(Line::new(content, Terminator::None)));
                }
                Some(b'\n') => {
                    self.consume_byte();
                    return Ok(Some(Line::new(content, Terminator::Lf)));
                }
                Some(b'\r') => {
                    self.consume_byte();
                    // The \n may live in the next buffer fill.
                    if self.peek_byte()? == Some(b'\n') {
                        self.consume_byte();
                        return Ok(Some(Line::new(content, Terminator::CrLf)));
                    }
                    return Ok(Some(Line::new(content, Terminator::Cr)));
                }
                Some(byte) => {
                    self.consume_byte();
                    content.push(byte);
                }
            }
        }
    }

    /// Drains the stream to exhaustion.
    pub fn to_lines(mut self) -> Result<Vec<Line>, BatchError> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line()? {
            lines.push(line);
        }
        Ok(lines)
    }
}
