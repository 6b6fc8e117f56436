// Cursor over a whole file held in memory. Text headers are read token by
// token; binary payloads embedded between them are taken as raw byte runs.

use std::str::FromStr;

use crate::error::{MeshError, MeshResult};
use crate::writer::binary_block::{ByteOrder, Pack};

pub struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    /// Pre-allocation for `count` records read from the file. Every record
    /// takes at least one byte, so the rest of the input bounds it.
    pub fn capacity_for(&self, count: usize) -> usize {
        count.min(self.remaining())
    }

    fn text(&self, start: usize, end: usize) -> MeshResult<&'a str> {
        std::str::from_utf8(&self.bytes[start..end]).map_err(|_| {
            MeshError::format(format!("Invalid text at byte offset {}", start))
        })
    }

    /// Next whitespace-delimited token, `None` at end of input
    pub fn next_token(&mut self) -> MeshResult<Option<&'a str>> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        self.text(start, self.pos).map(Some)
    }

    pub fn expect_token(&mut self, context: &str) -> MeshResult<&'a str> {
        self.next_token()?
            .ok_or_else(|| MeshError::format(format!("Unexpected end of file while reading {}", context)))
    }

    /// Parses the next token as `T`
    pub fn parse<T>(&mut self, context: &str) -> MeshResult<T>
    where
        T: FromStr,
        MeshError: From<T::Err>,
    {
        Ok(self.expect_token(context)?.parse::<T>()?)
    }

    /// Rest of the current line without its terminator (`\r\n` or `\n`)
    pub fn next_line(&mut self) -> MeshResult<Option<&'a str>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        let mut end = self.pos;
        if self.pos < self.bytes.len() {
            self.pos += 1; // newline
        }
        if end > start && self.bytes[end - 1] == b'\r' {
            end -= 1;
        }
        self.text(start, end).map(Some)
    }

    /// Next line that is not blank, trimmed
    pub fn next_non_empty_line(&mut self) -> MeshResult<Option<&'a str>> {
        while let Some(line) = self.next_line()? {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed));
            }
        }
        Ok(None)
    }

    /// Skips what is left of the current line, including its newline. Binary
    /// payloads start right after the newline that ends their header line.
    pub fn finish_line(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        if self.pos < self.bytes.len() {
            self.pos += 1;
        }
    }

    /// Moves past the next occurrence of `marker`, looking at raw bytes so
    /// binary payloads in between are not decoded. False if it never occurs.
    pub fn skip_past(&mut self, marker: &[u8]) -> bool {
        if marker.is_empty() {
            return true;
        }
        match self.bytes[self.pos.min(self.bytes.len())..]
            .windows(marker.len())
            .position(|window| window == marker)
        {
            Some(offset) => {
                self.pos += offset + marker.len();
                true
            }
            None => {
                self.pos = self.bytes.len();
                false
            }
        }
    }

    pub fn take(&mut self, len: usize, context: &str) -> MeshResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(MeshError::format(format!(
                "Truncated binary data while reading {}",
                context
            ))),
        }
    }

    /// Reads `count` packed values of `T`
    pub fn take_values<T: Pack>(&mut self, count: usize, order: ByteOrder, context: &str) -> MeshResult<Vec<T>> {
        let len = checked_product(count, T::WIDTH, context)?;
        let bytes = self.take(len, context)?;
        Ok(bytes
            .chunks_exact(T::WIDTH)
            .map(|chunk| T::unpack_from(chunk, order))
            .collect())
    }
}

/// `a * b` for sizes read from a file; overflow means the header is corrupt
pub fn checked_product(a: usize, b: usize, context: &str) -> MeshResult<usize> {
    a.checked_mul(b)
        .ok_or_else(|| MeshError::format(format!("Size overflow while reading {}", context)))
}
