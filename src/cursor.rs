//! Sequential byte sources.
//!
//! The parser never does its own I/O: it pulls bytes through [`ByteCursor`], which only ever
//! moves forward. Two cursors are provided, one over an in-memory slice and one over any
//! buffered reader.

use std::io::{self, BufRead, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// A forward-only reader of little-endian data.
pub trait ByteCursor {
    /// Read exactly `count` bytes, failing with `TruncatedInput` if the source ends first.
    fn read_bytes(&mut self, count: usize, step: &'static str) -> Result<Vec<u8>>;

    fn read_u16(&mut self, step: &'static str) -> Result<u16>;

    fn read_u32(&mut self, step: &'static str) -> Result<u32>;

    /// True once no further bytes can be read.
    fn is_at_end(&mut self) -> Result<bool>;

    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    /// Bytes left in the source, when the source knows.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Cursor over a byte slice.
#[derive(Clone, Debug)]
pub struct SliceCursor<'a> {
    data: &'a [u8],
    consumed: usize,
}

impl<'a> SliceCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, consumed: 0 }
    }

    /// Borrow the next `count` bytes without copying them.
    pub fn read_slice(&mut self, count: usize, step: &'static str) -> Result<&'a [u8]> {
        if self.data.len() < count {
            return Err(Error::truncated(step, self.data.len(), count));
        }
        let (head, tail) = self.data.split_at(count);
        self.data = tail;
        self.consumed += count;
        Ok(head)
    }

    pub fn rest(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> ByteCursor for SliceCursor<'a> {
    fn read_bytes(&mut self, count: usize, step: &'static str) -> Result<Vec<u8>> {
        self.read_slice(count, step).map(|s| s.to_vec())
    }

    fn read_u16(&mut self, step: &'static str) -> Result<u16> {
        let actual = self.data.len();
        let v = self
            .data
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated(step, actual, 2))?;
        self.consumed += 2;
        Ok(v)
    }

    fn read_u32(&mut self, step: &'static str) -> Result<u32> {
        let actual = self.data.len();
        let v = self
            .data
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated(step, actual, 4))?;
        self.consumed += 4;
        Ok(v)
    }

    fn is_at_end(&mut self) -> Result<bool> {
        Ok(self.data.is_empty())
    }

    fn position(&self) -> u64 {
        self.consumed as u64
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.data.len())
    }
}

/// Cursor over a buffered reader, such as a `BufReader<File>`.
#[derive(Debug)]
pub struct ReaderCursor<R> {
    inner: R,
    consumed: u64,
}

impl<R: BufRead> ReaderCursor<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, consumed: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn eof_to_truncated(err: io::Error, step: &'static str, expected: usize) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::truncated(step, 0, expected)
    } else {
        Error::Io(err)
    }
}

impl<R: BufRead> ByteCursor for ReaderCursor<R> {
    fn read_bytes(&mut self, count: usize, step: &'static str) -> Result<Vec<u8>> {
        // Bounded by `take` so a corrupt size can't trigger a huge allocation up front
        let mut buf = Vec::new();
        (&mut self.inner)
            .take(count as u64)
            .read_to_end(&mut buf)?;
        self.consumed += buf.len() as u64;
        if buf.len() < count {
            return Err(Error::truncated(step, buf.len(), count));
        }
        Ok(buf)
    }

    fn read_u16(&mut self, step: &'static str) -> Result<u16> {
        let v = self
            .inner
            .read_u16::<LittleEndian>()
            .map_err(|e| eof_to_truncated(e, step, 2))?;
        self.consumed += 2;
        Ok(v)
    }

    fn read_u32(&mut self, step: &'static str) -> Result<u32> {
        let v = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(|e| eof_to_truncated(e, step, 4))?;
        self.consumed += 4;
        Ok(v)
    }

    fn is_at_end(&mut self) -> Result<bool> {
        Ok(self.inner.fill_buf()?.is_empty())
    }

    fn position(&self) -> u64 {
        self.consumed
    }
}
