//! A count-aware RTL byte source.
//!
//! `ValueReader` wraps any `std::io::Read`, tracks how many bytes it has
//! consumed, latches EOF on the first underflow, and knows how to read full
//! headers (resolving multi-header counts), bounded multi-lengths, and how to
//! skip one whole encoded value without recursing.

use std::io::Read;

use crate::error::{Result, RtlError};
use crate::header::{self, HeaderForm, Tag};
use crate::numeric;

/// Default bound for multi-header counts when the source does not declare a
/// length: 100 MiB.
pub const MAX_VALUE_BYTES: usize = 100 * 1024 * 1024;

/// A counted reader over an underlying byte source.
///
/// The reader borrows no ownership semantics from the source beyond `Read`;
/// the caller owns and releases it. One `ValueReader` may decode several
/// consecutive values from the same stream.
pub struct ValueReader<R> {
    inner: R,
    eof: bool,
    read_count: usize,
    limit: usize,
}

struct SkipLevel {
    nested: bool,
    inline: bool,
    size: usize,
    index: usize,
}

impl<'a> ValueReader<&'a [u8]> {
    /// A reader over an in-memory buffer, bounded by the buffer's length.
    pub fn from_slice(buf: &'a [u8]) -> Self {
        ValueReader::with_limit(buf, buf.len())
    }
}

impl<R: Read> ValueReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_VALUE_BYTES)
    }

    /// A reader with a declared total size used to validate multi-lengths.
    pub fn with_limit(inner: R, limit: usize) -> Self {
        Self {
            inner,
            eof: false,
            read_count: 0,
            limit,
        }
    }

    /// Total bytes consumed so far.
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    /// False once EOF has latched.
    pub fn has_more(&self) -> bool {
        !self.eof
    }

    fn left(&self) -> usize {
        self.limit.saturating_sub(self.read_count)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.eof {
            return Err(RtlError::Eof);
        }
        let mut done = 0;
        while done < buf.len() {
            match self.inner.read(&mut buf[done..]) {
                Ok(0) => {
                    self.eof = true;
                    self.read_count += done;
                    return Err(RtlError::Eof);
                }
                Ok(n) => done += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    self.read_count += done;
                    return Err(RtlError::Eof);
                }
                Err(e) => {
                    self.read_count += done;
                    return Err(RtlError::Io(e));
                }
            }
        }
        self.read_count += done;
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    /// Reads and parses exactly one header byte.
    pub fn read_header(&mut self) -> Result<(Tag, usize)> {
        let b = self.read_byte()?;
        header::parse(b)
    }

    /// Reads one header and, for multi-header tags, the following big-endian
    /// count, returning the final length. Counts above `i32::MAX` fail.
    pub fn read_full_header(&mut self) -> Result<(Tag, usize)> {
        let (tag, length) = self.read_header()?;
        if tag.form() != HeaderForm::Multi {
            return Ok((tag, length));
        }
        let l = self.read_multi_length(length)?;
        if l > i32::MAX as u64 {
            return Err(RtlError::LengthOverflow(format!(
                "multi-header count {l} exceeds i32::MAX"
            )));
        }
        Ok((tag, l as usize))
    }

    /// Reads exactly `length` bytes into a fresh buffer.
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        if length == 0 {
            return Err(RtlError::InvalidValue("zero-length payload read"));
        }
        let mut buf = vec![0u8; length];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Reads a `length_of_length`-byte big-endian count and validates it
    /// against the reader's remaining declared size.
    pub fn read_multi_length(&mut self, length_of_length: usize) -> Result<u64> {
        let v = if length_of_length == 1 {
            u64::from(self.read_byte()?)
        } else {
            let buf = self.read_bytes(length_of_length)?;
            numeric::bytes_to_u64(&buf)
        };
        let left = self.left();
        if left == 0 || v > left as u64 {
            return Err(RtlError::LengthOverflow(format!(
                "{length_of_length}-byte multi-length {v} is larger than remaining {left}"
            )));
        }
        Ok(v)
    }

    /// Resolves a multi-header count and reads that many payload bytes.
    pub fn read_multi_length_bytes(&mut self, length_of_length: usize) -> Result<Vec<u8>> {
        let l = self.read_multi_length(length_of_length)?;
        self.read_bytes(l as usize)
    }

    fn skip_raw(&mut self, mut length: usize) -> Result<()> {
        let mut buf = [0u8; 512];
        while length > 0 {
            let n = length.min(buf.len());
            self.fill(&mut buf[..n])?;
            length -= n;
        }
        Ok(())
    }

    fn skip_push(&mut self, stack: &mut Vec<SkipLevel>) -> Result<()> {
        let (tag, length) = self.read_header()?;
        let size = if tag.form() == HeaderForm::Multi {
            self.read_multi_length(length)? as usize
        } else {
            length
        };
        stack.push(SkipLevel {
            nested: tag.nested(),
            inline: tag.form() == HeaderForm::Inline,
            size,
            index: 0,
        });
        Ok(())
    }

    /// Skips one whole encoded value (header, counts, payload, and nested
    /// children), returning the number of bytes consumed. Iterative: the
    /// descent stack lives on the heap.
    pub fn skip(&mut self) -> Result<usize> {
        if !self.has_more() {
            return Err(RtlError::Eof);
        }
        let start = self.read_count;
        let mut stack: Vec<SkipLevel> = Vec::new();
        self.skip_push(&mut stack)?;
        while let Some(top) = stack.last() {
            let (nested, exhausted, inline, size) =
                (top.nested, top.index >= top.size, top.inline, top.size);
            if nested {
                if exhausted {
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.index += 1;
                }
                self.skip_push(&mut stack)?;
            } else {
                if !inline {
                    self.skip_raw(size)?;
                }
                stack.pop();
            }
        }
        Ok(self.read_count - start)
    }
}

impl<R: Read> Read for ValueReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        self.read_count += n;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_latches_eof() {
        let mut r = ValueReader::from_slice(&[0x01, 0x02]);
        assert!(r.has_more());
        assert_eq!(r.read_byte().unwrap(), 0x01);
        assert_eq!(r.read_byte().unwrap(), 0x02);
        assert_eq!(r.read_count(), 2);
        assert!(matches!(r.read_byte(), Err(RtlError::Eof)));
        assert!(!r.has_more());
        // Sticky: further reads keep failing without touching the source.
        assert!(matches!(r.read_byte(), Err(RtlError::Eof)));
    }

    #[test]
    fn full_header_resolves_counts() {
        // ArrayMulti with a one-byte count of 17.
        let mut r = ValueReader::from_slice(&[0x89, 0x11, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(r.read_full_header().unwrap(), (Tag::ArrayMulti, 17));
        // StringSingle keeps its inline length.
        let mut r = ValueReader::from_slice(&[0xC3, b'd', b'o', b'g']);
        assert_eq!(r.read_full_header().unwrap(), (Tag::StringSingle, 3));
    }

    #[test]
    fn multi_length_bounded_by_declared_size() {
        // Count 200 but only a few bytes remain in the slice.
        let mut r = ValueReader::from_slice(&[0xE1, 0xC8, 0x00]);
        let (tag, length) = r.read_header().unwrap();
        assert_eq!(tag, Tag::StringMulti);
        assert!(matches!(
            r.read_multi_length(length),
            Err(RtlError::LengthOverflow(_))
        ));
    }

    #[test]
    fn skip_counts_whole_values() {
        // Inline byte.
        let mut r = ValueReader::from_slice(&[0x05, 0xFF]);
        assert_eq!(r.skip().unwrap(), 1);
        // String with payload.
        let mut r = ValueReader::from_slice(&[0xC3, b'd', b'o', b'g', 0x00]);
        assert_eq!(r.skip().unwrap(), 4);
        // Numeric with payload.
        let mut r = ValueReader::from_slice(&[0xA3, 0x02, 0x2E, 0xC9]);
        assert_eq!(r.skip().unwrap(), 4);
    }

    #[test]
    fn skip_descends_into_arrays() {
        // [[0x01], 0x02] — inner array must pop, then 0x02 is still skipped.
        let bytes = [0x92, 0x91, 0x01, 0x02];
        let mut r = ValueReader::from_slice(&bytes);
        assert_eq!(r.skip().unwrap(), bytes.len());
        assert!(matches!(r.read_byte(), Err(RtlError::Eof)));

        // Array of 17 elements via multi header.
        let mut bytes = vec![0x89, 0x11];
        bytes.extend(std::iter::repeat(0x07).take(17));
        let mut r = ValueReader::from_slice(&bytes);
        assert_eq!(r.skip().unwrap(), bytes.len());
    }

    #[test]
    fn skip_consumes_version_bytes() {
        let mut r = ValueReader::from_slice(&[0xE9, 0x10, 0x55]);
        assert_eq!(r.skip().unwrap(), 2);
        assert_eq!(r.read_byte().unwrap(), 0x55);
    }

    #[test]
    fn read_impl_tracks_count() {
        let data = b"abcdef";
        let mut r = ValueReader::from_slice(data);
        let mut out = [0u8; 4];
        std::io::Read::read_exact(&mut r, &mut out).unwrap();
        assert_eq!(&out, b"abcd");
        assert_eq!(r.read_count(), 4);
    }
}
