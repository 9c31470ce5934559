//! Byte arena: positioned reads and writes against the backing index storage.
//!
//! Every access is absolute (seek, then read or write). Integers are 4-byte
//! big-endian and must fit an `i32`; negative values on disk are reported as
//! corruption rather than being reinterpreted.

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, TisError};

/// Backing storage of an index: a file on disk or an in-memory buffer.
pub struct Arena<S> {
    path: PathBuf,
    inner: S,
}

impl<S: Read + Write + Seek> Arena<S> {
    /// Wrap `inner`; `path` is only used to label errors.
    pub fn new(path: impl Into<PathBuf>, inner: S) -> Self {
        Self {
            path: path.into(),
            inner,
        }
    }

    /// Path used in error messages.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total length of the storage in bytes.
    pub fn len(&mut self) -> Result<u64> {
        self.inner
            .seek(SeekFrom::End(0))
            .map_err(|e| TisError::io(&self.path, e))
    }

    /// Read a big-endian `i32` at `offset`, rejecting negative values.
    pub fn read_u32_at(&mut self, offset: u32) -> Result<u32> {
        self.seek(offset)?;
        let value = self
            .inner
            .read_i32::<BigEndian>()
            .map_err(|e| self.read_error(offset, e))?;
        u32::try_from(value)
            .map_err(|_| TisError::format(offset, format!("negative value {value}")))
    }

    /// Write `value` as a big-endian `i32` at `offset`.
    pub fn write_u32_at(&mut self, offset: u32, value: u32) -> Result<()> {
        let value = i32::try_from(value).map_err(|_| TisError::Overflow)?;
        self.seek(offset)?;
        self.inner
            .write_i32::<BigEndian>(value)
            .map_err(|e| TisError::io(&self.path, e))
    }

    /// Read exactly `len` bytes starting at `offset`.
    pub fn read_bytes_at(&mut self, offset: u32, len: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        if len == 0 {
            return Ok(buf);
        }
        self.seek(offset)?;
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.read_error(offset, e))?;
        Ok(buf)
    }

    /// Write all of `bytes` starting at `offset`, extending the storage if needed.
    pub fn write_bytes_at(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.seek(offset)?;
        self.inner
            .write_all(bytes)
            .map_err(|e| TisError::io(&self.path, e))
    }

    /// Flush buffered writes to the backing storage.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(|e| TisError::io(&self.path, e))
    }

    /// Give back the backing storage.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn seek(&mut self, offset: u32) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(u64::from(offset)))
            .map(|_| ())
            .map_err(|e| TisError::io(&self.path, e))
    }

    /// A short read means a header field points past the end of the file.
    fn read_error(&self, offset: u32, e: std::io::Error) -> TisError {
        if e.kind() == ErrorKind::UnexpectedEof {
            TisError::format(offset, "unexpected end of file")
        } else {
            TisError::io(&self.path, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn arena(bytes: Vec<u8>) -> Arena<Cursor<Vec<u8>>> {
        Arena::new("<memory>", Cursor::new(bytes))
    }

    #[test]
    fn test_integers_are_big_endian() {
        let mut a = arena(Vec::new());
        a.write_u32_at(0, 0x24).unwrap();
        assert_eq!(a.into_inner().into_inner(), vec![0, 0, 0, 0x24]);
    }

    #[test]
    fn test_write_past_end_extends() {
        let mut a = arena(vec![1, 2]);
        a.write_bytes_at(4, b"xy").unwrap();
        assert_eq!(a.len().unwrap(), 6);
        assert_eq!(a.read_bytes_at(4, 2).unwrap(), b"xy");
    }

    #[test]
    fn test_negative_value_is_format_error() {
        let mut a = arena(vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            a.read_u32_at(0),
            Err(TisError::Format { offset: 0, .. })
        ));
    }

    #[test]
    fn test_short_read_is_format_error() {
        let mut a = arena(vec![0, 0]);
        assert!(matches!(a.read_u32_at(0), Err(TisError::Format { .. })));
        assert!(matches!(
            a.read_bytes_at(1, 8),
            Err(TisError::Format { offset: 1, .. })
        ));
    }

    #[test]
    fn test_write_rejects_values_above_i32() {
        let mut a = arena(Vec::new());
        assert!(matches!(
            a.write_u32_at(0, u32::MAX),
            Err(TisError::Overflow)
        ));
    }
}
