//! Byte sources and sinks
//!
//! Containers are read and written as whole byte ranges: a reader session
//! needs the full container in memory, and the writer produces it in one
//! piece. These traits let the same calls work over files and buffers.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use jsonz_format::{JsonzError, Result};

/// Random-access readable bytes
pub trait ByteSource {
    /// Total length in bytes
    fn len(&self) -> Result<u64>;

    /// True when the source holds no bytes
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fill `buf` from `offset`; fails with `TruncatedInput` past the end
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Every byte of the source
    fn read_all(&self) -> Result<Bytes> {
        let len = usize::try_from(self.len()?).map_err(|_| {
            JsonzError::ResourceLimitExceeded("source does not fit in memory".to_string())
        })?;
        let mut buf = vec![0u8; len];
        self.read_at(0, &mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Random-access writable bytes
pub trait ByteSink {
    /// Current length in bytes
    fn len(&self) -> Result<u64>;

    /// True when the sink holds no bytes
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write `bytes` at `offset`, extending the sink if needed
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Drop everything past `len`
    fn truncate(&mut self, len: u64) -> Result<()>;

    /// Push buffered bytes to the underlying storage
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn slice_range(len: usize, offset: u64, want: usize) -> Result<std::ops::Range<usize>> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    match start.checked_add(want) {
        Some(end) if end <= len => Ok(start..end),
        _ => Err(JsonzError::truncated(
            start.min(len),
            want,
            len.saturating_sub(start),
        )),
    }
}

impl ByteSource for [u8] {
    fn len(&self) -> Result<u64> {
        Ok(<[u8]>::len(self) as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = slice_range(<[u8]>::len(self), offset, buf.len())?;
        buf.copy_from_slice(&self[range]);
        Ok(())
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> Result<u64> {
        ByteSource::len(self.as_slice())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.as_slice().read_at(offset, buf)
    }
}

impl ByteSource for Bytes {
    fn len(&self) -> Result<u64> {
        Ok(Bytes::len(self) as u64)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.as_ref().read_at(offset, buf)
    }

    fn read_all(&self) -> Result<Bytes> {
        Ok(self.clone())
    }
}

impl ByteSource for File {
    fn len(&self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let len = ByteSource::len(self)?;
        if offset.saturating_add(buf.len() as u64) > len {
            return Err(JsonzError::TruncatedInput {
                offset,
                needed: buf.len() as u64,
                available: len.saturating_sub(offset),
            });
        }
        let mut file = self;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn len(&self) -> Result<u64> {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn read_all(&self) -> Result<Bytes> {
        (**self).read_all()
    }
}

impl ByteSink for Vec<u8> {
    fn len(&self) -> Result<u64> {
        Ok(Vec::len(self) as u64)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let start = usize::try_from(offset).map_err(|_| {
            JsonzError::ResourceLimitExceeded(format!("offset {} does not fit in memory", offset))
        })?;
        let end = start + bytes.len();
        if end > Vec::len(self) {
            self.resize(end, 0);
        }
        self[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        Vec::truncate(self, usize::try_from(len).unwrap_or(usize::MAX));
        Ok(())
    }
}

impl ByteSink for File {
    fn len(&self) -> Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(bytes)?;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.set_len(len)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Write::flush(self)?;
        self.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_reads_and_bounds() {
        let data = vec![1u8, 2, 3, 4, 5];
        let mut buf = [0u8; 2];
        data.read_at(3, &mut buf).unwrap();
        assert_eq!(buf, [4, 5]);
        match data.read_at(4, &mut buf) {
            Err(JsonzError::TruncatedInput {
                needed, available, ..
            }) => {
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected TruncatedInput, got {:?}", other),
        }
        assert!(data.read_at(u64::MAX, &mut buf).is_err());
    }

    #[test]
    fn test_bytes_read_all_shares_buffer() {
        let data = Bytes::from_static(b"container");
        let all = data.read_all().unwrap();
        assert_eq!(all.as_ptr(), data.as_ptr());
        assert_eq!(ByteSource::len(&data).unwrap(), 9);
    }

    #[test]
    fn test_vec_sink_overwrites_and_extends() {
        let mut sink = vec![9u8; 4];
        sink.write_at(2, &[1, 2, 3]).unwrap();
        assert_eq!(sink, vec![9, 9, 1, 2, 3]);
        ByteSink::truncate(&mut sink, 3).unwrap();
        assert_eq!(sink, vec![9, 9, 1]);
    }

    #[test]
    fn test_file_source_and_sink() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_at(0, b"hello world").unwrap();
        file.write_at(6, b"WORLD").unwrap();
        ByteSink::flush(&mut file).unwrap();

        let mut buf = [0u8; 5];
        ByteSource::read_at(&file, 6, &mut buf).unwrap();
        assert_eq!(&buf, b"WORLD");
        assert_eq!(&ByteSource::read_all(&file).unwrap()[..], b"hello WORLD");

        ByteSink::truncate(&mut file, 5).unwrap();
        assert_eq!(ByteSource::len(&file).unwrap(), 5);
        assert!(matches!(
            ByteSource::read_at(&file, 3, &mut buf),
            Err(JsonzError::TruncatedInput { .. })
        ));
    }
}
