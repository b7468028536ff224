//! Seekable byte streams over a part's buffered content.
//!
//! Every part that has been touched owns one [`SharedBuffer`]. Each call to
//! `Package::get_stream` hands out a fresh [`PartStream`] cursor over that same buffer,
//! so writes through one stream are visible through every other stream on the part.

use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Reference-counted byte buffer shared by all streams opened on one part.
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Wrap bytes in a new shared buffer.
pub fn shared_buffer(bytes: Vec<u8>) -> SharedBuffer {
    Arc::new(Mutex::new(bytes))
}

/// A `Read + Write + Seek` cursor over a part's shared buffer.
#[derive(Debug, Clone)]
pub struct PartStream {
    buffer: SharedBuffer,
    position: u64,
    writable: bool,
}

impl PartStream {
    pub(crate) fn new(buffer: SharedBuffer, writable: bool) -> Self {
        Self {
            buffer,
            position: 0,
            writable,
        }
    }

    /// Current length of the underlying buffer.
    pub fn len(&self) -> u64 {
        self.buffer.lock().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether writes are accepted.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Truncate (or zero-extend) the underlying buffer.
    pub fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.check_writable()?;
        let len = usize::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        self.buffer.lock().resize(len, 0);
        Ok(())
    }

    /// Copy of the whole buffer, independent of the stream position.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "part stream was opened read-only",
            ))
        }
    }
}

impl Read for PartStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.buffer.lock();
        let start = usize::try_from(self.position).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for PartStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_writable()?;
        let mut data = self.buffer.lock();
        let start = usize::try_from(self.position)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "write would overflow the stream position",
            )
        })?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for PartStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(n) => {
                self.position = n;
                return Ok(n);
            },
            SeekFrom::End(n) => (self.len(), n),
            SeekFrom::Current(n) => (self.position, n),
        };
        match base.checked_add_signed(offset) {
            Some(n) => {
                self.position = n;
                Ok(n)
            },
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_alias_one_buffer() {
        let buffer = shared_buffer(Vec::new());
        let mut writer = PartStream::new(buffer.clone(), true);
        let mut reader = PartStream::new(buffer, false);

        writer.write_all(b"hello").unwrap();

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_read_only_stream_rejects_writes() {
        let mut stream = PartStream::new(shared_buffer(b"abc".to_vec()), false);
        let err = stream.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(stream.set_len(0).is_err());
        assert_eq!(stream.to_vec(), b"abc");
    }

    #[test]
    fn test_seek_and_overwrite() {
        let mut stream = PartStream::new(shared_buffer(b"abcdef".to_vec()), true);
        stream.seek(SeekFrom::End(-2)).unwrap();
        stream.write_all(b"XYZ").unwrap();
        assert_eq!(stream.to_vec(), b"abcdXYZ");

        stream.seek(SeekFrom::Start(10)).unwrap();
        stream.write_all(b"!").unwrap();
        assert_eq!(stream.len(), 11);

        assert!(stream.seek(SeekFrom::Current(-100)).is_err());

        stream.set_len(2).unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn test_write_past_addressable_end_fails() {
        let mut stream = PartStream::new(shared_buffer(b"abc".to_vec()), true);
        stream.seek(SeekFrom::Start(u64::MAX)).unwrap();
        let err = stream.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(stream.to_vec(), b"abc");
    }
}
