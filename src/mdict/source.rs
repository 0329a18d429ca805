//! Random-access byte sources backing a reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use super::error::{MdictError, Result};

/// A positional byte source.
///
/// Every read must return exactly `len` bytes; a short read is reported as
/// [`MdictError::Truncated`], never as a partial buffer. Reads are durable:
/// the same `(offset, len)` pair always yields the same bytes.
pub trait ByteSource {
    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
    fn len(&self) -> u64;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File-backed source.
///
/// The handle is kept behind a mutex so the seek + read pair stays atomic
/// with respect to other readers of the same source.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                MdictError::Truncated(format!("wanted {} bytes at offset {}", len, offset))
            } else {
                MdictError::Io(e)
            }
        })?;
        Ok(buf)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// In-memory source for dictionaries already loaded as a blob.
#[derive(Debug)]
pub struct MemSource {
    data: Vec<u8>,
}

impl MemSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for MemSource {
    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset).ok();
        let end = start.and_then(|s| s.checked_add(len));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.data.len() => {
                Ok(self.data[start..end].to_vec())
            }
            _ => Err(MdictError::Truncated(format!(
                "wanted {} bytes at offset {}, buffer holds {}",
                len,
                offset,
                self.data.len()
            ))),
        }
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
