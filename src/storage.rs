// File access seam for the decode pipeline.
//
// Every decode opens its own read handle and drops it before the cache is
// written, so no file state outlives a call. Writes are whole-file and
// atomic: a reader sees either the old file or the complete new one.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("file not found")]
    NotFound,
    #[error("i/o error: {0}")]
    Io(&'static str),
    #[error("operation not supported")]
    Unsupported,
}

/// Open read handle with random access.
pub trait ImageFile {
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes; `Ok(0)` at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Absolute seek.
    fn seek(&mut self, pos: u64) -> Result<(), StorageError>;

    fn position(&self) -> u64;

    fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<(), StorageError> {
        while !buf.is_empty() {
            let n = self.read(buf)?;
            if n == 0 {
                return Err(StorageError::Io("unexpected end of file"));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }
}

pub trait Storage {
    /// Open `path` for reading. The handle may borrow the storage.
    fn open_read(&self, path: &str) -> Result<Box<dyn ImageFile + '_>, StorageError>;

    /// Replace `path` with the concatenation of `parts`.
    fn write_atomic(&mut self, path: &str, parts: &[&[u8]]) -> Result<(), StorageError>;
}

/// In-memory storage keyed by path.
#[derive(Debug, Default)]
pub struct MemStorage {
    files: BTreeMap<String, Vec<u8>>,
    read_only: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes fail with [`StorageError::Unsupported`].
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.files.insert(path.into(), data);
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }
}

struct MemFile<'a> {
    data: &'a [u8],
    pos: usize,
}

impl ImageFile for MemFile<'_> {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let rest = self.data.get(self.pos..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<(), StorageError> {
        // seeking past the end is allowed; reads then return 0
        self.pos = usize::try_from(pos).map_err(|_| StorageError::Io("seek out of range"))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }
}

impl Storage for MemStorage {
    fn open_read(&self, path: &str) -> Result<Box<dyn ImageFile + '_>, StorageError> {
        let data = self.files.get(path).ok_or(StorageError::NotFound)?;
        Ok(Box::new(MemFile { data, pos: 0 }))
    }

    fn write_atomic(&mut self, path: &str, parts: &[&[u8]]) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::Unsupported);
        }
        let total = parts.iter().map(|p| p.len()).sum();
        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| StorageError::Io("out of memory"))?;
        for part in parts {
            data.extend_from_slice(part);
        }
        self.files.insert(path.into(), data);
        Ok(())
    }
}

#[cfg(feature = "std")]
pub use dir::DirStorage;

#[cfg(feature = "std")]
mod dir {
    use super::{ImageFile, Storage, StorageError};
    use alloc::boxed::Box;
    use std::fs::{self, File};
    use std::io::{self, Read, Seek, SeekFrom, Write};
    use std::path::{Path, PathBuf};

    /// Storage rooted at a host directory. Paths are relative to the root;
    /// a leading `/` is ignored.
    #[derive(Clone, Debug)]
    pub struct DirStorage {
        root: PathBuf,
    }

    impl DirStorage {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        fn resolve(&self, path: &str) -> PathBuf {
            self.root.join(path.trim_start_matches('/'))
        }
    }

    fn map_io(err: io::Error, what: &'static str) -> StorageError {
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io(what),
        }
    }

    struct DirFile {
        file: File,
        size: u64,
        pos: u64,
    }

    impl ImageFile for DirFile {
        fn size(&self) -> u64 {
            self.size
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
            let n = self.file.read(buf).map_err(|e| map_io(e, "read failed"))?;
            self.pos += n as u64;
            Ok(n)
        }

        fn seek(&mut self, pos: u64) -> Result<(), StorageError> {
            self.pos = self
                .file
                .seek(SeekFrom::Start(pos))
                .map_err(|e| map_io(e, "seek failed"))?;
            Ok(())
        }

        fn position(&self) -> u64 {
            self.pos
        }
    }

    impl Storage for DirStorage {
        fn open_read(&self, path: &str) -> Result<Box<dyn ImageFile + '_>, StorageError> {
            let file = File::open(self.resolve(path)).map_err(|e| map_io(e, "open failed"))?;
            let size = file
                .metadata()
                .map_err(|e| map_io(e, "stat failed"))?
                .len();
            Ok(Box::new(DirFile { file, size, pos: 0 }))
        }

        fn write_atomic(&mut self, path: &str, parts: &[&[u8]]) -> Result<(), StorageError> {
            let target = self.resolve(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| map_io(e, "create dir failed"))?;
            }
            let mut tmp = target.clone().into_os_string();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);

            let written = (|| -> io::Result<()> {
                let mut file = File::create(&tmp)?;
                for part in parts {
                    file.write_all(part)?;
                }
                file.sync_all()?;
                fs::rename(&tmp, &target)
            })();

            if let Err(e) = written {
                let _ = fs::remove_file(&tmp);
                return Err(map_io(e, "write failed"));
            }
            Ok(())
        }
    }
}
