//! Filesystem seam.
//!
//! Handlers only see [`FileSystem`]. Every operation returns an explicit
//! [`FsError`] that the handler translates into a status response.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Filesystem failures, as reported to handlers.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The path is empty or escapes the device root.
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    /// Path bytes are not UTF-8.
    #[error("path is not valid UTF-8")]
    NotUtf8,

    /// The underlying operation failed.
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        source: io::Error,
    },
}

impl FsError {
    pub fn io(op: &'static str, path: &str, source: io::Error) -> Self {
        FsError::Io {
            op,
            path: path.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::Io { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Prefix used in directory listings.
    pub fn marker(self) -> char {
        match self {
            EntryKind::File => 'f',
            EntryKind::Directory => 'd',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Device filesystem operations used by the command handlers.
///
/// Paths are device paths (`/dir/file.txt`).
pub trait FileSystem {
    type Reader: Read;
    type Writer: Write;

    /// Entries of a directory, in enumeration order.
    fn list(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    /// Size in bytes of a regular file.
    fn file_size(&self, path: &str) -> FsResult<u64>;

    fn open(&self, path: &str) -> FsResult<Self::Reader>;

    /// Create or truncate a file for writing.
    fn create(&self, path: &str) -> FsResult<Self::Writer>;

    /// Remove a file or an empty directory.
    fn remove(&self, path: &str) -> FsResult<()>;

    fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    /// Create one directory. Fails if it already exists.
    fn make_dir(&self, path: &str) -> FsResult<()>;
}

/// A host directory serving as the device's filesystem root.
///
/// Device paths resolve below `root`; `..` components are refused. Listings
/// are sorted by name so enumeration order is stable.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        if path.is_empty() {
            return Err(FsError::InvalidPath(String::new()));
        }
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(FsError::InvalidPath(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

impl FileSystem for LocalFs {
    type Reader = File;
    type Writer = File;

    fn list(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        let read_dir = std::fs::read_dir(&dir).map_err(|e| FsError::io("list", path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| FsError::io("list", path, e))?;
            let file_type = entry.file_type().map_err(|e| FsError::io("stat", path, e))?;
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry::new(entry.file_name().to_string_lossy(), kind));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn file_size(&self, path: &str) -> FsResult<u64> {
        let meta =
            std::fs::metadata(self.resolve(path)?).map_err(|e| FsError::io("stat", path, e))?;
        if meta.is_dir() {
            return Err(FsError::io(
                "stat",
                path,
                io::Error::new(ErrorKind::IsADirectory, "is a directory"),
            ));
        }
        Ok(meta.len())
    }

    fn open(&self, path: &str) -> FsResult<File> {
        File::open(self.resolve(path)?).map_err(|e| FsError::io("open", path, e))
    }

    fn create(&self, path: &str) -> FsResult<File> {
        let file = File::create(self.resolve(path)?).map_err(|e| FsError::io("create", path, e))?;
        debug!(path, "file opened for writing");
        Ok(file)
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        if target == self.root {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        let meta = std::fs::symlink_metadata(&target).map_err(|e| FsError::io("remove", path, e))?;
        let removed = if meta.is_dir() {
            std::fs::remove_dir(&target)
        } else {
            std::fs::remove_file(&target)
        };
        removed.map_err(|e| FsError::io("remove", path, e))
    }

    fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        std::fs::rename(self.resolve(from)?, self.resolve(to)?)
            .map_err(|e| FsError::io("rename", from, e))
    }

    fn make_dir(&self, path: &str) -> FsResult<()> {
        std::fs::create_dir(self.resolve(path)?).map_err(|e| FsError::io("mkdir", path, e))
    }
}

/// Copy `from` to `to` through a bounce buffer of `chunk` bytes.
pub fn copy_file<F: FileSystem>(fs: &F, from: &str, to: &str, chunk: usize) -> FsResult<u64> {
    let mut reader = fs.open(from)?;
    let mut writer = fs.create(to)?;
    let mut buf = vec![0u8; chunk.max(1)];
    let mut copied = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FsError::io("read", from, err)),
        };
        writer
            .write_all(&buf[..n])
            .map_err(|e| FsError::io("write", to, e))?;
        copied += n as u64;
    }
    writer.flush().map_err(|e| FsError::io("write", to, e))?;
    Ok(copied)
}
