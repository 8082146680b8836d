use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::{BufMut, BytesMut};
use memmap2::{Mmap, MmapMut};

use crate::error::PayloadError;

/// Which side of the transfer is opening a [`File`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Sender side: the file must already exist and match the snapshot.
    ReadOnly,
    /// Receiver side: the file is created and truncated to the expected size.
    ReadWrite,
}

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

/// One file inside a [`crate::Manager`]'s payload.
///
/// Carries both the metadata snapshot taken when the payload was built
/// (`relative_path`, `size`, `last_modified`) and the transient I/O state
/// used while the file is being streamed (`pos`, the running hash, and the
/// memory mapping once opened).
pub struct File {
    relative_path: PathBuf,
    size: u64,
    last_modified: Option<SystemTime>,
    pos: u64,
    hasher: checksums::Md5,
    mapping: Option<Mapping>,
    open: bool,
}

impl File {
    /// Builds a file entry from a snapshot taken while scanning the source
    /// tree. Only the sender populates `last_modified`.
    #[must_use]
    pub fn from_snapshot(relative_path: PathBuf, size: u64, last_modified: Option<SystemTime>) -> Self {
        Self {
            relative_path,
            size,
            last_modified,
            pos: 0,
            hasher: checksums::Md5::new(),
            mapping: None,
            open: false,
        }
    }

    /// Builds a file entry from a deserialised manifest. The receiver never
    /// has a `last_modified` snapshot to compare against.
    #[must_use]
    pub fn from_manifest(relative_path: PathBuf, size: u64) -> Self {
        Self::from_snapshot(relative_path, size, None)
    }

    /// Path relative to the payload root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Size snapshotted when the file entry was built.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes read or written so far.
    #[must_use]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Whether every byte of the file has been processed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pos == self.size
    }

    fn absolute_path(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(&self.relative_path)
    }

    /// Opens the file for the given `mode` against `root_dir`.
    ///
    /// `ReadOnly` fails with [`PayloadError::FileChanged`] if the on-disk
    /// size or modification time no longer matches the snapshot. `ReadWrite`
    /// creates parent directories, truncates to `size`, then maps.
    ///
    /// A zero-size file performs no mapping; it is immediately considered
    /// open and finished.
    pub fn open(&mut self, root_dir: &Path, mode: OpenMode) -> Result<(), PayloadError> {
        let path = self.absolute_path(root_dir);
        self.pos = 0;
        self.hasher = checksums::Md5::new();

        if self.size == 0 {
            if mode == OpenMode::ReadWrite {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| PayloadError::PathCreation {
                        path: path.clone(),
                        source,
                    })?;
                }
                fs::File::create(&path).map_err(|source| PayloadError::Open {
                    path: path.clone(),
                    source,
                })?;
            }
            self.mapping = None;
            self.open = true;
            return Ok(());
        }

        match mode {
            OpenMode::ReadOnly => {
                let metadata = fs::metadata(&path).map_err(|source| PayloadError::Open {
                    path: path.clone(),
                    source,
                })?;
                let matches_size = metadata.len() == self.size;
                let matches_mtime = match (self.last_modified, metadata.modified()) {
                    (Some(expected), Ok(actual)) => expected == actual,
                    (None, _) => true,
                    (Some(_), Err(_)) => false,
                };
                if !matches_size || !matches_mtime {
                    return Err(PayloadError::FileChanged {
                        path: self.relative_path.clone(),
                    });
                }

                let file = fs::File::open(&path).map_err(|source| PayloadError::Open {
                    path: path.clone(),
                    source,
                })?;
                let mmap = unsafe_map_readonly(&file, &path)?;
                self.mapping = Some(Mapping::ReadOnly(mmap));
            }
            OpenMode::ReadWrite => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| PayloadError::PathCreation {
                        path: path.clone(),
                        source,
                    })?;
                }
                let file = fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|source| PayloadError::Open {
                        path: path.clone(),
                        source,
                    })?;
                file.set_len(self.size).map_err(|source| PayloadError::Resize {
                    path: path.clone(),
                    size: self.size,
                    source,
                })?;
                let mmap = unsafe_map_readwrite(&file, &path)?;
                self.mapping = Some(Mapping::ReadWrite(mmap));
            }
        }

        self.open = true;
        Ok(())
    }

    /// Copies `min(max_bytes, size - pos)` bytes from the mapping into
    /// `out`, hashing the bytes copied and advancing `pos`.
    pub fn read_into(&mut self, out: &mut BytesMut, max_bytes: u64) -> std::io::Result<u64> {
        let remaining = self.size - self.pos;
        let to_copy = remaining.min(max_bytes);
        if to_copy == 0 {
            return Ok(0);
        }
        let Some(Mapping::ReadOnly(mmap)) = &self.mapping else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file is not open for reading",
            ));
        };
        let start = self.pos as usize;
        let end = start + to_copy as usize;
        let slice = &mmap[start..end];
        out.put_slice(slice);
        self.hasher.update(slice);
        self.pos += to_copy;
        Ok(to_copy)
    }

    /// Copies `min(data.len(), size - pos)` bytes from `data` into the
    /// mapping, hashing the bytes copied and advancing `pos`. Returns the
    /// number of bytes consumed from `data` (the caller advances its own
    /// cursor by that amount).
    pub fn write_from(&mut self, data: &[u8]) -> std::io::Result<u64> {
        let remaining = self.size - self.pos;
        let to_copy = remaining.min(data.len() as u64);
        if to_copy == 0 {
            return Ok(0);
        }
        let Some(Mapping::ReadWrite(mmap)) = &mut self.mapping else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file is not open for writing",
            ));
        };
        let start = self.pos as usize;
        let end = start + to_copy as usize;
        let chunk = &data[..to_copy as usize];
        mmap[start..end].copy_from_slice(chunk);
        self.hasher.update(chunk);
        self.pos += to_copy;
        Ok(to_copy)
    }

    /// Current digest. Only meaningful once `pos == size`.
    #[must_use]
    pub fn checksum(&self) -> [u8; checksums::DIGEST_LEN] {
        self.hasher.clone().finalize()
    }

    /// Whether `expected` matches the current digest.
    #[must_use]
    pub fn test_checksum(&self, expected: &[u8]) -> bool {
        self.checksum().as_slice() == expected
    }

    /// Unmaps and closes the file. Idempotent.
    pub fn close(&mut self) {
        self.mapping = None;
        self.open = false;
    }

    /// Whether the file has been opened and not yet closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.close();
    }
}

fn unsafe_map_readonly(file: &fs::File, path: &Path) -> Result<Mmap, PayloadError> {
    // SAFETY: the process does not expose the backing file to any other
    // writer for the lifetime of the mapping; `Manager` guarantees at most
    // one `File` per payload is open at a time.
    unsafe { Mmap::map(file) }.map_err(|source| PayloadError::Map {
        path: path.to_path_buf(),
        source,
    })
}

fn unsafe_map_readwrite(file: &fs::File, path: &Path) -> Result<MmapMut, PayloadError> {
    // SAFETY: see `unsafe_map_readonly`.
    unsafe { MmapMut::map_mut(file) }.map_err(|source| PayloadError::Map {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn zero_size_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::from_manifest(PathBuf::from("empty.txt"), 0);
        file.open(dir.path(), OpenMode::ReadWrite).unwrap();
        assert!(file.is_finished());
        assert_eq!(file.checksum(), checksums::Md5::digest(b""));
        let mut buf = BytesMut::new();
        assert_eq!(file.read_into(&mut buf, 10).unwrap(), 0);
    }

    #[test]
    fn round_trips_small_file() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let name = "hello.txt";
        std::fs::write(src_dir.path().join(name), b"hello world").unwrap();

        let mut sender = File::from_snapshot(PathBuf::from(name), 11, None);
        sender.open(src_dir.path(), OpenMode::ReadOnly).unwrap();
        let mut buf = BytesMut::new();
        let copied = sender.read_into(&mut buf, 100).unwrap();
        assert_eq!(copied, 11);
        assert!(sender.is_finished());

        let mut receiver = File::from_manifest(PathBuf::from(name), 11);
        receiver.open(dst_dir.path(), OpenMode::ReadWrite).unwrap();
        let written = receiver.write_from(&buf).unwrap();
        assert_eq!(written, 11);
        assert!(receiver.is_finished());
        assert_eq!(sender.checksum(), receiver.checksum());

        receiver.close();
        let out = std::fs::read(dst_dir.path().join(name)).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn read_only_rejects_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 5]).unwrap();
        drop(f);

        let mut file = File::from_snapshot(PathBuf::from("a.bin"), 999, None);
        let err = file.open(dir.path(), OpenMode::ReadOnly).unwrap_err();
        assert!(matches!(err, PayloadError::FileChanged { .. }));
    }
}
