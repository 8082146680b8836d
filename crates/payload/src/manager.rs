use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::BytesMut;

use crate::error::PayloadError;
use crate::file::{File, OpenMode};
use crate::manifest::{FileMeta, Manifest};

/// Bytes requested per [`Manager::next_chunk_size`]/`send_next_chunk` call.
pub const CHUNK_SIZE: u64 = 10_000;

/// How often the directory scan checks its wall-clock budget, in number of
/// entries processed between checks.
const SCAN_YIELD_BATCH: u32 = 256;

/// Wall-clock budget per scan burst before yielding back to the executor.
const SCAN_MAX_WORK: std::time::Duration = std::time::Duration::from_millis(40);

/// The digest and path of one file, as produced by
/// [`Manager::take_pending_checksums`] and consumed by
/// [`Manager::test_checksums`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChecksum {
    /// Path relative to the payload root.
    pub relative_path: PathBuf,
    /// MD5 digest of the file's bytes.
    pub digest: [u8; checksums::DIGEST_LEN],
}

/// Lifecycle mode of a [`Manager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Not yet started, or finished successfully.
    Closed,
    /// Sender side: streaming file bytes out.
    Sending,
    /// Receiver side: streaming file bytes in.
    Receiving,
}

/// Owns the ordered list of [`File`]s for one transfer and drives chunked
/// send/receive plus per-file checksum bookkeeping.
///
/// A `Manager` is single-use: [`Manager::start_sending`] or
/// [`Manager::start_receiving`] may each only be called once.
pub struct Manager {
    payload_root: String,
    files: Vec<File>,
    total_size: u64,
    mode: Mode,
    started: bool,
    current_file: usize,
    next_file_to_checksum: usize,
    total_transferred: u64,
    nb_files_transferred: u64,
    root_dir: PathBuf,
}

impl Manager {
    fn new(payload_root: String, root_dir: PathBuf, files: Vec<File>) -> Self {
        let total_size = files.iter().map(File::size).sum();
        Self {
            payload_root,
            files,
            total_size,
            mode: Mode::Closed,
            started: false,
            current_file: 0,
            next_file_to_checksum: 0,
            total_transferred: 0,
            nb_files_transferred: 0,
            root_dir,
        }
    }

    /// Builds a sender-side manager by scanning `path`.
    ///
    /// If `path` is a regular file, `payload_root` becomes `"."` and the
    /// manager holds a single entry. If it is a directory, `payload_root`
    /// becomes its basename and every regular file beneath it (skipping
    /// symlinks, and skipping dotfiles when `ignore_hidden` is set) is added
    /// in filesystem iteration order. Yields to the executor periodically so
    /// scanning a large tree does not starve other tasks.
    pub async fn scan_source(path: &Path, ignore_hidden: bool) -> Result<Self, PayloadError> {
        let canonical = std::fs::canonicalize(path).map_err(|source| PayloadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = std::fs::metadata(&canonical).map_err(|source| PayloadError::Open {
            path: canonical.clone(),
            source,
        })?;

        let enclosing_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if metadata.is_file() {
            let name = canonical
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| PayloadError::InvalidPath(format!("{canonical:?} has no file name")))?;
            let file = File::from_snapshot(PathBuf::from(name), metadata.len(), metadata.modified().ok());
            return Ok(Self::new(".".to_string(), enclosing_dir, vec![file]));
        }

        let payload_root = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PayloadError::InvalidPath(format!("{canonical:?} has no directory name")))?;

        let mut files = Vec::new();
        let mut processed: u32 = 0;
        let mut budget_start = Instant::now();

        for entry in walkdir::WalkDir::new(&canonical).follow_links(false) {
            let entry = entry.map_err(|source| PayloadError::Open {
                path: canonical.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, source),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&canonical)
                .expect("walkdir yields paths under its root")
                .to_path_buf();
            if ignore_hidden && is_hidden(&relative) {
                continue;
            }
            let file_metadata = entry.metadata().map_err(|source| PayloadError::Open {
                path: entry.path().to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, source),
            })?;
            files.push(File::from_snapshot(
                relative,
                file_metadata.len(),
                file_metadata.modified().ok(),
            ));

            processed += 1;
            if processed % SCAN_YIELD_BATCH == 0 && budget_start.elapsed() >= SCAN_MAX_WORK {
                tokio::task::yield_now().await;
                budget_start = Instant::now();
            }
        }

        if files.is_empty() {
            return Err(PayloadError::EmptyDirectory { path: canonical });
        }

        Ok(Self::new(payload_root, enclosing_dir, files))
    }

    /// Builds a receiver-side manager from an already-validated manifest.
    /// `target_dir` is the directory under which `payload_root` will be
    /// created.
    #[must_use]
    pub fn from_manifest(manifest: &Manifest, target_dir: PathBuf) -> Self {
        let files = manifest
            .files
            .iter()
            .map(|meta| File::from_manifest(PathBuf::from(&meta.relative_path), meta.size))
            .collect();
        Self::new(manifest.payload_root.clone(), target_dir, files)
    }

    /// Builds the manifest to offer to a peer from the current file list.
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        Manifest {
            payload_root: self.payload_root.clone(),
            total_size: self.total_size,
            files: self
                .files
                .iter()
                .map(|f| FileMeta {
                    relative_path: f.relative_path().to_string_lossy().into_owned(),
                    size: f.size(),
                })
                .collect(),
        }
    }

    fn files_root(&self) -> PathBuf {
        if self.payload_root == "." {
            self.root_dir.clone()
        } else {
            self.root_dir.join(&self.payload_root)
        }
    }

    /// `payload_root` of this payload.
    #[must_use]
    pub fn payload_root(&self) -> &str {
        &self.payload_root
    }

    /// Sum of every file's size.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes transferred so far.
    #[must_use]
    pub fn total_transferred(&self) -> u64 {
        self.total_transferred
    }

    /// Files fully received or sent so far.
    #[must_use]
    pub fn nb_files_transferred(&self) -> u64 {
        self.nb_files_transferred
    }

    /// Current lifecycle mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the transfer finished successfully: every byte has been
    /// transferred and every checksum consumed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.started && matches!(self.mode, Mode::Closed)
    }

    fn start(&mut self, mode: Mode) -> Result<(), PayloadError> {
        if self.started {
            return Err(PayloadError::InvalidOffer("transfer already started".into()));
        }
        self.started = true;
        self.mode = mode;
        Ok(())
    }

    /// Whether `current_file` names a file that still needs attention: a
    /// zero-size file never produces a chunk/write of nonzero length, so a
    /// loop gated purely on remaining byte budget would otherwise stall on
    /// it forever (most visibly when every remaining file, including a
    /// trailing run of them, is empty).
    fn current_file_is_empty(&self) -> bool {
        self.files
            .get(self.current_file)
            .is_some_and(|f| f.size() == 0)
    }

    /// Transitions `Closed -> Sending`, resetting every counter to zero.
    pub fn start_sending(&mut self) -> Result<(), PayloadError> {
        self.start(Mode::Sending)
    }

    /// Transitions `Closed -> Receiving`, resetting every counter to zero.
    pub fn start_receiving(&mut self) -> Result<(), PayloadError> {
        self.start(Mode::Receiving)
    }

    /// `min(CHUNK_SIZE, total_size - total_transferred)`; zero when done.
    #[must_use]
    pub fn next_chunk_size(&self) -> u64 {
        CHUNK_SIZE.min(self.total_size - self.total_transferred)
    }

    /// Writes exactly `next_chunk_size()` bytes into `sink`, spanning as
    /// many files as needed and closing each as its last byte is read.
    pub fn send_next_chunk(&mut self, sink: &mut BytesMut) -> Result<(), PayloadError> {
        let mut remaining = self.next_chunk_size();
        let files_root = self.files_root();
        while remaining > 0 || self.current_file_is_empty() {
            let idx = self.current_file;
            let Some(file) = self.files.get_mut(idx) else { break };
            if !file.is_open() {
                file.open(&files_root, OpenMode::ReadOnly)?;
            }
            let copied = file.read_into(sink, remaining)?;
            remaining -= copied;
            self.total_transferred += copied;
            if file.is_finished() {
                file.close();
                self.nb_files_transferred += 1;
                self.current_file += 1;
            } else if copied == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Writes `source` into the payload, spanning as many files as needed.
    /// Rejects `source.len() > total_size - total_transferred` with
    /// [`PayloadError::ChunkOverrun`].
    pub fn receive_chunk(&mut self, source: &[u8]) -> Result<(), PayloadError> {
        let remaining_total = self.total_size - self.total_transferred;
        if source.len() as u64 > remaining_total {
            return Err(PayloadError::ChunkOverrun {
                requested: source.len() as u64,
                remaining: remaining_total,
            });
        }

        let files_root = self.files_root();
        let mut offset = 0usize;
        while offset < source.len() || self.current_file_is_empty() {
            let idx = self.current_file;
            let Some(file) = self.files.get_mut(idx) else { break };
            if !file.is_open() {
                file.open(&files_root, OpenMode::ReadWrite)?;
            }
            let written = file.write_from(&source[offset..])?;
            offset += written as usize;
            self.total_transferred += written;
            if file.is_finished() {
                file.close();
                self.nb_files_transferred += 1;
                self.current_file += 1;
            } else if written == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Returns every file whose last byte has been processed since the
    /// previous call, advancing `next_file_to_checksum` to meet
    /// `current_file`. Closes the manager (marking the transfer a success)
    /// once every file has been accounted for.
    pub fn take_pending_checksums(&mut self) -> Vec<FileChecksum> {
        let mut out = Vec::new();
        while self.next_file_to_checksum < self.current_file {
            let file = &self.files[self.next_file_to_checksum];
            out.push(FileChecksum {
                relative_path: file.relative_path().to_path_buf(),
                digest: file.checksum(),
            });
            self.next_file_to_checksum += 1;
        }
        if self.next_file_to_checksum == self.files.len() {
            self.mode = Mode::Closed;
        }
        out
    }

    /// Consumes `digests.len()` files starting at `next_file_to_checksum`,
    /// checking each. The first mismatch fails with
    /// [`PayloadError::ChecksumMismatch`]; a digest for a file that has not
    /// finished receiving fails with [`PayloadError::PrematureChecksum`].
    pub fn test_checksums(&mut self, digests: &[[u8; checksums::DIGEST_LEN]]) -> Result<(), PayloadError> {
        if digests.is_empty() {
            tracing::debug!("received an empty checksums frame; treating as a no-op");
        }
        for digest in digests {
            if self.next_file_to_checksum >= self.current_file {
                return Err(PayloadError::PrematureChecksum);
            }
            let file = &self.files[self.next_file_to_checksum];
            if !file.test_checksum(digest) {
                return Err(PayloadError::ChecksumMismatch {
                    path: file.relative_path().to_path_buf(),
                });
            }
            self.next_file_to_checksum += 1;
        }
        if self.next_file_to_checksum == self.files.len() {
            self.mode = Mode::Closed;
        }
        Ok(())
    }

    /// Stops the transfer: unmaps the currently open file (if any) and
    /// marks the manager closed. Used for cancellation.
    pub fn stop(&mut self) {
        if let Some(file) = self.files.get_mut(self.current_file) {
            file.close();
        }
        self.mode = Mode::Closed;
    }
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_file_gets_dot_payload_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"abc").unwrap();

        let manager = Manager::scan_source(&path, false).await.unwrap();
        assert_eq!(manager.payload_root(), ".");
        assert_eq!(manager.total_size(), 3);
    }

    #[tokio::test]
    async fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manager::scan_source(dir.path(), false).await.unwrap_err();
        assert!(matches!(err, PayloadError::EmptyDirectory { .. }));
    }

    #[tokio::test]
    async fn hidden_files_are_skipped_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::write(dir.path().join("visible.txt"), b"y").unwrap();

        let manager = Manager::scan_source(dir.path(), true).await.unwrap();
        assert_eq!(manager.manifest().files.len(), 1);
    }

    #[tokio::test]
    async fn full_send_receive_round_trip() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        std::fs::write(src_dir.path().join("a"), vec![0x41u8; 6_000]).unwrap();
        std::fs::write(src_dir.path().join("b"), vec![0x42u8; 6_000]).unwrap();
        let payload_dir = src_dir.path().join("payload");
        std::fs::create_dir(&payload_dir).unwrap();
        std::fs::write(payload_dir.join("a"), vec![0x41u8; 6_000]).unwrap();
        std::fs::write(payload_dir.join("b"), vec![0x42u8; 6_000]).unwrap();

        let mut sender = Manager::scan_source(&payload_dir, false).await.unwrap();
        sender.start_sending().unwrap();
        let manifest = sender.manifest();

        let mut receiver = Manager::from_manifest(&manifest, dst_dir.path().to_path_buf());
        receiver.start_receiving().unwrap();

        while sender.total_transferred() < sender.total_size() {
            let mut buf = BytesMut::new();
            sender.send_next_chunk(&mut buf).unwrap();
            receiver.receive_chunk(&buf).unwrap();
            let sent_sums = sender.take_pending_checksums();
            if !sent_sums.is_empty() {
                let digests: Vec<_> = sent_sums.iter().map(|c| c.digest).collect();
                receiver.test_checksums(&digests).unwrap();
            }
        }

        assert!(receiver.is_complete());
        assert_eq!(
            std::fs::read(dst_dir.path().join("payload").join("a")).unwrap(),
            vec![0x41u8; 6_000]
        );
        assert_eq!(
            std::fs::read(dst_dir.path().join("payload").join("b")).unwrap(),
            vec![0x42u8; 6_000]
        );
    }

    #[tokio::test]
    async fn trailing_empty_file_does_not_stall_completion() {
        let dst_dir = tempfile::tempdir().unwrap();
        let manifest = Manifest {
            payload_root: ".".into(),
            total_size: 3,
            files: vec![
                FileMeta {
                    relative_path: "a".into(),
                    size: 3,
                },
                FileMeta {
                    relative_path: "b".into(),
                    size: 0,
                },
            ],
        };

        let src_dir = tempfile::tempdir().unwrap();
        std::fs::write(src_dir.path().join("a"), b"xyz").unwrap();
        std::fs::write(src_dir.path().join("b"), b"").unwrap();
        let sender_files = vec![
            File::from_manifest(PathBuf::from("a"), 3),
            File::from_manifest(PathBuf::from("b"), 0),
        ];
        let mut sender = Manager::new(".".into(), src_dir.path().to_path_buf(), sender_files);
        sender.start_sending().unwrap();

        let mut receiver = Manager::from_manifest(&manifest, dst_dir.path().to_path_buf());
        receiver.start_receiving().unwrap();

        while !sender.is_complete() {
            let mut buf = BytesMut::new();
            sender.send_next_chunk(&mut buf).unwrap();
            if !buf.is_empty() {
                receiver.receive_chunk(&buf).unwrap();
            }
            let sums = sender.take_pending_checksums();
            if !sums.is_empty() {
                let digests: Vec<_> = sums.iter().map(|c| c.digest).collect();
                receiver.test_checksums(&digests).unwrap();
            }
        }

        assert!(receiver.is_complete());
        assert_eq!(std::fs::read(dst_dir.path().join("a")).unwrap(), b"xyz");
    }

    #[tokio::test]
    async fn chunk_overrun_is_rejected() {
        let dst_dir = tempfile::tempdir().unwrap();
        let manifest = Manifest {
            payload_root: ".".into(),
            total_size: 3,
            files: vec![FileMeta {
                relative_path: "a".into(),
                size: 3,
            }],
        };
        let mut receiver = Manager::from_manifest(&manifest, dst_dir.path().to_path_buf());
        receiver.start_receiving().unwrap();
        let err = receiver.receive_chunk(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, PayloadError::ChunkOverrun { .. }));
    }

    #[tokio::test]
    async fn premature_checksum_is_rejected() {
        let dst_dir = tempfile::tempdir().unwrap();
        let manifest = Manifest {
            payload_root: ".".into(),
            total_size: 3,
            files: vec![FileMeta {
                relative_path: "a".into(),
                size: 3,
            }],
        };
        let mut receiver = Manager::from_manifest(&manifest, dst_dir.path().to_path_buf());
        receiver.start_receiving().unwrap();
        let err = receiver.test_checksums(&[[0u8; 16]]).unwrap_err();
        assert!(matches!(err, PayloadError::PrematureChecksum));
    }
}
