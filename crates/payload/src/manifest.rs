use std::path::{Component, Path};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::PayloadError;

/// One entry in a [`Manifest`]: a file's path and size, with no transient
/// I/O state. This is the shape that actually crosses the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMeta {
    /// Slash-separated path relative to the payload root.
    pub relative_path: String,
    /// File size in bytes.
    pub size: u64,
}

/// The serialised form of a payload: `payload_root`, `total_size`, and the
/// ordered list of `(relative_path, size)` pairs. Sent as the body of the
/// `Offer` frame, ahead of any chunk.
///
/// `last_modified` is deliberately absent: the sender's copy never crosses
/// the wire (only the sender ever needs it, to detect a file changing under
/// it before the upload starts).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    /// `"."` for a single-file transfer, or a single path segment naming
    /// the directory that was offered.
    pub payload_root: String,
    /// Sum of every file's size.
    pub total_size: u64,
    /// Files in transfer order.
    pub files: Vec<FileMeta>,
}

fn write_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn read_string(buf: &mut Bytes) -> Result<String, PayloadError> {
    if buf.remaining() < 4 {
        return Err(PayloadError::MalformedManifest("truncated string length".into()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(PayloadError::MalformedManifest("truncated string body".into()));
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| PayloadError::MalformedManifest(format!("non-utf8 string: {e}")))
}

impl Manifest {
    /// Encodes the manifest using the fixed, big-endian wire layout:
    /// `payload_root`, `total_size` (8B), `file_count` (4B), then each
    /// file's `(relative_path, size)`.
    pub fn encode(&self, buf: &mut BytesMut) {
        write_string(buf, &self.payload_root);
        buf.put_u64(self.total_size);
        buf.put_u32(self.files.len() as u32);
        for file in &self.files {
            write_string(buf, &file.relative_path);
            buf.put_u64(file.size);
        }
    }

    /// Decodes a manifest previously written by [`Manifest::encode`].
    pub fn decode(buf: &mut Bytes) -> Result<Self, PayloadError> {
        let payload_root = read_string(buf)?;
        if buf.remaining() < 8 {
            return Err(PayloadError::MalformedManifest("truncated total_size".into()));
        }
        let total_size = buf.get_u64();
        if buf.remaining() < 4 {
            return Err(PayloadError::MalformedManifest("truncated file_count".into()));
        }
        let file_count = buf.get_u32() as usize;
        let mut files = Vec::with_capacity(file_count.min(1 << 20));
        for _ in 0..file_count {
            let relative_path = read_string(buf)?;
            if buf.remaining() < 8 {
                return Err(PayloadError::MalformedManifest("truncated file size".into()));
            }
            let size = buf.get_u64();
            files.push(FileMeta { relative_path, size });
        }
        Ok(Self {
            payload_root,
            total_size,
            files,
        })
    }

    /// Validates structural invariants before any chunk is read from the
    /// socket: a non-negative (trivially true for `u64`) `total_size`, a
    /// single-segment `payload_root` with no `..`, a non-empty file list,
    /// and every file's `relative_path` relative with no `..`.
    pub fn validate(&self) -> Result<(), PayloadError> {
        validate_payload_root(&self.payload_root)?;

        if self.files.is_empty() {
            return Err(PayloadError::InvalidOffer("manifest contains no files".into()));
        }

        for file in &self.files {
            validate_relative_path(&file.relative_path)?;
        }

        let computed: u64 = self.files.iter().map(|f| f.size).sum();
        if computed != self.total_size {
            return Err(PayloadError::InvalidOffer(format!(
                "declared total_size {} does not match sum of file sizes {computed}",
                self.total_size
            )));
        }

        Ok(())
    }
}

fn validate_payload_root(root: &str) -> Result<(), PayloadError> {
    if root == "." {
        return Ok(());
    }
    if root.is_empty() || root.contains('/') || root.contains('\\') || root == ".." {
        return Err(PayloadError::InvalidOffer(format!(
            "payload root {root:?} must be \".\" or a single path segment"
        )));
    }
    Ok(())
}

fn validate_relative_path(relative_path: &str) -> Result<(), PayloadError> {
    if relative_path.is_empty() {
        return Err(PayloadError::InvalidPath("empty relative path".into()));
    }
    let path = Path::new(relative_path);
    if path.is_absolute() {
        return Err(PayloadError::InvalidPath(format!(
            "{relative_path:?} is an absolute path"
        )));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(PayloadError::InvalidPath(format!(
                    "{relative_path:?} contains a disallowed path component"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            payload_root: "photos".into(),
            total_size: 11,
            files: vec![
                FileMeta {
                    relative_path: "a.jpg".into(),
                    size: 5,
                },
                FileMeta {
                    relative_path: "sub/b.jpg".into(),
                    size: 6,
                },
            ],
        }
    }

    #[test]
    fn round_trip_preserves_equality_and_validity() {
        let manifest = sample();
        let mut buf = BytesMut::new();
        manifest.encode(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = Manifest::decode(&mut bytes).unwrap();
        assert_eq!(manifest, decoded);
        assert!(decoded.validate().is_ok());
    }

    #[test]
    fn rejects_parent_traversal() {
        let mut manifest = sample();
        manifest.files[0].relative_path = "../escape".into();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn rejects_multi_segment_payload_root() {
        let mut manifest = sample();
        manifest.payload_root = "a/b".into();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn rejects_empty_file_list() {
        let mut manifest = sample();
        manifest.files.clear();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut manifest = sample();
        manifest.total_size += 1;
        assert!(manifest.validate().is_err());
    }
}
