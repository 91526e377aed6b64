//! Temporary staging of uploaded images.
//!
//! An upload is spooled to a named temp file while it streams in, then read
//! back for the extraction call. The file is removed when the image is
//! discarded or dropped, whichever comes first.

use std::io::{self, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::warn;

/// An uploaded image staged on disk.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
    len: usize,
}

impl StagedImage {
    /// Create an empty staged file in `dir`.
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)?;
        Ok(Self { file, len: 0 })
    }

    /// Stage a complete image in one go.
    pub fn from_bytes(dir: &Path, bytes: &[u8]) -> io::Result<Self> {
        let mut staged = Self::create_in(dir)?;
        staged.write_chunk(bytes)?;
        Ok(staged)
    }

    /// Append a chunk of the upload.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.as_file_mut().write_all(chunk)?;
        self.len += chunk.len();
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the staged image back.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Remove the staged file.
    ///
    /// A removal failure is logged and swallowed so it can never replace the
    /// outcome the caller is about to report.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove staged image");
        }
    }
}

/// Short content fingerprint used to identify an image in logs.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_read_discard() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = StagedImage::create_in(dir.path()).unwrap();
        staged.write_chunk(b"\x89PNG").unwrap();
        staged.write_chunk(b"rest").unwrap();

        assert_eq!(staged.len(), 8);
        assert_eq!(staged.read().await.unwrap(), b"\x89PNGrest");

        let path = staged.path().to_path_buf();
        assert!(path.exists());
        staged.discard();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedImage::from_bytes(dir.path(), b"image").unwrap();
        let path = staged.path().to_path_buf();

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_discard_after_external_removal_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedImage::from_bytes(dir.path(), b"image").unwrap();
        std::fs::remove_file(staged.path()).unwrap();

        staged.discard();
    }

    #[test]
    fn test_fingerprint() {
        let fp = fingerprint(b"abc");
        assert_eq!(fp.len(), 12);
        // SHA-256("abc") starts with ba7816bf8f01
        assert_eq!(fp, "ba7816bf8f01");
    }
}
