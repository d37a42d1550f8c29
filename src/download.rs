//! The formatted document, from response body to file on disk.
//!
//! A [`DownloadArtifact`] spools the body into a temporary file, the client's
//! counterpart of a browser blob URL. The spool is the resource that must be
//! released on every exit path: after an explicit save, after the delayed
//! release that follows an auto-download, or when the artifact is dropped
//! unsaved (the `tempfile` guard deletes it).

use crate::disposition::safe_file_name;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A successful result awaiting download.
#[derive(Debug)]
pub struct DownloadArtifact {
    filename: String,
    len: u64,
    spool: NamedTempFile,
}

impl DownloadArtifact {
    /// Spool `body` to a temp file in `dir` (the system temp directory when
    /// `None`). `filename` is reduced to a safe single path component.
    pub async fn spool(filename: &str, body: Bytes, dir: Option<&Path>) -> std::io::Result<Self> {
        let filename = safe_file_name(filename);
        let dir = dir.map(Path::to_path_buf);
        tokio::task::spawn_blocking(move || -> std::io::Result<Self> {
            let mut builder = tempfile::Builder::new();
            builder.prefix("cvfmt-").suffix(".part");
            let mut spool = match dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    builder.tempfile_in(dir)?
                }
                None => builder.tempfile()?,
            };
            spool.write_all(&body)?;
            spool.flush()?;
            Ok(Self {
                filename,
                len: body.len() as u64,
                spool,
            })
        })
        .await
        .map_err(std::io::Error::other)?
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the spooled bytes; gone once the artifact is released.
    pub fn spool_path(&self) -> &Path {
        self.spool.path()
    }

    /// Copy the result into `dir` as `filename`.
    ///
    /// Uses atomic write (temp file + rename) so a reader never sees a
    /// partially-written document.
    pub async fn save_into(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let target = dir.join(&self.filename);
        let tmp_path = dir.join(format!(".{}.tmp", self.filename));

        tokio::fs::copy(self.spool.path(), &tmp_path).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        info!("Saved {} ({} bytes)", target.display(), self.len);
        Ok(target)
    }

    /// Free the spool now.
    pub fn release(self) {
        let path = self.spool.path().to_path_buf();
        match self.spool.close() {
            Ok(()) => debug!("Released {}", path.display()),
            Err(e) => debug!("Spool {} already gone: {e}", path.display()),
        }
    }

    /// Free the spool after `delay`, giving the hand-off time to start.
    pub fn release_after(self, delay: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.release();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disposition::DEFAULT_FILENAME;

    async fn spool(name: &str, body: &'static [u8]) -> DownloadArtifact {
        DownloadArtifact::spool(name, Bytes::from_static(body), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_writes_bytes_under_filename() {
        let out = tempfile::tempdir().unwrap();
        let a = spool("report.docx", b"PK\x03\x04docx").await;
        assert_eq!(a.len(), 8);

        let path = a.save_into(out.path()).await.unwrap();
        assert_eq!(path, out.path().join("report.docx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x03\x04docx");

        let leftovers: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1, "tmp file left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn save_creates_missing_directory() {
        let out = tempfile::tempdir().unwrap();
        let nested = out.path().join("a/b");
        let a = spool("cv.docx", b"x").await;
        assert!(a.save_into(&nested).await.unwrap().exists());
    }

    #[tokio::test]
    async fn filename_is_sanitised() {
        let a = spool("../../evil.docx", b"x").await;
        assert_eq!(a.filename(), "evil.docx");
        let b = spool("..", b"x").await;
        assert_eq!(b.filename(), DEFAULT_FILENAME);
    }

    #[tokio::test]
    async fn release_deletes_spool() {
        let a = spool("cv.docx", b"x").await;
        let spool = a.spool_path().to_path_buf();
        assert!(spool.exists());
        a.release();
        assert!(!spool.exists());
    }

    #[tokio::test]
    async fn drop_deletes_spool() {
        let a = spool("cv.docx", b"x").await;
        let spool = a.spool_path().to_path_buf();
        drop(a);
        assert!(!spool.exists());
    }

    #[tokio::test]
    async fn spools_into_requested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("spool");
        let a = DownloadArtifact::spool("cv.docx", Bytes::from_static(b"x"), Some(&nested))
            .await
            .unwrap();
        assert!(a.spool_path().starts_with(&nested));
        a.release();
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn release_after_waits_then_deletes() {
        let a = spool("cv.docx", b"x").await;
        let spool = a.spool_path().to_path_buf();
        let handle = a.release_after(Duration::from_millis(50));
        assert!(spool.exists());
        handle.await.unwrap();
        assert!(!spool.exists());
    }
}
