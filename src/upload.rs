//! The file the user wants formatted, and the checks it must pass before
//! anything is sent.
//!
//! Validation is pure and ordered. The first failing rule wins, so the user
//! always sees the most basic problem first (no key before no file before
//! wrong type before too big).

use crate::error::{ClientError, SubmitError};
use bytes::Bytes;
use std::path::Path;
use tracing::debug;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// How the file reached the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    /// Explicit file picker. Type is not pre-filtered; submit validates it.
    Picker,
    /// Drag and drop. Anything not declared `application/pdf` is rejected
    /// on the spot.
    Drop,
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Load a file from disk, declaring its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClientError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ClientError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ClientError::FileRead {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let media_type = media_type_for(&name);
        debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), media_type);

        Ok(Self::new(name, media_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// PDF by declared type, or by a `.pdf` suffix in any case.
    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE || self.name.to_lowercase().ends_with(".pdf")
    }
}

/// Media type a browser would declare for a file with this name.
pub fn media_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => PDF_MEDIA_TYPE,
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Drop-zone gate: only a declared `application/pdf` is accepted.
pub fn check_drop(file: &UploadedFile) -> Result<(), SubmitError> {
    if file.media_type == PDF_MEDIA_TYPE {
        Ok(())
    } else {
        Err(SubmitError::UnsupportedDrop {
            media_type: file.media_type.clone(),
        })
    }
}

/// Submission checks, in order. Returns the trimmed credential on success.
pub fn validate_submission<'a>(
    credential: &'a str,
    file: Option<&UploadedFile>,
    max_file_size: u64,
) -> Result<&'a str, SubmitError> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(SubmitError::MissingCredential);
    }
    let file = file.ok_or(SubmitError::MissingFile)?;
    if !file.is_pdf() {
        return Err(SubmitError::InvalidFileType);
    }
    if file.size() > max_file_size {
        return Err(SubmitError::FileTooLarge {
            size: file.size(),
            limit: max_file_size,
        });
    }
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FILE_SIZE;

    fn pdf(len: usize) -> UploadedFile {
        UploadedFile::new("cv.pdf", PDF_MEDIA_TYPE, vec![0u8; len])
    }

    #[test]
    fn blank_credential_fails_first() {
        for key in ["", "   ", "\t\n"] {
            assert_eq!(
                validate_submission(key, None, MAX_FILE_SIZE),
                Err(SubmitError::MissingCredential)
            );
        }
    }

    #[test]
    fn credential_is_trimmed() {
        let f = pdf(10);
        assert_eq!(validate_submission("  sk-1 ", Some(&f), MAX_FILE_SIZE), Ok("sk-1"));
    }

    #[test]
    fn missing_file() {
        assert_eq!(
            validate_submission("sk", None, MAX_FILE_SIZE),
            Err(SubmitError::MissingFile)
        );
    }

    #[test]
    fn pdf_by_type_or_suffix() {
        let by_type = UploadedFile::new("resume", PDF_MEDIA_TYPE, vec![1]);
        let by_suffix = UploadedFile::new("RESUME.PDF", "application/octet-stream", vec![1]);
        let neither = UploadedFile::new("resume.docx", media_type_for("resume.docx"), vec![1]);
        assert!(by_type.is_pdf());
        assert!(by_suffix.is_pdf());
        assert!(!neither.is_pdf());
        assert_eq!(
            validate_submission("sk", Some(&neither), MAX_FILE_SIZE),
            Err(SubmitError::InvalidFileType)
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        let at_limit = pdf(MAX_FILE_SIZE as usize);
        assert!(validate_submission("sk", Some(&at_limit), MAX_FILE_SIZE).is_ok());

        let over = pdf(MAX_FILE_SIZE as usize + 1);
        assert_eq!(
            validate_submission("sk", Some(&over), MAX_FILE_SIZE),
            Err(SubmitError::FileTooLarge {
                size: MAX_FILE_SIZE + 1,
                limit: MAX_FILE_SIZE
            })
        );
    }

    #[test]
    fn type_checked_before_size() {
        let big_png = UploadedFile::new("a.png", "image/png", vec![0u8; 64]);
        assert_eq!(
            validate_submission("sk", Some(&big_png), 8),
            Err(SubmitError::InvalidFileType)
        );
    }

    #[test]
    fn drop_requires_declared_pdf_type() {
        assert!(check_drop(&pdf(1)).is_ok());
        // A `.pdf` suffix is not enough for the drop zone.
        let mislabeled = UploadedFile::new("cv.pdf", "application/octet-stream", vec![1]);
        assert!(matches!(
            check_drop(&mislabeled),
            Err(SubmitError::UnsupportedDrop { .. })
        ));
    }

    #[test]
    fn media_types_from_extension() {
        assert_eq!(media_type_for("a.PDF"), PDF_MEDIA_TYPE);
        assert_eq!(media_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn from_path_reads_and_declares_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.pdf");
        std::fs::write(&path, b"%PDF-1.7 test").unwrap();

        let f = UploadedFile::from_path(&path).await.unwrap();
        assert_eq!(f.name, "cv.pdf");
        assert_eq!(f.media_type, PDF_MEDIA_TYPE);
        assert_eq!(f.size(), 13);
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = UploadedFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::FileNotFound { .. }));
    }
}
