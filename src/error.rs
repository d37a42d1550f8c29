//! Error types for the cv-formatter client.
//!
//! Four error types reflect four distinct failure surfaces:
//!
//! * [`ClientError`] — **Fatal**: the client cannot be set up or an input
//!   cannot be read at all (bad base URL, unreadable file). Returned as
//!   `Err(ClientError)` from constructors and loaders.
//!
//! * [`SubmitError`] — **Per-submission**: one press of "submit" failed
//!   (missing credential, server said no, network down). Never propagated
//!   as `Err`; it is shown inline through the view and returned inside
//!   [`crate::controller::SubmitOutcome::Failed`] so the form stays usable.
//!
//! * [`TransportError`] — what the [`crate::transport::Transport`] seam
//!   reports when no HTTP response could be obtained.
//!
//! * [`StoreError`] — what the [`crate::storage::CredentialStore`] seam
//!   reports. Always non-fatal: the credential is simply not remembered.

use std::path::PathBuf;
use thiserror::Error;

/// Fallback shown when a failure carries no message fit for the user.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing your resume";

/// All fatal errors returned by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while reading an input file.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential store could not be opened.
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// A failed submission, as the user sees it.
///
/// `Display` yields the exact text placed in the form's error area.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    // ── Validation (no request is issued) ─────────────────────────────────
    #[error("Please enter your OpenAI API key")]
    MissingCredential,

    #[error("Please select a PDF file")]
    MissingFile,

    #[error("Please upload a valid PDF file")]
    InvalidFileType,

    #[error("File size exceeds 10MB limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// A dropped file did not declare `application/pdf`.
    #[error("Please upload a PDF file")]
    UnsupportedDrop { media_type: String },

    // ── Server ────────────────────────────────────────────────────────────
    /// Non-2xx (other than 401). `message` is the server's `error` text or
    /// `Server error: <status>`.
    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    // ── Transport / local I/O ─────────────────────────────────────────────
    /// The request could not be completed. The detail is for logs only.
    #[error("An error occurred while processing your resume")]
    Transport { detail: String },

    /// The result arrived but could not be saved. The detail is for logs only.
    #[error("An error occurred while processing your resume")]
    Download { detail: String },

    // ── Misuse ────────────────────────────────────────────────────────────
    #[error("There is no formatted resume to download")]
    NothingToDownload,

    /// A submission is already in flight.
    #[error("A resume is already being processed")]
    Busy,
}

impl SubmitError {
    /// Detected locally before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SubmitError::MissingCredential
                | SubmitError::MissingFile
                | SubmitError::InvalidFileType
                | SubmitError::FileTooLarge { .. }
                | SubmitError::UnsupportedDrop { .. }
        )
    }

    /// Text for the form's error area. Technical detail never leaks here.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Diagnostic detail for logs, if this error carries any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            SubmitError::Transport { detail } | SubmitError::Download { detail } => Some(detail),
            _ => None,
        }
    }
}

/// No HTTP response could be obtained from an endpoint.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be built (bad media type, bad URL, …).
    #[error("Failed to build request: {0}")]
    Build(String),

    /// Connection, TLS, or timeout failure while sending.
    #[error("Request to '{url}' failed: {reason}")]
    Send { url: String, reason: String },

    /// The status line arrived but the body could not be read.
    #[error("Failed to read response body from '{url}': {reason}")]
    Body { url: String, reason: String },
}

/// A credential-store operation failed. Always non-fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    KeyStore(#[from] keystore::KeyStoreError),

    /// Backend refused the operation (used by in-memory test doubles).
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_match_form_copy() {
        assert_eq!(
            SubmitError::MissingCredential.to_string(),
            "Please enter your OpenAI API key"
        );
        assert_eq!(SubmitError::MissingFile.to_string(), "Please select a PDF file");
        assert_eq!(
            SubmitError::InvalidFileType.to_string(),
            "Please upload a valid PDF file"
        );
        assert_eq!(
            SubmitError::FileTooLarge {
                size: 11 * 1024 * 1024,
                limit: 10 * 1024 * 1024
            }
            .to_string(),
            "File size exceeds 10MB limit"
        );
    }

    #[test]
    fn server_rejection_shows_message_verbatim() {
        let e = SubmitError::ServerRejected {
            status: 500,
            message: "bad key".into(),
        };
        assert_eq!(e.user_message(), "bad key");
        assert!(!e.is_validation());
    }

    #[test]
    fn transport_detail_is_hidden_from_user() {
        let e = SubmitError::Transport {
            detail: "tcp connect error: Connection refused (os error 111)".into(),
        };
        let msg = e.user_message();
        assert_eq!(msg, GENERIC_FAILURE_MESSAGE);
        assert!(!msg.contains("os error"));
        assert_eq!(
            e.detail(),
            Some("tcp connect error: Connection refused (os error 111)")
        );
    }

    #[test]
    fn validation_classification() {
        assert!(SubmitError::MissingCredential.is_validation());
        assert!(SubmitError::UnsupportedDrop {
            media_type: "image/png".into()
        }
        .is_validation());
        assert!(!SubmitError::Busy.is_validation());
        assert!(!SubmitError::Download { detail: "x".into() }.is_validation());
    }

    #[test]
    fn file_not_found_display() {
        let e = ClientError::FileNotFound {
            path: PathBuf::from("/nope/cv.pdf"),
        };
        assert!(e.to_string().contains("/nope/cv.pdf"));
    }
}
