//! # cv-formatter-client
//!
//! Submit a PDF resume to a CV-formatter server and save the formatted Word
//! document it returns.
//!
//! The formatting itself happens on the server. This crate is the client
//! side of that exchange: it validates the credential and the file, uploads
//! them, interprets the answer (document, error message, or "log in again"),
//! and owns the resulting download until it is safely on disk. It can also
//! remember the credential between runs.
//!
//! ## Flow Overview
//!
//! ```text
//! credential + PDF
//!  │
//!  ├─ 1. Validate   key present → file present → PDF → ≤ 10 MiB
//!  ├─ 2. Remember   persist the key if the user opted in (best-effort)
//!  ├─ 3. Upload     POST /api/process  (multipart: api_key, pdf_file)
//!  ├─ 4. Interpret  401 → /login · non-2xx → message · 2xx → document
//!  └─ 5. Deliver    save now (auto-download) or hold for download()
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cv_formatter_client::{
//!     ClientConfig, FileSource, KeyStoreCredentials, RecordingView, ReqwestTransport,
//!     SubmissionController, SubmitOutcome, UploadedFile,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://cv.example.com")
//!         .output_dir("out")
//!         .build()?;
//!     let transport = ReqwestTransport::new(&config)?;
//!     let store = Arc::new(KeyStoreCredentials::open()?);
//!     let mut form = SubmissionController::new(config, transport, store, RecordingView::new());
//!
//!     form.initialize();
//!     form.input_credential("sk-...");
//!     form.select_file(UploadedFile::from_path("resume.pdf").await?, FileSource::Picker)?;
//!     match form.submit().await {
//!         SubmitOutcome::Downloaded { path, .. } => println!("saved {}", path.display()),
//!         other => eprintln!("{other:?}"),
//!     }
//!     form.settle().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cvfmt` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cv-formatter-client = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod debounce;
pub mod disposition;
pub mod download;
pub mod error;
pub mod storage;
pub mod transport;
pub mod upload;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, API_KEY_STORAGE_KEY, MAX_FILE_SIZE};
pub use controller::{SubmissionController, SubmissionState, SubmitOutcome};
pub use disposition::DEFAULT_FILENAME;
pub use download::DownloadArtifact;
pub use error::{ClientError, StoreError, SubmitError, TransportError};
pub use storage::{CredentialStore, KeyStoreCredentials, MemoryCredentials};
pub use transport::{EndpointResponse, MockTransport, ReqwestTransport, Transport};
pub use upload::{FileSource, UploadedFile};
pub use view::{FormView, RecordingView, ViewState};
