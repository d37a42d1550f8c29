//! The submission controller: one upload-and-download cycle per user action.
//!
//! ## State machine
//!
//! ```text
//!            submit (invalid)                    submit (invalid)
//!   Idle ──────────────────────▶ Error ◀──────────────────────── Success
//!     │                            ▲ ▲                               ▲
//!     │ submit (valid)             │ │ non-2xx / transport failure   │ 2xx
//!     └──────────────▶ Loading ────┘ └───────────────────────────────┤
//!                        │   ▲                                       │
//!                        │   └──────── submit (valid) ───────────────┘
//!                        │ 401
//!                        ▼
//!                 navigate to /login (stays Loading)
//! ```
//!
//! `Loading` is also the in-flight guard: while it holds, `submit` and
//! `select_file` are refused with [`SubmitError::Busy`]. Every outcome other
//! than the 401 redirect leaves `Loading` and re-enables the form.

use crate::config::ClientConfig;
use crate::debounce::Debouncer;
use crate::disposition::filename_from_header;
use crate::download::DownloadArtifact;
use crate::error::{SubmitError, TransportError};
use crate::storage::{persist, CredentialStore};
use crate::transport::{EndpointResponse, Transport};
use crate::upload::{check_drop, validate_submission, FileSource, UploadedFile};
use crate::view::FormView;
use bytes::Bytes;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DOWNLOADED_MESSAGE: &str = "Resume formatted and downloaded successfully!";
pub const READY_MESSAGE: &str = "Resume formatted successfully!";

/// Where the form is in its lifecycle. Lives for one session only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Result of one [`SubmissionController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Auto-download saved the document.
    Downloaded { path: PathBuf, filename: String },
    /// Document is held; call [`SubmissionController::download`].
    Ready { filename: String },
    /// The server answered 401 and the view was sent to the login page.
    Redirected { to: String },
    /// Shown to the user through the view.
    Failed(SubmitError),
}

/// What a processing-endpoint response means for the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    /// 401: session is gone.
    Redirect,
    /// 2xx: the formatted document.
    Document { filename: String, body: Bytes },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
struct HealthBody {
    status: Option<String>,
}

/// Message for a non-2xx response: the body's `error` string when it is
/// JSON and non-empty, `Server error: <status>` otherwise.
pub fn server_error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Server error: {status}"))
}

/// Classify a processing-endpoint response.
pub fn interpret_response(response: EndpointResponse) -> Result<ServerReply, SubmitError> {
    if response.status == 401 {
        return Ok(ServerReply::Redirect);
    }
    if !response.is_success() {
        return Err(SubmitError::ServerRejected {
            status: response.status,
            message: server_error_message(response.status, &response.body),
        });
    }
    Ok(ServerReply::Document {
        filename: filename_from_header(response.content_disposition.as_deref()),
        body: response.body,
    })
}

/// Owns the form: credential, remember toggle, selected file, submission
/// state, the pending result, and the view it all renders into.
pub struct SubmissionController<T: Transport, V: FormView> {
    config: ClientConfig,
    transport: T,
    store: Arc<dyn CredentialStore>,
    view: V,
    credential: String,
    remember: bool,
    auto_download: bool,
    file: Option<UploadedFile>,
    state: SubmissionState,
    save_debounce: Debouncer,
    pending_download: Option<DownloadArtifact>,
    releases: Vec<JoinHandle<()>>,
}

impl<T: Transport, V: FormView> SubmissionController<T, V> {
    pub fn new(config: ClientConfig, transport: T, store: Arc<dyn CredentialStore>, view: V) -> Self {
        Self {
            auto_download: config.auto_download,
            save_debounce: Debouncer::new(config.debounce()),
            config,
            transport,
            store,
            view,
            credential: String::new(),
            remember: false,
            file: None,
            state: SubmissionState::Idle,
            pending_download: None,
            releases: Vec::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == SubmissionState::Loading
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn remember(&self) -> bool {
        self.remember
    }

    pub fn auto_download(&self) -> bool {
        self.auto_download
    }

    pub fn set_auto_download(&mut self, on: bool) {
        self.auto_download = on;
    }

    pub fn selected_file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// Filename of the held result, if auto-download was off.
    pub fn pending_download(&self) -> Option<&str> {
        self.pending_download.as_ref().map(DownloadArtifact::filename)
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Credential ──────────────────────────────────────────────────────────

    /// Pre-fill from the store. Read failures count as "nothing saved".
    pub fn initialize(&mut self) {
        match self.store.load() {
            Ok(Some(saved)) if !saved.is_empty() => {
                debug!("Loaded remembered API key");
                self.view.set_credential(&saved);
                self.view.set_remember(true);
                self.view.set_clear_visible(true);
                self.credential = saved;
                self.remember = true;
            }
            Ok(_) => self.view.set_clear_visible(false),
            Err(e) => {
                warn!("Could not load saved API key: {e}");
                self.view.set_clear_visible(false);
            }
        }
    }

    /// The user typed into the credential field.
    ///
    /// When remembering, the trimmed value is persisted once input has been
    /// quiet for the debounce period. Must be called within a tokio runtime.
    ///
    /// The field is disabled while a request is in flight, so input is
    /// ignored then.
    pub fn input_credential(&mut self, value: &str) {
        if self.is_busy() {
            debug!("Credential input ignored: a request is in flight");
            return;
        }
        self.credential = value.to_string();
        if !self.remember {
            return;
        }

        let key = value.trim().to_string();
        self.view.set_clear_visible(!key.is_empty());
        let store = Arc::clone(&self.store);
        self.save_debounce.schedule(move || {
            persist(store.as_ref(), true, &key);
        });
    }

    /// Flip the remember toggle. Off forgets immediately; on stores the
    /// current value right away if there is one.
    pub fn set_remember(&mut self, on: bool) {
        if !on {
            self.clear_credential();
            return;
        }

        self.remember = true;
        self.view.set_remember(true);
        let key = self.credential.trim().to_string();
        if !key.is_empty() {
            let stored = persist(self.store.as_ref(), true, &key);
            self.view.set_clear_visible(stored);
        }
    }

    /// Forget the credential: store, field and toggle.
    pub fn clear_credential(&mut self) {
        if self.save_debounce.cancel() {
            debug!("Dropped pending API key write");
        }
        if let Err(e) = self.store.remove() {
            warn!("Could not clear API key: {e}");
        }
        self.credential.clear();
        self.remember = false;
        self.view.set_credential("");
        self.view.set_remember(false);
        self.view.set_clear_visible(false);
    }

    // ── File ────────────────────────────────────────────────────────────────

    /// Accept a file from the picker or the drop area.
    ///
    /// A refused drop keeps the previous selection.
    pub fn select_file(&mut self, file: UploadedFile, source: FileSource) -> Result<(), SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }
        if source == FileSource::Drop {
            if let Err(e) = check_drop(&file) {
                debug!("Rejected dropped file {} ({})", file.name, file.media_type);
                self.view.show_error(&e.user_message());
                return Err(e);
            }
        }
        self.view.show_file(&file.name);
        self.file = Some(file);
        Ok(())
    }

    // ── Submit ──────────────────────────────────────────────────────────────

    /// Validate, upload, and hand over the result.
    pub async fn submit(&mut self) -> SubmitOutcome {
        if self.is_busy() {
            debug!("Submit ignored: a request is already in flight");
            return SubmitOutcome::Failed(SubmitError::Busy);
        }

        self.view.hide_messages();
        if let Some(stale) = self.pending_download.take() {
            stale.release();
        }

        let validated =
            validate_submission(&self.credential, self.file.as_ref(), self.config.max_file_size)
                .map(str::to_string);
        let api_key = match validated {
            Ok(key) => key,
            Err(e) => return self.fail(e),
        };
        let Some(file) = self.file.clone() else {
            return self.fail(SubmitError::MissingFile);
        };

        self.state = SubmissionState::Loading;
        self.view.set_loading(true);

        if self.remember {
            self.save_debounce.cancel();
            let stored = persist(self.store.as_ref(), true, &api_key);
            self.view.set_clear_visible(stored);
        }

        info!("Submitting {} ({} bytes)", file.name, file.size());
        let result = match self.exchange(&api_key, &file).await {
            Ok(ServerReply::Redirect) => {
                info!("Session rejected (401); redirecting to {}", self.config.login_path);
                self.view.navigate(&self.config.login_path);
                return SubmitOutcome::Redirected {
                    to: self.config.login_path.clone(),
                };
            }
            Ok(ServerReply::Document { filename, body }) => self.deliver(&filename, body).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(outcome) => {
                self.state = SubmissionState::Success;
                outcome
            }
            Err(e) => self.fail(e),
        };
        self.view.set_loading(false);
        outcome
    }

    async fn exchange(&self, api_key: &str, file: &UploadedFile) -> Result<ServerReply, SubmitError> {
        let response = self
            .transport
            .submit(api_key, file)
            .await
            .map_err(|e| SubmitError::Transport {
                detail: e.to_string(),
            })?;
        interpret_response(response)
    }

    async fn deliver(&mut self, filename: &str, body: Bytes) -> Result<SubmitOutcome, SubmitError> {
        let artifact = DownloadArtifact::spool(filename, body, self.config.spool_dir.as_deref())
            .await
            .map_err(|e| SubmitError::Download {
                detail: format!("spooling result: {e}"),
            })?;
        let filename = artifact.filename().to_string();

        if self.auto_download {
            let path = artifact
                .save_into(&self.config.output_dir)
                .await
                .map_err(|e| SubmitError::Download {
                    detail: format!("saving {filename}: {e}"),
                })?;
            self.view.show_success(DOWNLOADED_MESSAGE);
            self.track_release(artifact.release_after(self.config.cleanup_delay()));
            Ok(SubmitOutcome::Downloaded { path, filename })
        } else {
            self.view.set_download_visible(Some(&filename));
            self.view.show_success(READY_MESSAGE);
            self.pending_download = Some(artifact);
            Ok(SubmitOutcome::Ready { filename })
        }
    }

    /// Save the held result and release it immediately.
    pub async fn download(&mut self) -> Result<PathBuf, SubmitError> {
        let artifact = self
            .pending_download
            .take()
            .ok_or(SubmitError::NothingToDownload)?;

        let saved = artifact.save_into(&self.config.output_dir).await;
        let filename = artifact.filename().to_string();
        artifact.release();
        self.view.set_download_visible(None);

        saved.map_err(|e| {
            let err = SubmitError::Download {
                detail: format!("saving {filename}: {e}"),
            };
            error!("Download failed: {e}");
            self.view.show_error(&err.user_message());
            err
        })
    }

    fn fail(&mut self, e: SubmitError) -> SubmitOutcome {
        match &e {
            e if e.is_validation() => debug!("Submission invalid: {e}"),
            SubmitError::ServerRejected { status, message } => {
                warn!(status, "Server rejected submission: {message}")
            }
            e => match e.detail() {
                Some(detail) => error!("Submission failed: {detail}"),
                None => debug!("Submission failed: {e}"),
            },
        }
        self.view.show_error(&e.user_message());
        self.state = SubmissionState::Error;
        SubmitOutcome::Failed(e)
    }

    fn track_release(&mut self, handle: JoinHandle<()>) {
        self.releases.retain(|h| !h.is_finished());
        self.releases.push(handle);
    }

    // ── Session ─────────────────────────────────────────────────────────────

    /// End the session and go to the login page, whatever the server says.
    pub async fn logout(&mut self) {
        match self.transport.logout().await {
            Ok(response) => debug!(status = response.status, "Logout acknowledged"),
            Err(e) => error!("Logout error: {e}"),
        }
        self.view.navigate(&self.config.login_path);
    }

    /// Whether the server reports `{"status":"ok"}`.
    pub async fn health(&self) -> Result<bool, TransportError> {
        let response = self.transport.health().await?;
        let ok = response.is_success()
            && serde_json::from_slice::<HealthBody>(&response.body)
                .ok()
                .and_then(|b| b.status)
                .is_some_and(|s| s == "ok");
        Ok(ok)
    }

    /// Wait for deferred work: the debounced credential write and any
    /// scheduled release of a downloaded result.
    pub async fn settle(&mut self) {
        self.save_debounce.settle().await;
        for handle in self.releases.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_a_redirect() {
        let r = interpret_response(EndpointResponse::new(401, r#"{"error":"login"}"#));
        assert_eq!(r, Ok(ServerReply::Redirect));
    }

    #[test]
    fn server_message_is_used_verbatim() {
        let r = interpret_response(EndpointResponse::new(500, r#"{"error":"bad key"}"#));
        assert_eq!(
            r,
            Err(SubmitError::ServerRejected {
                status: 500,
                message: "bad key".into()
            })
        );
    }

    #[test]
    fn fallback_message_for_unusable_bodies() {
        for body in ["", "<html>oops</html>", "[]", r#"{"error":""}"#, r#"{"error":42}"#, r#"{"detail":"x"}"#] {
            assert_eq!(
                server_error_message(500, body.as_bytes()),
                "Server error: 500",
                "body: {body}"
            );
        }
        assert_eq!(server_error_message(413, b""), "Server error: 413");
    }

    #[test]
    fn document_uses_header_filename_or_default() {
        let ok = EndpointResponse::new(200, "PK")
            .with_content_disposition(r#"attachment; filename="report.docx""#);
        match interpret_response(ok).unwrap() {
            ServerReply::Document { filename, body } => {
                assert_eq!(filename, "report.docx");
                assert_eq!(&body[..], b"PK");
            }
            other => panic!("unexpected: {other:?}"),
        }

        match interpret_response(EndpointResponse::new(201, "PK")).unwrap() {
            ServerReply::Document { filename, .. } => {
                assert_eq!(filename, "formatted_resume.docx")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn redirects_are_not_success() {
        let r = interpret_response(EndpointResponse::new(302, ""));
        assert!(matches!(r, Err(SubmitError::ServerRejected { status: 302, .. })));
    }
}
