//! View bindings the controller drives.
//!
//! [`FormView`] is the complete set of UI effects the submission flow has:
//! field contents, the remember toggle, the clear affordance, the drop area,
//! the loading state, messages, the download control, and navigation. The
//! controller owns one implementation, handed to it at construction.
//!
//! [`RecordingView`] keeps the effects as plain state ([`ViewState`]) so the
//! flow can be asserted without any real UI.

use std::sync::{Arc, Mutex};

pub trait FormView {
    fn set_credential(&mut self, value: &str);
    fn set_remember(&mut self, on: bool);
    fn set_clear_visible(&mut self, visible: bool);

    /// Show the selected file's name and mark the drop area populated.
    fn show_file(&mut self, name: &str);

    /// `true`: disable submit and the credential field, suspend the drop
    /// area, show the loading indicator. `false` restores all of it.
    fn set_loading(&mut self, loading: bool);

    /// Show an error; hides any success message and download control.
    fn show_error(&mut self, message: &str);

    /// Show a success message; hides any error.
    fn show_success(&mut self, message: &str);

    /// Hide error, success and the download control.
    fn hide_messages(&mut self);

    /// Reveal or hide the manual download control.
    fn set_download_visible(&mut self, filename: Option<&str>);

    /// Leave the form for another location (e.g. `/login`).
    fn navigate(&mut self, path: &str);
}

/// Snapshot of everything a [`FormView`] has been told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub credential: String,
    pub credential_enabled: bool,
    pub remember: bool,
    pub clear_visible: bool,
    pub file_name: Option<String>,
    pub drop_populated: bool,
    pub drop_enabled: bool,
    pub submit_enabled: bool,
    pub loading_indicator: bool,
    pub error: Option<String>,
    pub success: Option<String>,
    /// Filename offered by the visible download control.
    pub download: Option<String>,
    pub navigated_to: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            credential: String::new(),
            credential_enabled: true,
            remember: false,
            clear_visible: false,
            file_name: None,
            drop_populated: false,
            drop_enabled: true,
            submit_enabled: true,
            loading_indicator: false,
            error: None,
            success: None,
            download: None,
            navigated_to: None,
        }
    }
}

/// In-memory [`FormView`]. Clones share state, so a test can keep a handle
/// after moving one into the controller.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    state: Arc<Mutex<ViewState>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ViewState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FormView for RecordingView {
    fn set_credential(&mut self, value: &str) {
        self.lock().credential = value.to_string();
    }

    fn set_remember(&mut self, on: bool) {
        self.lock().remember = on;
    }

    fn set_clear_visible(&mut self, visible: bool) {
        self.lock().clear_visible = visible;
    }

    fn show_file(&mut self, name: &str) {
        let mut s = self.lock();
        s.file_name = Some(name.to_string());
        s.drop_populated = true;
    }

    fn set_loading(&mut self, loading: bool) {
        let mut s = self.lock();
        s.submit_enabled = !loading;
        s.credential_enabled = !loading;
        s.drop_enabled = !loading;
        s.loading_indicator = loading;
    }

    fn show_error(&mut self, message: &str) {
        let mut s = self.lock();
        s.error = Some(message.to_string());
        s.success = None;
        s.download = None;
    }

    fn show_success(&mut self, message: &str) {
        let mut s = self.lock();
        s.success = Some(message.to_string());
        s.error = None;
    }

    fn hide_messages(&mut self) {
        let mut s = self.lock();
        s.error = None;
        s.success = None;
        s.download = None;
    }

    fn set_download_visible(&mut self, filename: Option<&str>) {
        self.lock().download = filename.map(str::to_string);
    }

    fn navigate(&mut self, path: &str) {
        self.lock().navigated_to = Some(path.to_string());
    }
}
