//! Configuration for the cv-formatter client.
//!
//! Every knob the controller and transport read lives in [`ClientConfig`],
//! built via [`ClientConfigBuilder`]. Callers set what they care about and
//! rely on documented defaults for the rest.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Upload size limit enforced before submission: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Key under which the remembered credential is stored.
pub const API_KEY_STORAGE_KEY: &str = "cv_formatter_api_key";

/// Configuration for a [`crate::controller::SubmissionController`] and its
/// transport.
///
/// # Example
/// ```rust
/// use cv_formatter_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://cv.example.com")
///     .auto_download(false)
///     .output_dir("out")
///     .build()
///     .unwrap();
/// assert_eq!(config.process_url(), "https://cv.example.com/api/process");
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server origin, without a trailing slash. Default: `http://localhost:5000`.
    pub base_url: String,

    /// Resume processing endpoint. Default: `/api/process`.
    pub process_path: String,

    /// Session termination endpoint. Default: `/api/auth/logout`.
    pub logout_path: String,

    /// Where a 401 or a logout sends the user. Default: `/login`.
    pub login_path: String,

    /// Liveness probe. Default: `/health`.
    pub health_path: String,

    /// Save the result as soon as it arrives. Default: true.
    ///
    /// When false the result is held until
    /// [`crate::controller::SubmissionController::download`] is called.
    pub auto_download: bool,

    /// Directory results are saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// Upload size limit in bytes. Default: [`MAX_FILE_SIZE`].
    pub max_file_size: u64,

    /// Quiet period before a typed credential is persisted. Default: 500.
    pub debounce_ms: u64,

    /// Delay between an auto-download and releasing the spooled result.
    /// Default: 100.
    pub cleanup_delay_ms: u64,

    /// Where results are spooled before they are saved. Default: None (the
    /// system temp directory).
    pub spool_dir: Option<PathBuf>,

    /// Whole-request timeout. Default: None (platform behaviour).
    pub request_timeout_secs: Option<u64>,

    /// Session cookie (`name=value`) sent with every request. Default: None.
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            process_path: "/api/process".to_string(),
            logout_path: "/api/auth/logout".to_string(),
            login_path: "/login".to_string(),
            health_path: "/health".to_string(),
            auto_download: true,
            output_dir: PathBuf::from("."),
            max_file_size: MAX_FILE_SIZE,
            debounce_ms: 500,
            cleanup_delay_ms: 100,
            spool_dir: None,
            request_timeout_secs: None,
            session_cookie: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("process_path", &self.process_path)
            .field("logout_path", &self.logout_path)
            .field("login_path", &self.login_path)
            .field("health_path", &self.health_path)
            .field("auto_download", &self.auto_download)
            .field("output_dir", &self.output_dir)
            .field("max_file_size", &self.max_file_size)
            .field("debounce_ms", &self.debounce_ms)
            .field("cleanup_delay_ms", &self.cleanup_delay_ms)
            .field("spool_dir", &self.spool_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn process_url(&self) -> String {
        self.url(&self.process_path)
    }

    pub fn logout_url(&self) -> String {
        self.url(&self.logout_path)
    }

    pub fn health_url(&self) -> String {
        self.url(&self.health_path)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn process_path(mut self, path: impl Into<String>) -> Self {
        self.config.process_path = path.into();
        self
    }

    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.config.logout_path = path.into();
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.config.login_path = path.into();
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    pub fn auto_download(mut self, v: bool) -> Self {
        self.config.auto_download = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    pub fn cleanup_delay_ms(mut self, ms: u64) -> Self {
        self.config.cleanup_delay_ms = ms;
        self
    }

    pub fn spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.spool_dir = Some(dir.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.config.session_cookie = Some(cookie.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            ClientError::InvalidConfig(format!("base URL '{}' is invalid: {e}", c.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        for path in [&c.process_path, &c.logout_path, &c.login_path, &c.health_path] {
            if !path.starts_with('/') {
                return Err(ClientError::InvalidConfig(format!(
                    "endpoint path '{path}' must start with '/'"
                )));
            }
        }
        if c.max_file_size == 0 {
            return Err(ClientError::InvalidConfig(
                "Max file size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.max_file_size, 10_485_760);
        assert_eq!(c.debounce(), Duration::from_millis(500));
        assert_eq!(c.cleanup_delay(), Duration::from_millis(100));
        assert!(c.auto_download);
        assert!(c.request_timeout_secs.is_none());
        assert!(c.spool_dir.is_none());
        assert_eq!(c.process_url(), "http://localhost:5000/api/process");
        assert_eq!(c.logout_url(), "http://localhost:5000/api/auth/logout");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = ClientConfig::builder()
            .base_url("https://cv.example.com/")
            .build()
            .unwrap();
        assert_eq!(c.health_url(), "https://cv.example.com/health");
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = ClientConfig::builder().base_url("not a url").build().unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));

        let err = ClientConfig::builder()
            .base_url("ftp://cv.example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn rejects_relative_paths_and_zero_limit() {
        assert!(ClientConfig::builder().process_path("api/process").build().is_err());
        assert!(ClientConfig::builder().max_file_size(0).build().is_err());
    }

    #[test]
    fn debug_redacts_session_cookie() {
        let c = ClientConfig::builder()
            .session_cookie("session=abc123")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("abc123"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
