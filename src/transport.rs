//! HTTP seam between the controller and the server.
//!
//! The controller talks to the processing, logout and health endpoints only
//! through the [`Transport`] trait, so its whole state machine can be
//! exercised with [`MockTransport`] and no network.
//!
//! A transport reports *any* HTTP status as `Ok`; interpreting 401 / non-2xx
//! is the controller's job. `Err` means no response was obtained at all.

use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::upload::UploadedFile;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::multipart::{Form, Part};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
    /// Raw `content-disposition` header, if present and valid UTF-8.
    pub content_disposition: Option<String>,
    pub body: Bytes,
}

impl EndpointResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_disposition: None,
            body: body.into(),
        }
    }

    pub fn with_content_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Requests the client makes against the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST` the multipart form `api_key` + `pdf_file` to the processing
    /// endpoint, with session credentials.
    async fn submit(
        &self,
        api_key: &str,
        file: &UploadedFile,
    ) -> Result<EndpointResponse, TransportError>;

    /// `POST` to the logout endpoint, with session credentials.
    async fn logout(&self) -> Result<EndpointResponse, TransportError>;

    /// `GET` the health endpoint.
    async fn health(&self) -> Result<EndpointResponse, TransportError>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production transport using reqwest with a cookie jar.
///
/// The jar plays the role of the browser's cookie store: cookies set by the
/// server (and the optional seeded session cookie) ride along on every
/// request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    process_url: String,
    logout_url: String,
    health_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let jar = Arc::new(Jar::default());
        if let Some(ref cookie) = config.session_cookie {
            let origin = reqwest::Url::parse(&config.base_url)
                .map_err(|e| ClientError::InvalidConfig(format!("base URL: {e}")))?;
            jar.add_cookie_str(cookie, &origin);
        }

        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(concat!("cvfmt/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            process_url: config.process_url(),
            logout_url: config.logout_url(),
            health_url: config.health_url(),
        })
    }

    async fn read(url: &str, response: reqwest::Response) -> Result<EndpointResponse, TransportError> {
        let status = response.status().as_u16();
        let content_disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url = %url, status, body_len = body.len(), "Response received");
        Ok(EndpointResponse {
            status,
            content_disposition,
            body,
        })
    }

    fn send_error(url: &str, e: reqwest::Error) -> TransportError {
        TransportError::Send {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, api_key, file), fields(file = %file.name, size = file.bytes.len()))]
    async fn submit(
        &self,
        api_key: &str,
        file: &UploadedFile,
    ) -> Result<EndpointResponse, TransportError> {
        let part = file_part(file)?;
        let form = Form::new()
            .text("api_key", api_key.to_string())
            .part("pdf_file", part);

        info!("Uploading {} to {}", file.name, self.process_url);
        let response = self
            .client
            .post(&self.process_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::send_error(&self.process_url, e))?;

        Self::read(&self.process_url, response).await
    }

    async fn logout(&self) -> Result<EndpointResponse, TransportError> {
        let response = self
            .client
            .post(&self.logout_url)
            .send()
            .await
            .map_err(|e| Self::send_error(&self.logout_url, e))?;
        Self::read(&self.logout_url, response).await
    }

    async fn health(&self) -> Result<EndpointResponse, TransportError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| Self::send_error(&self.health_url, e))?;
        Self::read(&self.health_url, response).await
    }
}

/// Sent when the declared media type is empty or unparseable.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// The `pdf_file` part. Browsers declare `""` for types they do not know, and
/// such a file may still pass validation by its `.pdf` suffix, so an unusable
/// declared type is replaced instead of failing the request.
fn file_part(file: &UploadedFile) -> Result<Part, TransportError> {
    let part = || Part::stream(reqwest::Body::from(file.bytes.clone())).file_name(file.name.clone());
    match part().mime_str(&file.media_type) {
        Ok(part) => Ok(part),
        Err(e) => {
            debug!(
                media_type = %file.media_type,
                "Unusable media type ({e}), sending as {FALLBACK_MEDIA_TYPE}"
            );
            part()
                .mime_str(FALLBACK_MEDIA_TYPE)
                .map_err(|e| TransportError::Build(e.to_string()))
        }
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// One request observed by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Submit {
        api_key: String,
        file_name: String,
        media_type: String,
        size: usize,
    },
    Logout,
    Health,
}

type Scripted = Result<EndpointResponse, TransportError>;

#[derive(Default)]
struct MockState {
    submit: VecDeque<Scripted>,
    logout: VecDeque<Scripted>,
    health: VecDeque<Scripted>,
    calls: Vec<MockCall>,
}

/// Scripted transport for tests.
///
/// Responses are queued per endpoint and consumed in order; an empty queue
/// answers with a [`TransportError::Send`]. Clones share state, so a test
/// can keep a handle after moving one into the controller.
///
/// # Example
/// ```rust
/// use cv_formatter_client::transport::{EndpointResponse, MockTransport};
///
/// let mock = MockTransport::new();
/// mock.push_submit(Ok(EndpointResponse::new(500, r#"{"error":"bad key"}"#)));
/// assert_eq!(mock.submit_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(&self, response: Scripted) {
        self.lock().submit.push_back(response);
    }

    pub fn push_logout(&self, response: Scripted) {
        self.lock().logout.push_back(response);
    }

    pub fn push_health(&self, response: Scripted) {
        self.lock().health.push_back(response);
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Submit { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next(queue: &mut VecDeque<Scripted>, endpoint: &str) -> Scripted {
        queue.pop_front().unwrap_or_else(|| {
            Err(TransportError::Send {
                url: format!("mock://{endpoint}"),
                reason: "no mock response queued".to_string(),
            })
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(
        &self,
        api_key: &str,
        file: &UploadedFile,
    ) -> Result<EndpointResponse, TransportError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Submit {
            api_key: api_key.to_string(),
            file_name: file.name.clone(),
            media_type: file.media_type.clone(),
            size: file.bytes.len(),
        });
        Self::next(&mut state.submit, "process")
    }

    async fn logout(&self) -> Result<EndpointResponse, TransportError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Logout);
        Self::next(&mut state.logout, "logout")
    }

    async fn health(&self) -> Result<EndpointResponse, TransportError> {
        let mut state = self.lock();
        state.calls.push(MockCall::Health);
        Self::next(&mut state.health, "health")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(EndpointResponse::new(200, "").is_success());
        assert!(EndpointResponse::new(204, "").is_success());
        assert!(!EndpointResponse::new(301, "").is_success());
        assert!(!EndpointResponse::new(401, "").is_success());
        assert!(!EndpointResponse::new(199, "").is_success());
    }

    #[tokio::test]
    async fn mock_replays_in_order_then_errors() {
        let mock = MockTransport::new();
        mock.push_health(Ok(EndpointResponse::new(200, "a")));
        mock.push_health(Ok(EndpointResponse::new(503, "b")));

        assert_eq!(mock.health().await.unwrap().status, 200);
        assert_eq!(mock.health().await.unwrap().status, 503);
        assert!(matches!(
            mock.health().await,
            Err(TransportError::Send { .. })
        ));
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn mock_records_submissions() {
        let mock = MockTransport::new();
        let handle = mock.clone();
        let file = UploadedFile::new("cv.pdf", "application/pdf", vec![1, 2, 3]);
        let _ = mock.submit("sk-1", &file).await;

        assert_eq!(handle.submit_count(), 1);
        assert_eq!(
            handle.calls()[0],
            MockCall::Submit {
                api_key: "sk-1".into(),
                file_name: "cv.pdf".into(),
                media_type: "application/pdf".into(),
                size: 3,
            }
        );
    }

    #[test]
    fn file_part_tolerates_unusable_media_types() {
        for media_type in ["application/pdf", "", "not a mime", "application/"] {
            let file = UploadedFile::new("resume.pdf", media_type, b"%PDF".to_vec());
            assert!(file_part(&file).is_ok(), "media type {media_type:?}");
        }
    }

    #[test]
    fn reqwest_transport_builds_with_session_cookie() {
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9")
            .session_cookie("session=abc")
            .request_timeout_secs(5)
            .build()
            .unwrap();
        let t = ReqwestTransport::new(&config).unwrap();
        assert_eq!(t.process_url, "http://127.0.0.1:9/api/process");
    }
}
