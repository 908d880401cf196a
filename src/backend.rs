//! Forwarding calls to the search/review backend
//!
//! Each inbound request results in at most one call to the backend. The call is bounded by the
//! endpoint's timeout and its result is classified into a [`ForwardOutcome`], which the handlers
//! translate into a client response with a single match.
use crate::client::{HttpClient, TransportError};
use crate::models::PDF_FIELD;
use axum::body::Bytes;
use axum::http::StatusCode;
use reqwest::multipart;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// The backend endpoints the relay forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEndpoint {
    Search,
    ProcessFile,
    ProcessUrl,
}

impl BackendEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            BackendEndpoint::Search => "/search",
            BackendEndpoint::ProcessFile => "/process-and-generate",
            BackendEndpoint::ProcessUrl => "/process-url-and-generate",
        }
    }

    pub fn service(self) -> BackendService {
        match self {
            BackendEndpoint::Search => BackendService::Search,
            BackendEndpoint::ProcessFile | BackendEndpoint::ProcessUrl => {
                BackendService::Processing
            }
        }
    }
}

/// Which backend service an endpoint belongs to; this only affects the wording of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendService {
    Search,
    Processing,
}

impl BackendService {
    pub fn error_response_message(self, status: StatusCode) -> String {
        match self {
            BackendService::Search => format!("Search service error ({})", status.as_u16()),
            BackendService::Processing => {
                format!("Review generation error ({})", status.as_u16())
            }
        }
    }

    pub fn unreachable_message(self) -> &'static str {
        match self {
            BackendService::Search => "Could not connect to the search service.",
            BackendService::Processing => "Could not connect to the backend processing service.",
        }
    }

    pub fn timeout_message(self) -> &'static str {
        match self {
            BackendService::Search => "The request to the search service timed out.",
            BackendService::Processing => {
                "The request to the backend processing service timed out."
            }
        }
    }

    pub fn internal_message(self) -> &'static str {
        match self {
            BackendService::Search => "An internal server error occurred.",
            BackendService::Processing => {
                "An internal server error occurred while communicating with the backend service."
            }
        }
    }
}

/// What gets sent to the backend.
#[derive(Debug, Clone)]
pub enum ForwardBody {
    Json(serde_json::Value),
    File {
        file_name: String,
        content_type: String,
        data: Bytes,
    },
}

impl ForwardBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(ForwardBody::Json)
    }
}

/// The classified result of a forwarding call.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// The backend answered with a 2xx status.
    Success { status: StatusCode, body: Bytes },
    /// The backend answered with any other status.
    ErrorResponse { status: StatusCode, body: Bytes },
    /// No response was received.
    Unreachable(TransportError),
    /// The call did not complete within the endpoint's timeout.
    TimedOut(Duration),
    /// The call could not be issued.
    Internal(String),
}

impl ForwardOutcome {
    /// The `error` message supplied by the backend, when its body carries a non-empty one.
    pub fn backend_error_message(body: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        match value.get("error")? {
            serde_json::Value::String(message) if !message.is_empty() => Some(message.clone()),
            _ => None,
        }
    }
}

/// Handle on the configured backend: its base URL, the per-service timeouts, and the reqwest
/// client used to assemble outgoing requests. Assembling and executing are kept apart so any
/// [`HttpClient`] can execute what reqwest builds.
#[derive(Debug, Clone)]
pub struct Backend {
    base_url: Url,
    search_timeout: Duration,
    review_timeout: Duration,
    requests: reqwest::Client,
}

impl Backend {
    pub fn new(
        base_url: Url,
        search_timeout: Duration,
        review_timeout: Duration,
        requests: reqwest::Client,
    ) -> Self {
        Self {
            base_url,
            search_timeout,
            review_timeout,
            requests,
        }
    }

    pub fn timeout(&self, endpoint: BackendEndpoint) -> Duration {
        match endpoint.service() {
            BackendService::Search => self.search_timeout,
            BackendService::Processing => self.review_timeout,
        }
    }

    /// The backend URL for an endpoint: the base URL with the endpoint path appended, plus an
    /// optional query string.
    pub fn target_url(&self, endpoint: BackendEndpoint, query: Option<&str>) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        match query {
            Some(query) => format!("{base}{}?{query}", endpoint.path()),
            None => format!("{base}{}", endpoint.path()),
        }
    }

    /// Issues one POST to `endpoint` and classifies what happened.
    pub async fn forward<T: HttpClient>(
        &self,
        client: &T,
        endpoint: BackendEndpoint,
        query: Option<&str>,
        body: ForwardBody,
    ) -> ForwardOutcome {
        let target = self.target_url(endpoint, query);
        let req = match self.build_request(&target, body) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to build request for {}: {}", target, e);
                return ForwardOutcome::Internal(e.to_string());
            }
        };

        let timeout = self.timeout(endpoint);
        info!("Forwarding to backend: {}", target);

        let call = async {
            let response = client.request(req).await?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| Box::new(e) as TransportError)?;
            Ok::<_, TransportError>((status, body))
        };

        match tokio::time::timeout(timeout, call).await {
            Err(_) => {
                error!("Request to {} timed out after {:?}", target, timeout);
                ForwardOutcome::TimedOut(timeout)
            }
            Ok(Err(e)) => {
                error!("No response received from {}: {}", target, e);
                ForwardOutcome::Unreachable(e)
            }
            Ok(Ok((status, body))) if status.is_success() => {
                info!("Backend response status: {}", status);
                ForwardOutcome::Success { status, body }
            }
            Ok(Ok((status, body))) => {
                error!("Backend error status from {}: {}", target, status);
                debug!("Backend error body: {}", String::from_utf8_lossy(&body));
                ForwardOutcome::ErrorResponse { status, body }
            }
        }
    }

    fn build_request(
        &self,
        target: &str,
        body: ForwardBody,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let builder = self.requests.post(target);
        let builder = match body {
            ForwardBody::Json(value) => builder.json(&value),
            ForwardBody::File {
                file_name,
                content_type,
                data,
            } => {
                let length = data.len() as u64;
                let part = multipart::Part::stream_with_length(reqwest::Body::from(data), length)
                    .file_name(file_name)
                    .mime_str(&content_type)?;
                builder.multipart(multipart::Form::new().part(PDF_FIELD, part))
            }
        };
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockHttpClient;
    use serde_json::json;

    fn backend(base: &str) -> Backend {
        Backend::new(
            base.parse().unwrap(),
            Duration::from_millis(200),
            Duration::from_millis(400),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn target_url_appends_endpoint_path() {
        let backend = backend("http://localhost:5000");
        assert_eq!(
            backend.target_url(BackendEndpoint::Search, None),
            "http://localhost:5000/search"
        );
        assert_eq!(
            backend.target_url(BackendEndpoint::Search, Some("require_pdf=true")),
            "http://localhost:5000/search?require_pdf=true"
        );
        assert_eq!(
            backend.target_url(BackendEndpoint::ProcessFile, None),
            "http://localhost:5000/process-and-generate"
        );
    }

    #[test]
    fn target_url_keeps_base_path() {
        let backend = backend("http://backend.internal/api/");
        assert_eq!(
            backend.target_url(BackendEndpoint::ProcessUrl, None),
            "http://backend.internal/api/process-url-and-generate"
        );
    }

    #[test]
    fn timeouts_follow_the_service() {
        let backend = backend("http://localhost:5000");
        assert_eq!(
            backend.timeout(BackendEndpoint::Search),
            Duration::from_millis(200)
        );
        assert_eq!(
            backend.timeout(BackendEndpoint::ProcessFile),
            Duration::from_millis(400)
        );
        assert_eq!(
            backend.timeout(BackendEndpoint::ProcessUrl),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn backend_error_message_requires_non_empty_string() {
        assert_eq!(
            ForwardOutcome::backend_error_message(br#"{"error": "Too many papers"}"#),
            Some("Too many papers".to_string())
        );
        assert_eq!(ForwardOutcome::backend_error_message(br#"{"error": ""}"#), None);
        assert_eq!(ForwardOutcome::backend_error_message(br#"{"detail": "x"}"#), None);
        assert_eq!(ForwardOutcome::backend_error_message(b"<html>oops</html>"), None);
    }

    #[tokio::test]
    async fn classifies_success() {
        let client = MockHttpClient::new(StatusCode::CREATED, r#"{"papers": []}"#);
        let outcome = backend("http://localhost:5000")
            .forward(
                &client,
                BackendEndpoint::Search,
                None,
                ForwardBody::Json(json!({"query": "q", "limit": 15})),
            )
            .await;
        match outcome {
            ForwardOutcome::Success { status, body } => {
                assert_eq!(status, StatusCode::CREATED);
                assert_eq!(&body[..], br#"{"papers": []}"#);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn classifies_error_response() {
        let client = MockHttpClient::new(StatusCode::UNPROCESSABLE_ENTITY, r#"{"error": "bad"}"#);
        let outcome = backend("http://localhost:5000")
            .forward(&client, BackendEndpoint::ProcessUrl, None, ForwardBody::Json(json!({})))
            .await;
        assert!(matches!(
            outcome,
            ForwardOutcome::ErrorResponse { status, .. } if status == StatusCode::UNPROCESSABLE_ENTITY
        ));
    }

    #[tokio::test]
    async fn classifies_unreachable() {
        let client = MockHttpClient::unreachable();
        let outcome = backend("http://localhost:5000")
            .forward(&client, BackendEndpoint::Search, None, ForwardBody::Json(json!({})))
            .await;
        assert!(matches!(outcome, ForwardOutcome::Unreachable(_)));
    }

    #[tokio::test]
    async fn classifies_timeout() {
        let client = MockHttpClient::delayed(Duration::from_secs(5), StatusCode::OK, "{}");
        let outcome = backend("http://localhost:5000")
            .forward(&client, BackendEndpoint::Search, None, ForwardBody::Json(json!({})))
            .await;
        assert!(matches!(
            outcome,
            ForwardOutcome::TimedOut(timeout) if timeout == Duration::from_millis(200)
        ));
    }

    #[tokio::test]
    async fn file_bodies_are_sent_as_multipart() {
        let client = MockHttpClient::new(StatusCode::OK, "{}");
        backend("http://localhost:5000")
            .forward(
                &client,
                BackendEndpoint::ProcessFile,
                None,
                ForwardBody::File {
                    file_name: "paper.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    data: Bytes::from_static(b"%PDF-1.7"),
                },
            )
            .await;

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.uri, "http://localhost:5000/process-and-generate");
        assert!(
            request
                .header("content-type")
                .is_some_and(|ct| ct.starts_with("multipart/form-data; boundary="))
        );
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains("name=\"pdfFile\"; filename=\"paper.pdf\""));
        assert!(body.contains("Content-Type: application/pdf"));
        assert!(body.contains("%PDF-1.7"));
    }
}
