//! Paper relay - the HTTP relay between the paper review UI and its backend
//!
//! The relay serves the browser UI and exposes three JSON/multipart routes (search, review from
//! an uploaded PDF, review from a PDF URL). Each route validates its input, issues exactly one
//! call to the backend and relays the backend's answer, or a normalized error, to the browser.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use bon::Builder;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

pub mod backend;
pub mod client;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;

use backend::Backend;
use client::{HttpClient, PoolConfig};
use handlers::{generate_review, generate_review_url, search, serve_ui};

/// Room left for multipart framing on top of the file size ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Immutable relay configuration, fixed at startup.
#[derive(Debug, Clone, Builder)]
pub struct RelaySettings {
    pub backend_url: Url,
    #[builder(default = PathBuf::from("views/ui.html"))]
    pub ui_path: PathBuf,
    #[builder(default = Duration::from_secs(45))]
    pub search_timeout: Duration,
    #[builder(default = Duration::from_secs(180))]
    pub review_timeout: Duration,
    #[builder(default = 50 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

/// The main application state containing the HTTP client and relay configuration
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub backend: Backend,
    pub settings: Arc<RelaySettings>,
}

impl AppState<reqwest::Client> {
    /// Create a new AppState with a pooled reqwest client
    pub fn new(settings: RelaySettings, pool: PoolConfig) -> Result<Self, reqwest::Error> {
        let http_client = client::create_reqwest_client(pool)?;
        let backend = Self::backend(&settings, http_client.clone());
        Ok(Self::assemble(settings, http_client, backend))
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing). Requests are still
    /// assembled by a default reqwest client, then handed to `http_client`.
    pub fn with_client(settings: RelaySettings, http_client: T) -> Self {
        let backend = Self::backend(&settings, reqwest::Client::new());
        Self::assemble(settings, http_client, backend)
    }

    fn backend(settings: &RelaySettings, requests: reqwest::Client) -> Backend {
        Backend::new(
            settings.backend_url.clone(),
            settings.search_timeout,
            settings.review_timeout,
            requests,
        )
    }

    fn assemble(settings: RelaySettings, http_client: T, backend: Backend) -> Self {
        Self {
            http_client,
            backend,
            settings: Arc::new(settings),
        }
    }
}

/// Build the main router for the relay
/// This creates routes for:
/// - `/` - The browser UI
/// - `/search` - Paper search
/// - `/generate-review` - Review generation from an uploaded PDF
/// - `/generate-review-url` - Review generation from a PDF URL
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    let upload_limit = state
        .settings
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route("/", get(serve_ui))
        .route("/search", post(search))
        .route(
            "/generate-review",
            post(generate_review).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/generate-review-url", post(generate_review_url))
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// # Parameters
/// - `prefix`: A string prefix for the metrics. Accepts borrowed or owned strings; the metrics
///   layer keeps it for the lifetime of the program.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
