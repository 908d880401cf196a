/// Axum handlers for the relay
use crate::AppState;
use crate::backend::{BackendEndpoint, BackendService, ForwardBody};
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::extract::JsonBody;
use crate::models::{
    ForwardedReviewUrl, ForwardedSearch, PDF_FIELD, PDF_MEDIA_TYPE, ReviewUrlRequest,
    SearchRequest, UploadedPdf, is_truthy, limit_in_range, resolve_limit,
};
use axum::{
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{Html, Response},
};
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;

const NO_FILE_MESSAGE: &str = "No PDF file uploaded.";
const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// Serves the browser UI from the configured path.
#[instrument(skip(state))]
pub async fn serve_ui<T: HttpClient>(
    State(state): State<AppState<T>>,
) -> Result<Html<Vec<u8>>, RelayError> {
    let ui_path = &state.settings.ui_path;
    info!("Serving UI");
    match tokio::fs::read(ui_path).await {
        Ok(contents) => Ok(Html(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("UI file not found at {}", ui_path.display());
            Err(RelayError::UiNotFound)
        }
        Err(e) => {
            error!("Failed to read UI file {}: {}", ui_path.display(), e);
            Err(RelayError::Internal("An internal server error occurred."))
        }
    }
}

/// Validates a search and forwards it to the backend's `/search`.
#[instrument(skip(state, request))]
pub async fn search<T: HttpClient>(
    State(state): State<AppState<T>>,
    JsonBody(request): JsonBody<SearchRequest>,
) -> Result<Response, RelayError> {
    info!(
        "Received query: {}, limit: {}, requirePdf: {}",
        request.query, request.limit, request.require_pdf
    );

    if !is_truthy(&request.query) {
        info!("Rejecting search: query missing");
        return Err(RelayError::BadRequest(
            "Query parameter is required.".to_string(),
        ));
    }

    let limit = resolve_limit(&request.limit);
    if !limit_in_range(limit) {
        info!("Rejecting search: invalid limit {}", request.limit);
        return Err(RelayError::BadRequest(
            "Limit must be between 1 and 100.".to_string(),
        ));
    }

    let query_string = if request.requires_pdf() {
        debug!("Appending require_pdf=true");
        Some("require_pdf=true")
    } else {
        None
    };

    let endpoint = BackendEndpoint::Search;
    let body = forward_json(
        &ForwardedSearch {
            query: request.query,
            limit,
        },
        endpoint.service(),
    )?;

    let outcome = state
        .backend
        .forward(&state.http_client, endpoint, query_string, body)
        .await;
    RelayError::from_outcome(outcome, endpoint.service())
}

/// Accepts a PDF upload and forwards it to the backend's `/process-and-generate`.
#[instrument(skip(state, multipart))]
pub async fn generate_review<T: HttpClient>(
    State(state): State<AppState<T>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RelayError> {
    info!("Received review upload");

    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            info!("Rejecting upload: {}", rejection.body_text());
            return Err(RelayError::BadRequest(NO_FILE_MESSAGE.to_string()));
        }
    };

    let Some(pdf) = read_pdf(multipart, state.settings.max_upload_bytes).await? else {
        info!("Rejecting upload: no file uploaded");
        return Err(RelayError::BadRequest(NO_FILE_MESSAGE.to_string()));
    };

    if pdf.content_type != PDF_MEDIA_TYPE {
        info!("Rejecting upload: not a PDF ({})", pdf.content_type);
        return Err(RelayError::BadRequest(format!(
            "Invalid file type: {}. Please upload a PDF.",
            pdf.content_type
        )));
    }

    info!(
        "Received file: {}, size: {} bytes",
        pdf.file_name,
        pdf.data.len()
    );

    let endpoint = BackendEndpoint::ProcessFile;
    let body = ForwardBody::File {
        file_name: pdf.file_name,
        content_type: pdf.content_type,
        data: pdf.data,
    };
    let outcome = state
        .backend
        .forward(&state.http_client, endpoint, None, body)
        .await;
    RelayError::from_outcome(outcome, endpoint.service())
}

/// Validates a PDF URL and forwards it to the backend's `/process-url-and-generate`.
#[instrument(skip(state, request))]
pub async fn generate_review_url<T: HttpClient>(
    State(state): State<AppState<T>>,
    JsonBody(request): JsonBody<ReviewUrlRequest>,
) -> Result<Response, RelayError> {
    info!("Received review URL request");

    let pdf_url = match &request.pdf_url {
        Value::String(url) if !url.is_empty() => url.as_str(),
        _ => {
            info!("Rejecting review URL: missing or invalid pdfUrl");
            return Err(RelayError::BadRequest(
                "Missing or invalid pdfUrl in request body.".to_string(),
            ));
        }
    };

    if let Err(e) = Url::parse(pdf_url) {
        info!("Rejecting review URL: invalid URL format {} ({})", pdf_url, e);
        return Err(RelayError::BadRequest(
            "Invalid URL format provided.".to_string(),
        ));
    }

    info!("Received URL: {}", pdf_url);

    let endpoint = BackendEndpoint::ProcessUrl;
    let body = forward_json(&ForwardedReviewUrl { pdf_url }, endpoint.service())?;
    let outcome = state
        .backend
        .forward(&state.http_client, endpoint, None, body)
        .await;
    RelayError::from_outcome(outcome, endpoint.service())
}

fn forward_json<B: serde::Serialize>(
    body: &B,
    service: BackendService,
) -> Result<ForwardBody, RelayError> {
    ForwardBody::json(body).map_err(|e| {
        error!("Failed to serialize forwarded body: {}", e);
        RelayError::Internal(service.internal_message())
    })
}

/// Reads the `pdfFile` part into memory. Parts under other names, and parts without a file name,
/// are skipped.
async fn read_pdf(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<Option<UploadedPdf>, RelayError> {
    while let Some(mut field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(PDF_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            debug!("Skipping {} field without a file name", PDF_FIELD);
            continue;
        };
        let content_type = media_type_essence(field.content_type().unwrap_or(FALLBACK_CONTENT_TYPE));

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(upload_error)? {
            if data.len() + chunk.len() > max_bytes {
                error!("Upload {} exceeds {} bytes", file_name, max_bytes);
                return Err(RelayError::Upload {
                    status: StatusCode::PAYLOAD_TOO_LARGE,
                    message: format!("File too large. The limit is {max_bytes} bytes."),
                });
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(Some(UploadedPdf {
            file_name,
            content_type,
            data: data.into(),
        }));
    }
    Ok(None)
}

/// The `type/subtype` of a media type, lowercased and without parameters.
fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn upload_error(e: MultipartError) -> RelayError {
    error!("Failed to read upload: {}", e);
    RelayError::Upload {
        status: e.status(),
        message: e.body_text(),
    }
}
