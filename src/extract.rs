//! Request extractors shared by the JSON routes
use crate::errors::RelayError;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use tracing::info;

/// A JSON body that reads as `B::default()` when the request carries no JSON content type or an
/// empty body. Bodies that do carry JSON must parse, otherwise the request is rejected with 400.
pub struct JsonBody<B>(pub B);

impl<B, S> FromRequest<S> for JsonBody<B>
where
    B: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = RelayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let bytes = Bytes::from_request(Request::from_parts(parts.clone(), body), state)
            .await
            .map_err(|rejection| {
                info!("Rejecting unreadable body: {}", rejection.body_text());
                RelayError::Rejected {
                    status: rejection.status(),
                    message: rejection.body_text(),
                }
            })?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(B::default()));
        }

        match Json::<B>::from_request(Request::from_parts(parts, Body::from(bytes)), state).await {
            Ok(Json(body)) => Ok(JsonBody(body)),
            Err(JsonRejection::MissingJsonContentType(_)) => Ok(JsonBody(B::default())),
            Err(rejection) => {
                info!("Rejecting malformed JSON body: {}", rejection.body_text());
                Err(RelayError::BadRequest(rejection.body_text()))
            }
        }
    }
}
