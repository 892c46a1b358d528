use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JSON body extractor that separates an unreadable body (422) from a body
/// that is readable but not valid JSON for `T` (400).
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        RawBody::from_request(req, state)
            .await?
            .decode()
            .map(JsonBody)
    }
}

/// The request body, read but not yet decoded. Handlers that must check
/// ownership first take this and call [`RawBody::decode`] afterwards.
#[derive(Debug, Clone)]
pub struct RawBody(pub Bytes);

impl RawBody {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.0)
            .map_err(|err| ApiError::validation(format!("Invalid JSON body: {}", err)))
    }
}

#[async_trait]
impl<S> FromRequest<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Bytes::from_request(req, state)
            .await
            .map(RawBody)
            .map_err(|err| {
                tracing::debug!("Unreadable request body: {}", err.body_text());
                ApiError::unprocessable_entity("Request body could not be read")
            })
    }
}

/// Parse a path identifier; only positive integers are accepted.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation(format!("Invalid {} id: {}", what, raw))),
    }
}
