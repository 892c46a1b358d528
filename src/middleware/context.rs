use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::database::Repositories;
use crate::error::ApiError;
use crate::state::AppState;

/// Binds one [`Repositories`] to the request. The binding lives in the request
/// extensions, so the store handle is released when the request is dropped:
/// after the response is produced, on an error return, or when a timeout
/// cancels the request future.
pub async fn inject_repositories(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let repositories = state.repositories.acquire().await.map_err(|err| {
        tracing::error!(
            "Failed to acquire data access for {} {}: {}",
            request.method(),
            request.uri().path(),
            err
        );
        ApiError::from(err)
    })?;

    tracing::debug!(
        "Bound repositories to {} {}",
        request.method(),
        request.uri().path()
    );
    request.extensions_mut().insert(repositories);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Repositories
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Repositories>().cloned().ok_or_else(|| {
            tracing::error!(
                "No repositories bound to {} {}",
                parts.method,
                parts.uri.path()
            );
            ApiError::infrastructure("Data access is not available for this request")
        })
    }
}
