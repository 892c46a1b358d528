// handlers/public/login.rs - POST /login
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{LoginInput, UserId};
use crate::database::{Repositories, RepositoryError};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Exchange e-mail and password for an identity token.
///
/// An unknown e-mail and a wrong password produce the same 401 so the
/// endpoint cannot be used to probe which accounts exist.
pub async fn post(
    State(state): State<AppState>,
    repositories: Repositories,
    JsonBody(input): JsonBody<LoginInput>,
) -> ApiResult<LoginResponse> {
    input.validate()?;

    let credentials = match repositories.users.find_by_email(input.email.trim()).await {
        Ok(credentials) => credentials,
        Err(RepositoryError::NotFound(_)) => {
            tracing::debug!("Login attempt for unknown e-mail");
            return Err(ApiError::authentication("Invalid credentials"));
        }
        Err(err) => return Err(err.into()),
    };

    state
        .credentials
        .verify_blocking(credentials.password, input.password)
        .await
        .map_err(|err| {
            tracing::debug!("Login rejected for user {}: {}", credentials.id, err);
            ApiError::from(err)
        })?;

    let issued = state.tokens.issue(credentials.id)?;
    tracing::info!("User {} logged in", credentials.id);

    Ok(ApiResponse::success(LoginResponse {
        id: credentials.id,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}
