// handlers/public/register.rs - POST /users
use axum::extract::State;

use crate::database::models::{NewUser, PrepareStage, User, UserInput};
use crate::database::Repositories;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::state::AppState;

/// Create an account. The password is hashed before the store sees it.
pub async fn post(
    State(state): State<AppState>,
    repositories: Repositories,
    JsonBody(input): JsonBody<UserInput>,
) -> ApiResult<User> {
    let (profile, password) = input.prepare(PrepareStage::Registration)?;
    let password = password.ok_or_else(|| ApiError::validation("password is required"))?;

    let password = state.credentials.hash_blocking(password).await?;
    let id = repositories
        .users
        .create(NewUser { profile, password })
        .await?;
    let user = repositories.users.find_by_id(id).await?;

    tracing::info!("Registered user {} ({})", user.id, user.nick);
    Ok(ApiResponse::created(user))
}
