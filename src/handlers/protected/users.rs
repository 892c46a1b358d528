// handlers/protected/users.rs - /users and /users/:id
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::database::models::{PasswordChange, Post, PrepareStage, User, UserInput};
use crate::database::Repositories;
use crate::error::ApiError;
use crate::middleware::{parse_id, ApiResponse, ApiResult, Principal, RawBody};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Substring of a name or nick
    pub user: Option<String>,
}

/// GET /users?user= - Search by name or nick
pub async fn list(
    _principal: Principal,
    repositories: Repositories,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<User>> {
    let needle = query.user.unwrap_or_default();
    let users = repositories.users.search(needle.trim()).await?;
    Ok(ApiResponse::success(users))
}

/// GET /users/:id
pub async fn get(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<User> {
    let id = parse_id(&id, "user")?;
    let user = repositories.users.find_by_id(id).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /users/:id - Edit your own profile
pub async fn put(
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
    body: RawBody,
) -> ApiResult<()> {
    let id = parse_id(&id, "user")?;
    principal.ensure_owns(id, "update")?;

    let (profile, _) = body.decode::<UserInput>()?.prepare(PrepareStage::Edit)?;

    repositories.users.update(id, profile).await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /users/:id - Delete your own account
pub async fn delete(
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "user")?;
    principal.ensure_owns(id, "delete")?;

    repositories.users.delete(id).await?;
    tracing::info!("User {} deleted their account", id);
    Ok(ApiResponse::no_content())
}

/// POST /users/:id/update-password
///
/// The current password must verify against the stored hash before the new
/// one is hashed and written. A failed check leaves the stored hash as is.
pub async fn update_password(
    State(state): State<AppState>,
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
    body: RawBody,
) -> ApiResult<()> {
    let id = parse_id(&id, "user")?;
    principal.ensure_owns(id, "change the password of")?;

    let change: PasswordChange = body.decode()?;
    if change.current.is_empty() || change.new.is_empty() {
        return Err(ApiError::validation("current and new passwords are required"));
    }

    let stored = repositories.users.password_hash(id).await?;
    state
        .credentials
        .verify_blocking(stored, change.current)
        .await
        .map_err(|err| {
            tracing::debug!("Password change rejected for user {}: {}", id, err);
            ApiError::from(err)
        })?;

    let hashed = state.credentials.hash_blocking(change.new).await?;
    repositories.users.update_password(id, &hashed).await?;

    tracing::info!("User {} rotated their password", id);
    Ok(ApiResponse::no_content())
}

/// GET /users/:id/posts
pub async fn posts(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<Vec<Post>> {
    let id = parse_id(&id, "user")?;
    let posts = repositories.posts.by_author(id).await?;
    Ok(ApiResponse::success(posts))
}
