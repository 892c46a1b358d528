// handlers/protected/follow.rs - follow graph endpoints
use axum::extract::Path;

use crate::database::models::{User, UserId};
use crate::database::Repositories;
use crate::error::ApiError;
use crate::middleware::{parse_id, ApiResponse, ApiResult, Principal};

/// Self-targeting is refused here, before the store is touched.
fn target(principal: &Principal, raw: &str, action: &str) -> Result<UserId, ApiError> {
    let id = parse_id(raw, "user")?;
    if id == principal.user_id {
        return Err(ApiError::forbidden(format!("You cannot {} yourself", action)));
    }
    Ok(id)
}

/// POST /users/:id/follow - The principal starts following :id
pub async fn follow(
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = target(&principal, &id, "follow")?;
    repositories.users.follow(id, principal.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /users/:id/unfollow
pub async fn unfollow(
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = target(&principal, &id, "unfollow")?;
    repositories.users.unfollow(id, principal.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /users/:id/followers
pub async fn followers(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<Vec<User>> {
    let id = parse_id(&id, "user")?;
    Ok(ApiResponse::success(repositories.users.followers(id).await?))
}

/// GET /users/:id/following
pub async fn following(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<Vec<User>> {
    let id = parse_id(&id, "user")?;
    Ok(ApiResponse::success(repositories.users.following(id).await?))
}
