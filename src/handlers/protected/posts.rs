// handlers/protected/posts.rs - /posts and /posts/:id
use axum::extract::Path;
use serde::Serialize;

use crate::database::models::{Post, PostId, PostInput};
use crate::database::Repositories;
use crate::middleware::{parse_id, ApiResponse, ApiResult, JsonBody, Principal, RawBody};

#[derive(Debug, Serialize)]
pub struct LikeCount {
    pub id: PostId,
    pub likes: i64,
}

/// POST /posts - Publish as the principal
pub async fn create(
    principal: Principal,
    repositories: Repositories,
    JsonBody(input): JsonBody<PostInput>,
) -> ApiResult<Post> {
    let content = input.prepare()?;
    let id = repositories.posts.create(principal.user_id, content).await?;
    let post = repositories.posts.find_by_id(id).await?;
    Ok(ApiResponse::created(post))
}

/// GET /posts - Own posts plus posts from followed users, newest first
pub async fn feed(principal: Principal, repositories: Repositories) -> ApiResult<Vec<Post>> {
    let posts = repositories.posts.feed(principal.user_id).await?;
    Ok(ApiResponse::success(posts))
}

/// GET /posts/:id
pub async fn get(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<Post> {
    let id = parse_id(&id, "post")?;
    Ok(ApiResponse::success(repositories.posts.find_by_id(id).await?))
}

/// PUT /posts/:id - Only the author may edit
pub async fn put(
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
    body: RawBody,
) -> ApiResult<()> {
    let id = parse_id(&id, "post")?;
    let existing = repositories.posts.find_by_id(id).await?;
    principal.ensure_owns(existing.author_id, "update")?;

    let content = body.decode::<PostInput>()?.prepare()?;
    repositories.posts.update(id, content).await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /posts/:id - Only the author may delete
pub async fn delete(
    principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "post")?;
    let existing = repositories.posts.find_by_id(id).await?;
    principal.ensure_owns(existing.author_id, "delete")?;

    repositories.posts.delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /posts/:id/like
pub async fn like(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<LikeCount> {
    let id = parse_id(&id, "post")?;
    let likes = repositories.posts.like(id).await?;
    Ok(ApiResponse::success(LikeCount { id, likes }))
}

/// POST /posts/:id/unlike - Never goes below zero
pub async fn unlike(
    _principal: Principal,
    repositories: Repositories,
    Path(id): Path<String>,
) -> ApiResult<LikeCount> {
    let id = parse_id(&id, "post")?;
    let likes = repositories.posts.unlike(id).await?;
    Ok(ApiResponse::success(LikeCount { id, likes }))
}
