use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::password::PasswordHash;
use crate::database::models::{
    NewUser, Post, PostContent, PostId, User, UserCredentials, UserId, UserProfile,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Persistence for accounts and the follow graph.
///
/// Ownership is not checked here: callers must compare the acting principal
/// with the resource owner before calling a mutating method.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> RepoResult<UserId>;

    /// Case-insensitive substring match on name or nick.
    async fn search(&self, name_or_nick: &str) -> RepoResult<Vec<User>>;

    async fn find_by_id(&self, id: UserId) -> RepoResult<User>;

    async fn update(&self, id: UserId, profile: UserProfile) -> RepoResult<()>;

    /// Removes the account together with its posts and follow edges.
    async fn delete(&self, id: UserId) -> RepoResult<()>;

    async fn find_by_email(&self, email: &str) -> RepoResult<UserCredentials>;

    /// Idempotent: an existing edge is left untouched and is not an error.
    async fn follow(&self, user_id: UserId, follower_id: UserId) -> RepoResult<()>;

    /// Idempotent: removing a missing edge succeeds.
    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> RepoResult<()>;

    async fn followers(&self, user_id: UserId) -> RepoResult<Vec<User>>;

    async fn following(&self, user_id: UserId) -> RepoResult<Vec<User>>;

    async fn password_hash(&self, user_id: UserId) -> RepoResult<PasswordHash>;

    /// Only accepts an already hashed value.
    async fn update_password(&self, user_id: UserId, password: &PasswordHash) -> RepoResult<()>;
}

/// Persistence for posts and their like counters.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, author_id: UserId, content: PostContent) -> RepoResult<PostId>;

    async fn find_by_id(&self, id: PostId) -> RepoResult<Post>;

    /// Posts by the user and by everyone the user follows, newest first.
    async fn feed(&self, user_id: UserId) -> RepoResult<Vec<Post>>;

    async fn update(&self, id: PostId, content: PostContent) -> RepoResult<()>;

    async fn delete(&self, id: PostId) -> RepoResult<()>;

    async fn by_author(&self, user_id: UserId) -> RepoResult<Vec<Post>>;

    /// Adds one like in a single atomic store update and returns the new count.
    async fn like(&self, id: PostId) -> RepoResult<i64>;

    /// Removes one like, never going below zero, and returns the new count.
    async fn unlike(&self, id: PostId) -> RepoResult<i64>;
}

/// The data-access handle bound to a single request.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

/// Hands out one [`Repositories`] per request. The underlying store handle
/// is released when the last clone of that value is dropped.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    async fn acquire(&self) -> RepoResult<Repositories>;

    /// Round-trip to the store.
    async fn ping(&self) -> RepoResult<()>;
}
