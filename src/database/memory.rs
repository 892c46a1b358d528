//! In-process repository set used by tests and local runs without PostgreSQL.
//!
//! Each operation holds the store lock for its whole read-modify-write, which
//! gives the same per-resource serialization a single SQL statement has.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::auth::password::PasswordHash;
use crate::database::models::{
    NewUser, Post, PostContent, PostId, User, UserCredentials, UserId, UserProfile,
};
use crate::database::repository::{
    PostRepository, RepoResult, Repositories, RepositoryError, RepositoryProvider, UserRepository,
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password: PasswordHash,
}

#[derive(Debug, Clone)]
struct StoredPost {
    id: PostId,
    title: String,
    content: String,
    author_id: UserId,
    likes: i64,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    next_user_id: UserId,
    next_post_id: PostId,
    users: BTreeMap<UserId, StoredUser>,
    posts: BTreeMap<PostId, StoredPost>,
    /// (user_id, follower_id)
    follows: BTreeSet<(UserId, UserId)>,
}

impl State {
    fn nick_of(&self, id: UserId) -> String {
        self.users
            .get(&id)
            .map(|u| u.user.nick.clone())
            .unwrap_or_default()
    }

    fn render(&self, post: &StoredPost) -> Post {
        Post {
            id: post.id,
            title: post.title.clone(),
            content: post.content.clone(),
            author_id: post.author_id,
            author_nick: self.nick_of(post.author_id),
            likes: post.likes,
            created_at: post.created_at,
        }
    }

    fn newest_first(&self, mut posts: Vec<&StoredPost>) -> Vec<Post> {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts.into_iter().map(|p| self.render(p)).collect()
    }

    fn ensure_unique(&self, profile: &UserProfile, except: Option<UserId>) -> RepoResult<()> {
        for stored in self.users.values() {
            if Some(stored.user.id) == except {
                continue;
            }
            if stored.user.email == profile.email {
                return Err(RepositoryError::Conflict("email already in use".to_string()));
            }
            if stored.user.nick == profile.nick {
                return Err(RepositoryError::Conflict("nick already in use".to_string()));
            }
        }
        Ok(())
    }

    fn user_exists(&self, id: UserId) -> RepoResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("user {} not found", id)))
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    /// Repository calls made so far.
    calls: AtomicUsize,
    /// Repository sets handed out and not yet dropped.
    open_handles: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> RepoResult<MutexGuard<'_, State>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
    }
}

/// Counts as one open handle until every repository holding it is dropped.
#[derive(Debug)]
struct HandleGuard {
    shared: Arc<Shared>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct InMemoryUserRepository {
    handle: Arc<HandleGuard>,
}

pub struct InMemoryPostRepository {
    handle: Arc<HandleGuard>,
}

impl InMemoryUserRepository {
    fn lock(&self) -> RepoResult<MutexGuard<'_, State>> {
        self.handle.shared.lock()
    }
}

impl InMemoryPostRepository {
    fn lock(&self) -> RepoResult<MutexGuard<'_, State>> {
        self.handle.shared.lock()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> RepoResult<UserId> {
        let mut state = self.lock()?;
        state.ensure_unique(&user.profile, None)?;

        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.insert(
            id,
            StoredUser {
                user: User {
                    id,
                    name: user.profile.name,
                    nick: user.profile.nick,
                    email: user.profile.email,
                    created_at: Utc::now(),
                },
                password: user.password,
            },
        );
        Ok(id)
    }

    async fn search(&self, name_or_nick: &str) -> RepoResult<Vec<User>> {
        let state = self.lock()?;
        let needle = name_or_nick.to_lowercase();
        Ok(state
            .users
            .values()
            .filter(|s| {
                s.user.name.to_lowercase().contains(&needle)
                    || s.user.nick.to_lowercase().contains(&needle)
            })
            .map(|s| s.user.clone())
            .collect())
    }

    async fn find_by_id(&self, id: UserId) -> RepoResult<User> {
        let state = self.lock()?;
        state
            .users
            .get(&id)
            .map(|s| s.user.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("user {} not found", id)))
    }

    async fn update(&self, id: UserId, profile: UserProfile) -> RepoResult<()> {
        let mut state = self.lock()?;
        state.user_exists(id)?;
        state.ensure_unique(&profile, Some(id))?;

        if let Some(stored) = state.users.get_mut(&id) {
            stored.user.name = profile.name;
            stored.user.nick = profile.nick;
            stored.user.email = profile.email;
        }
        Ok(())
    }

    async fn delete(&self, id: UserId) -> RepoResult<()> {
        let mut state = self.lock()?;
        if state.users.remove(&id).is_none() {
            return Err(RepositoryError::NotFound(format!("user {} not found", id)));
        }
        state.posts.retain(|_, p| p.author_id != id);
        state
            .follows
            .retain(|(user_id, follower_id)| *user_id != id && *follower_id != id);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<UserCredentials> {
        let state = self.lock()?;
        state
            .users
            .values()
            .find(|s| s.user.email == email)
            .map(|s| UserCredentials {
                id: s.user.id,
                password: s.password.clone(),
            })
            .ok_or_else(|| RepositoryError::NotFound("user not found".to_string()))
    }

    async fn follow(&self, user_id: UserId, follower_id: UserId) -> RepoResult<()> {
        let mut state = self.lock()?;
        state.user_exists(user_id)?;
        state.user_exists(follower_id)?;
        state.follows.insert((user_id, follower_id));
        Ok(())
    }

    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> RepoResult<()> {
        let mut state = self.lock()?;
        state.follows.remove(&(user_id, follower_id));
        Ok(())
    }

    async fn followers(&self, user_id: UserId) -> RepoResult<Vec<User>> {
        let state = self.lock()?;
        Ok(state
            .follows
            .iter()
            .filter(|(followed, _)| *followed == user_id)
            .filter_map(|(_, follower)| state.users.get(follower).map(|s| s.user.clone()))
            .collect())
    }

    async fn following(&self, user_id: UserId) -> RepoResult<Vec<User>> {
        let state = self.lock()?;
        Ok(state
            .follows
            .iter()
            .filter(|(_, follower)| *follower == user_id)
            .filter_map(|(followed, _)| state.users.get(followed).map(|s| s.user.clone()))
            .collect())
    }

    async fn password_hash(&self, user_id: UserId) -> RepoResult<PasswordHash> {
        let state = self.lock()?;
        state
            .users
            .get(&user_id)
            .map(|s| s.password.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("user {} not found", user_id)))
    }

    async fn update_password(&self, user_id: UserId, password: &PasswordHash) -> RepoResult<()> {
        let mut state = self.lock()?;
        match state.users.get_mut(&user_id) {
            Some(stored) => {
                stored.password = password.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("user {} not found", user_id))),
        }
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, author_id: UserId, content: PostContent) -> RepoResult<PostId> {
        let mut state = self.lock()?;
        state.user_exists(author_id)?;

        state.next_post_id += 1;
        let id = state.next_post_id;
        state.posts.insert(
            id,
            StoredPost {
                id,
                title: content.title,
                content: content.content,
                author_id,
                likes: 0,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: PostId) -> RepoResult<Post> {
        let state = self.lock()?;
        state
            .posts
            .get(&id)
            .map(|p| state.render(p))
            .ok_or_else(|| RepositoryError::NotFound(format!("post {} not found", id)))
    }

    async fn feed(&self, user_id: UserId) -> RepoResult<Vec<Post>> {
        let state = self.lock()?;
        let visible: Vec<&StoredPost> = state
            .posts
            .values()
            .filter(|p| p.author_id == user_id || state.follows.contains(&(p.author_id, user_id)))
            .collect();
        Ok(state.newest_first(visible))
    }

    async fn update(&self, id: PostId, content: PostContent) -> RepoResult<()> {
        let mut state = self.lock()?;
        match state.posts.get_mut(&id) {
            Some(post) => {
                post.title = content.title;
                post.content = content.content;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("post {} not found", id))),
        }
    }

    async fn delete(&self, id: PostId) -> RepoResult<()> {
        let mut state = self.lock()?;
        match state.posts.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!("post {} not found", id))),
        }
    }

    async fn by_author(&self, user_id: UserId) -> RepoResult<Vec<Post>> {
        let state = self.lock()?;
        let authored: Vec<&StoredPost> = state
            .posts
            .values()
            .filter(|p| p.author_id == user_id)
            .collect();
        Ok(state.newest_first(authored))
    }

    async fn like(&self, id: PostId) -> RepoResult<i64> {
        let mut state = self.lock()?;
        match state.posts.get_mut(&id) {
            Some(post) => {
                post.likes += 1;
                Ok(post.likes)
            }
            None => Err(RepositoryError::NotFound(format!("post {} not found", id))),
        }
    }

    async fn unlike(&self, id: PostId) -> RepoResult<i64> {
        let mut state = self.lock()?;
        match state.posts.get_mut(&id) {
            Some(post) => {
                post.likes = (post.likes - 1).max(0);
                Ok(post.likes)
            }
            None => Err(RepositoryError::NotFound(format!("post {} not found", id))),
        }
    }
}

/// Provider backed by process memory. Clones share the same store.
#[derive(Clone, Default)]
pub struct InMemoryRepositoryProvider {
    shared: Arc<Shared>,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls made through any handle.
    pub fn call_count(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Handles acquired and not yet released.
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn acquire(&self) -> RepoResult<Repositories> {
        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        let handle = Arc::new(HandleGuard {
            shared: self.shared.clone(),
        });

        Ok(Repositories {
            users: Arc::new(InMemoryUserRepository {
                handle: handle.clone(),
            }),
            posts: Arc::new(InMemoryPostRepository { handle }),
        })
    }

    async fn ping(&self) -> RepoResult<()> {
        self.shared
            .state
            .lock()
            .map(|_| ())
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
    }
}
