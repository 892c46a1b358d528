use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tokio::sync::Mutex;

use crate::auth::password::PasswordHash;
use crate::database::models::{
    NewUser, Post, PostContent, PostId, User, UserCredentials, UserId, UserProfile,
};
use crate::database::repository::{
    PostRepository, RepoResult, Repositories, RepositoryError, RepositoryProvider, UserRepository,
};

/// One pooled connection shared by the repositories of a single request.
/// Dropping the last clone returns the connection to the pool.
type PgHandle = Arc<Mutex<PoolConnection<Postgres>>>;

const USER_COLUMNS: &str = "u.id, u.name, u.nick, u.email, u.created_at";

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.author_id, u.nick AS author_nick, p.likes, p.created_at
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
"#;

/// Map driver errors onto repository failure kinds.
pub(crate) fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or_default();
            let what = if constraint.contains("email") {
                "email already in use"
            } else if constraint.contains("nick") {
                "nick already in use"
            } else {
                "record already exists"
            };
            return RepositoryError::Conflict(what.to_string());
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::NotFound("referenced user not found".to_string());
        }
    }

    match err {
        e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            RepositoryError::Unavailable(e.to_string())
        }
        other => RepositoryError::Sqlx(other),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        nick: row.try_get("nick")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        author_nick: row.try_get("author_nick")?,
        likes: row.try_get("likes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn users_from_rows(rows: &[PgRow]) -> RepoResult<Vec<User>> {
    rows.iter()
        .map(|row| user_from_row(row).map_err(classify))
        .collect()
}

fn posts_from_rows(rows: &[PgRow]) -> RepoResult<Vec<Post>> {
    rows.iter()
        .map(|row| post_from_row(row).map_err(classify))
        .collect()
}

/// Escape LIKE wildcards so user input matches literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct PgUserRepository {
    conn: PgHandle,
}

pub struct PgPostRepository {
    conn: PgHandle,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> RepoResult<UserId> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query(
            "INSERT INTO users (name, nick, email, password) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&user.profile.name)
        .bind(&user.profile.nick)
        .bind(&user.profile.email)
        .bind(user.password.as_str())
        .fetch_one(&mut **conn)
        .await
        .map_err(classify)?;

        row.try_get("id").map_err(classify)
    }

    async fn search(&self, name_or_nick: &str) -> RepoResult<Vec<User>> {
        let mut conn = self.conn.lock().await;
        let query = format!(
            "SELECT {} FROM users u WHERE u.name ILIKE $1 OR u.nick ILIKE $1 ORDER BY u.id",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(like_pattern(name_or_nick))
            .fetch_all(&mut **conn)
            .await
            .map_err(classify)?;

        users_from_rows(&rows)
    }

    async fn find_by_id(&self, id: UserId) -> RepoResult<User> {
        let mut conn = self.conn.lock().await;
        let query = format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(classify)?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {} not found", id)))?;

        user_from_row(&row).map_err(classify)
    }

    async fn update(&self, id: UserId, profile: UserProfile) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query("UPDATE users SET name = $1, nick = $2, email = $3 WHERE id = $4")
            .bind(&profile.name)
            .bind(&profile.nick)
            .bind(&profile.email)
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {} not found", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: UserId) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        // posts and followers rows go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {} not found", id)));
        }
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<UserCredentials> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query("SELECT id, password FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut **conn)
            .await
            .map_err(classify)?
            .ok_or_else(|| RepositoryError::NotFound("user not found".to_string()))?;

        let password: String = row.try_get("password").map_err(classify)?;
        Ok(UserCredentials {
            id: row.try_get("id").map_err(classify)?,
            password: PasswordHash::from_stored(password),
        })
    }

    async fn follow(&self, user_id: UserId, follower_id: UserId) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO followers (user_id, follower_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(follower_id)
        .execute(&mut **conn)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query("DELETE FROM followers WHERE user_id = $1 AND follower_id = $2")
            .bind(user_id)
            .bind(follower_id)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn followers(&self, user_id: UserId) -> RepoResult<Vec<User>> {
        let mut conn = self.conn.lock().await;
        let query = format!(
            "SELECT {} FROM users u INNER JOIN followers f ON u.id = f.follower_id \
             WHERE f.user_id = $1 ORDER BY u.id",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&mut **conn)
            .await
            .map_err(classify)?;

        users_from_rows(&rows)
    }

    async fn following(&self, user_id: UserId) -> RepoResult<Vec<User>> {
        let mut conn = self.conn.lock().await;
        let query = format!(
            "SELECT {} FROM users u INNER JOIN followers f ON u.id = f.user_id \
             WHERE f.follower_id = $1 ORDER BY u.id",
            USER_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&mut **conn)
            .await
            .map_err(classify)?;

        users_from_rows(&rows)
    }

    async fn password_hash(&self, user_id: UserId) -> RepoResult<PasswordHash> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query("SELECT password FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(classify)?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {} not found", user_id)))?;

        let password: String = row.try_get("password").map_err(classify)?;
        Ok(PasswordHash::from_stored(password))
    }

    async fn update_password(&self, user_id: UserId, password: &PasswordHash) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password.as_str())
            .bind(user_id)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {} not found", user_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, author_id: UserId, content: PostContent) -> RepoResult<PostId> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query(
            "INSERT INTO posts (title, content, author_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&content.title)
        .bind(&content.content)
        .bind(author_id)
        .fetch_one(&mut **conn)
        .await
        .map_err(classify)?;

        row.try_get("id").map_err(classify)
    }

    async fn find_by_id(&self, id: PostId) -> RepoResult<Post> {
        let mut conn = self.conn.lock().await;
        let query = format!("{} WHERE p.id = $1", POST_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(classify)?
            .ok_or_else(|| RepositoryError::NotFound(format!("post {} not found", id)))?;

        post_from_row(&row).map_err(classify)
    }

    async fn feed(&self, user_id: UserId) -> RepoResult<Vec<Post>> {
        let mut conn = self.conn.lock().await;
        let query = format!(
            "{} WHERE p.author_id = $1 \
             OR p.author_id IN (SELECT f.user_id FROM followers f WHERE f.follower_id = $1) \
             ORDER BY p.created_at DESC, p.id DESC",
            POST_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&mut **conn)
            .await
            .map_err(classify)?;

        posts_from_rows(&rows)
    }

    async fn update(&self, id: PostId, content: PostContent) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query("UPDATE posts SET title = $1, content = $2 WHERE id = $3")
            .bind(&content.title)
            .bind(&content.content)
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("post {} not found", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: PostId) -> RepoResult<()> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("post {} not found", id)));
        }
        Ok(())
    }

    async fn by_author(&self, user_id: UserId) -> RepoResult<Vec<Post>> {
        let mut conn = self.conn.lock().await;
        let query = format!(
            "{} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id DESC",
            POST_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&mut **conn)
            .await
            .map_err(classify)?;

        posts_from_rows(&rows)
    }

    async fn like(&self, id: PostId) -> RepoResult<i64> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = $1 RETURNING likes")
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(classify)?
            .ok_or_else(|| RepositoryError::NotFound(format!("post {} not found", id)))?;

        row.try_get("likes").map_err(classify)
    }

    async fn unlike(&self, id: PostId) -> RepoResult<i64> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query(
            "UPDATE posts SET likes = GREATEST(likes - 1, 0) WHERE id = $1 RETURNING likes",
        )
        .bind(id)
        .fetch_optional(&mut **conn)
        .await
        .map_err(classify)?
        .ok_or_else(|| RepositoryError::NotFound(format!("post {} not found", id)))?;

        row.try_get("likes").map_err(classify)
    }
}

/// Production provider: one pooled connection per request.
#[derive(Clone)]
pub struct PgRepositoryProvider {
    pool: PgPool,
}

impl PgRepositoryProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RepositoryProvider for PgRepositoryProvider {
    async fn acquire(&self) -> RepoResult<Repositories> {
        let conn = self.pool.acquire().await.map_err(classify)?;
        let handle: PgHandle = Arc::new(Mutex::new(conn));

        Ok(Repositories {
            users: Arc::new(PgUserRepository {
                conn: handle.clone(),
            }),
            posts: Arc::new(PgPostRepository { conn: handle }),
        })
    }

    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}
