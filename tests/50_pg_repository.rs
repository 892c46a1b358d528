//! Runs against a real PostgreSQL when DATABASE_URL is set; otherwise each
//! test returns early.

use anyhow::Result;
use sqlx::PgPool;

use social_api::auth::password::CredentialVerifier;
use social_api::config::DatabaseConfig;
use social_api::database::models::{NewUser, PostContent, UserProfile};
use social_api::database::{
    DatabaseManager, PgRepositoryProvider, RepositoryError, RepositoryProvider,
};

async fn pool() -> Result<Option<PgPool>> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set; skipping PostgreSQL tests");
            return Ok(None);
        }
    };
    let pool = DatabaseManager::connect(&DatabaseConfig {
        url,
        max_connections: 5,
        connection_timeout: 5,
    })
    .await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Some(pool))
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

async fn new_user(provider: &PgRepositoryProvider) -> Result<i64> {
    let repos = provider.acquire().await?;
    let nick = unique("pg");
    let password = CredentialVerifier::new(Some(4)).hash("pw")?;
    let id = repos
        .users
        .create(NewUser {
            profile: UserProfile {
                name: nick.clone(),
                nick: nick.clone(),
                email: format!("{}@example.com", nick),
            },
            password,
        })
        .await?;
    Ok(id)
}

#[tokio::test]
async fn follow_is_idempotent_in_postgres() -> Result<()> {
    let Some(pool) = pool().await? else { return Ok(()) };
    let provider = PgRepositoryProvider::new(pool);
    let a = new_user(&provider).await?;
    let b = new_user(&provider).await?;
    let repos = provider.acquire().await?;

    repos.users.follow(a, b).await?;
    repos.users.follow(a, b).await?;
    assert_eq!(repos.users.followers(a).await?.len(), 1);

    repos.users.unfollow(a, b).await?;
    repos.users.unfollow(a, b).await?;
    assert!(repos.users.followers(a).await?.is_empty());

    assert!(matches!(
        repos.users.follow(i64::MAX, a).await,
        Err(RepositoryError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn concurrent_likes_in_postgres() -> Result<()> {
    let Some(pool) = pool().await? else { return Ok(()) };
    let provider = PgRepositoryProvider::new(pool);
    let author = new_user(&provider).await?;
    let post = provider
        .acquire()
        .await?
        .posts
        .create(
            author,
            PostContent {
                title: "pg".to_string(),
                content: "likes".to_string(),
            },
        )
        .await?;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let provider = provider.clone();
            tokio::spawn(async move {
                let repos = provider.acquire().await?;
                repos.posts.like(post).await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        task??;
    }

    let repos = provider.acquire().await?;
    assert_eq!(repos.posts.find_by_id(post).await?.likes, 10);
    for _ in 0..11 {
        repos.posts.unlike(post).await?;
    }
    assert_eq!(repos.posts.find_by_id(post).await?.likes, 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_conflict_in_postgres() -> Result<()> {
    let Some(pool) = pool().await? else { return Ok(()) };
    let provider = PgRepositoryProvider::new(pool);
    let id = new_user(&provider).await?;
    let repos = provider.acquire().await?;
    let existing = repos.users.find_by_id(id).await?;

    let result = repos
        .users
        .create(NewUser {
            profile: UserProfile {
                name: "dup".to_string(),
                nick: unique("dup"),
                email: existing.email,
            },
            password: CredentialVerifier::new(Some(4)).hash("pw")?,
        })
        .await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    Ok(())
}
