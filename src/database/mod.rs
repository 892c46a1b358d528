pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::InMemoryRepositoryProvider;
pub use postgres::PgRepositoryProvider;
pub use repository::{
    PostRepository, RepoResult, Repositories, RepositoryError, RepositoryProvider, UserRepository,
};
