pub mod post;
pub mod user;

pub use post::{Post, PostContent, PostInput};
pub use user::{
    LoginInput, NewUser, PasswordChange, PrepareStage, User, UserCredentials, UserInput, UserProfile,
};

use thiserror::Error;

pub type UserId = i64;
pub type PostId = i64;

/// Client input that fails field-level rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ValidationError> for crate::error::ApiError {
    fn from(err: ValidationError) -> Self {
        crate::error::ApiError::validation(err.0)
    }
}
