use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use super::{UserId, ValidationError};
use crate::auth::password::PasswordHash;

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub nick: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Row used by login: identifier plus stored hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: UserId,
    pub password: PasswordHash,
}

/// Editable profile fields, already trimmed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub nick: String,
    pub email: String,
}

/// Registration payload ready for the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub profile: UserProfile,
    pub password: PasswordHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareStage {
    Registration,
    Edit,
}

/// Raw request body for registration and profile edits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl UserInput {
    /// Trim and validate. On registration the plaintext password is handed
    /// back separately so the caller can hash it before anything is stored.
    pub fn prepare(
        self,
        stage: PrepareStage,
    ) -> Result<(UserProfile, Option<String>), ValidationError> {
        let profile = UserProfile {
            name: self.name.trim().to_string(),
            nick: self.nick.trim().to_string(),
            email: self.email.trim().to_string(),
        };

        if profile.name.is_empty() {
            return Err(ValidationError::new("name is required"));
        }
        if profile.nick.is_empty() {
            return Err(ValidationError::new("nick is required"));
        }
        if profile.email.is_empty() {
            return Err(ValidationError::new("email is required"));
        }
        if !profile.email.validate_email() {
            return Err(ValidationError::new("email is invalid"));
        }

        match stage {
            PrepareStage::Registration => match self.password {
                Some(password) if !password.is_empty() => Ok((profile, Some(password))),
                _ => Err(ValidationError::new("password is required")),
            },
            PrepareStage::Edit => Ok((profile, None)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::new("email is required"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::new("password is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub new: String,
}
