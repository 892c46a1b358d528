use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PostId, UserId, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub author_nick: String,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// Title and body of a post after trimming and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl PostInput {
    pub fn prepare(self) -> Result<PostContent, ValidationError> {
        let title = self.title.trim().to_string();
        let content = self.content.trim().to_string();

        if title.is_empty() {
            return Err(ValidationError::new("title is required"));
        }
        if content.is_empty() {
            return Err(ValidationError::new("content is required"));
        }

        Ok(PostContent { title, content })
    }
}
