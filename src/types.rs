//! Shared data structures for users, posts, fame records and outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expertise::AreaId;
use crate::ladder::FameLevel;

pub type UserId = i64;
pub type PostId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Truth score a classifier attaches to one (post, expertise area) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthRating {
    pub name: String,
    pub numeric_value: i32,
}

impl TruthRating {
    pub fn new(name: impl Into<String>, numeric_value: i32) -> Self {
        Self {
            name: name.into(),
            numeric_value,
        }
    }

    pub fn is_bullshit(&self) -> bool {
        self.numeric_value < 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRating {
    pub expertise_area: AreaId,
    pub truth_rating: TruthRating,
}

impl AreaRating {
    pub fn new(expertise_area: AreaId, truth_rating: TruthRating) -> Self {
        Self {
            expertise_area,
            truth_rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FameRecord {
    pub user: UserId,
    pub expertise_area: AreaId,
    pub fame_level: FameLevel,
}

/// A post ready to be persisted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub author: UserId,
    pub content: String,
    pub cites: Option<PostId>,
    pub replies_to: Option<PostId>,
    pub published: bool,
    pub submitted_at: DateTime<Utc>,
    pub classification: Vec<AreaRating>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    pub content: String,
    pub cites: Option<PostId>,
    pub replies_to: Option<PostId>,
    pub published: bool,
    pub submitted_at: DateTime<Utc>,
    pub classification: Vec<AreaRating>,
}

impl Post {
    pub fn from_new(id: PostId, post: NewPost) -> Self {
        Self {
            id,
            author: post.author,
            content: post.content,
            cites: post.cites,
            replies_to: post.replies_to,
            published: post.published,
            submitted_at: post.submitted_at,
            classification: post.classification,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostOutcome {
    pub published: bool,
    pub id: PostId,
}

/// Result of [`crate::ReputationService::submit_post`].
///
/// `banned` tells the caller to end the author's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub post: PostOutcome,
    pub classification: Vec<AreaRating>,
    pub banned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingOutcome {
    New,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FameProfile {
    pub user: User,
    pub records: Vec<FameRecord>,
}
