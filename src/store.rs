//! Store and classifier seams
//!
//! The engine never talks to a database directly. It is handed these
//! traits; [`crate::MemoryStore`] and [`crate::SqliteStorage`] implement
//! all three stores.

use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::expertise::AreaId;
use crate::ladder::FameLevel;
use crate::types::{AreaRating, FameRecord, NewPost, Post, PostId, RatingOutcome, User, UserId};

/// Per-(user, area) fame records. Pure key-value storage, no transition logic.
pub trait ReputationStore: Send + Sync {
    fn get(&self, user: UserId, area: AreaId) -> StoreResult<Option<FameRecord>>;

    /// Create the record or replace its level.
    fn upsert(&self, user: UserId, area: AreaId, level: &FameLevel) -> StoreResult<()>;

    /// Store `level` only if the record still holds `expected` (`None`: no
    /// record yet). Otherwise fails with [`StoreError::Conflict`], leaving
    /// the record untouched.
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    fn compare_and_set(
        &self,
        user: UserId,
        area: AreaId,
        expected: Option<&FameLevel>,
        level: &FameLevel,
    ) -> StoreResult<()>;

    fn list_for_user(&self, user: UserId) -> StoreResult<Vec<FameRecord>>;

    /// Every record in the store, used by the ranking scan.
    fn list_all(&self) -> StoreResult<Vec<FameRecord>>;
}

pub trait PostStore: Send + Sync {
    /// Insert the post if its author is still active, in one atomic step.
    /// A deactivated author yields [`StoreError::Inactive`].
    ///
    /// [`StoreError::Inactive`]: crate::StoreError::Inactive
    fn create(&self, post: NewPost) -> StoreResult<PostId>;

    fn get(&self, id: PostId) -> StoreResult<Option<Post>>;

    fn update_published(&self, id: PostId, published: bool) -> StoreResult<()>;

    /// Unpublish every post of `author`, returning how many rows changed.
    fn bulk_unpublish_by_author(&self, author: UserId) -> StoreResult<usize>;

    fn list_by_author(&self, author: UserId) -> StoreResult<Vec<Post>>;

    /// Insert or replace `user`'s rating of `rating_type` for `post`.
    fn upsert_rating(
        &self,
        user: UserId,
        post: PostId,
        rating_type: &str,
        score: i32,
    ) -> StoreResult<RatingOutcome>;
}

pub trait UserStore: Send + Sync {
    fn get(&self, id: UserId) -> StoreResult<Option<User>>;

    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Usernames are unique ignoring ASCII case; a taken one is a
    /// [`StoreError::Constraint`].
    ///
    /// [`StoreError::Constraint`]: crate::StoreError::Constraint
    fn create(&self, username: &str, date_joined: DateTime<Utc>) -> StoreResult<User>;

    fn deactivate(&self, id: UserId) -> StoreResult<()>;
}

/// Turns raw post content into (expertise area, truth rating) pairs.
pub trait Classifier: Send + Sync {
    fn classify(&self, content: &str) -> Vec<AreaRating>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Vec<AreaRating> + Send + Sync,
{
    fn classify(&self, content: &str) -> Vec<AreaRating> {
        self(content)
    }
}
