//! In-memory storage backend
//!
//! HashMap-backed implementation of every store trait. Useful for unit
//! tests and short-lived processes that don't need persistence.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::expertise::AreaId;
use crate::ladder::FameLevel;
use crate::store::{PostStore, ReputationStore, UserStore};
use crate::types::{FameRecord, NewPost, Post, PostId, RatingOutcome, User, UserId};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, Post>,
    fame: HashMap<(UserId, AreaId), FameLevel>,
    ratings: HashMap<(UserId, PostId, String), i32>,
    next_user_id: UserId,
    next_post_id: PostId,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rating(&self, user: UserId, post: PostId, rating_type: &str) -> Option<i32> {
        self.tables
            .read()
            .ratings
            .get(&(user, post, rating_type.to_string()))
            .copied()
    }
}

impl ReputationStore for MemoryStore {
    fn get(&self, user: UserId, area: AreaId) -> StoreResult<Option<FameRecord>> {
        Ok(self
            .tables
            .read()
            .fame
            .get(&(user, area))
            .map(|level| FameRecord {
                user,
                expertise_area: area,
                fame_level: level.clone(),
            }))
    }

    fn upsert(&self, user: UserId, area: AreaId, level: &FameLevel) -> StoreResult<()> {
        self.tables.write().fame.insert((user, area), level.clone());
        Ok(())
    }

    fn compare_and_set(
        &self,
        user: UserId,
        area: AreaId,
        expected: Option<&FameLevel>,
        level: &FameLevel,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let current = tables.fame.get(&(user, area));
        if current != expected {
            return Err(StoreError::Conflict(format!(
                "fame of user {} in area {} changed concurrently",
                user, area
            )));
        }
        tables.fame.insert((user, area), level.clone());
        Ok(())
    }

    fn list_for_user(&self, user: UserId) -> StoreResult<Vec<FameRecord>> {
        let mut records: Vec<_> = self
            .list_all()?
            .into_iter()
            .filter(|r| r.user == user)
            .collect();
        records.sort_by_key(|r| r.expertise_area);
        Ok(records)
    }

    fn list_all(&self) -> StoreResult<Vec<FameRecord>> {
        Ok(self
            .tables
            .read()
            .fame
            .iter()
            .map(|(&(user, area), level)| FameRecord {
                user,
                expertise_area: area,
                fame_level: level.clone(),
            })
            .collect())
    }
}

impl PostStore for MemoryStore {
    fn create(&self, post: NewPost) -> StoreResult<PostId> {
        let mut tables = self.tables.write();
        match tables.users.get(&post.author) {
            Some(author) if author.is_active => {}
            Some(_) => return Err(StoreError::Inactive(post.author)),
            None => {
                return Err(StoreError::Constraint(format!(
                    "post author {} does not exist",
                    post.author
                )))
            }
        }
        tables.next_post_id += 1;
        let id = tables.next_post_id;
        tables.posts.insert(id, Post::from_new(id, post));
        Ok(id)
    }

    fn get(&self, id: PostId) -> StoreResult<Option<Post>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    fn update_published(&self, id: PostId, published: bool) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let post = tables
            .posts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("post {}", id)))?;
        post.published = published;
        Ok(())
    }

    fn bulk_unpublish_by_author(&self, author: UserId) -> StoreResult<usize> {
        let mut tables = self.tables.write();
        let mut changed = 0;
        for post in tables.posts.values_mut().filter(|p| p.author == author) {
            if post.published {
                post.published = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn list_by_author(&self, author: UserId) -> StoreResult<Vec<Post>> {
        Ok(self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| p.author == author)
            .cloned()
            .collect())
    }

    fn upsert_rating(
        &self,
        user: UserId,
        post: PostId,
        rating_type: &str,
        score: i32,
    ) -> StoreResult<RatingOutcome> {
        let previous = self
            .tables
            .write()
            .ratings
            .insert((user, post, rating_type.to_string()), score);
        Ok(match previous {
            Some(_) => RatingOutcome::Updated,
            None => RatingOutcome::New,
        })
    }
}

impl UserStore for MemoryStore {
    fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    fn create(&self, username: &str, date_joined: DateTime<Utc>) -> StoreResult<User> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(username))
        {
            return Err(StoreError::Constraint(format!(
                "username '{}' already taken",
                username
            )));
        }
        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            username: username.to_string(),
            is_active: true,
            date_joined,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn deactivate(&self, id: UserId) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;
        user.is_active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_post(author: UserId, published: bool) -> NewPost {
        NewPost {
            author,
            content: "content".to_string(),
            cites: None,
            replies_to: None,
            published,
            submitted_at: Utc::now(),
            classification: vec![],
        }
    }

    #[test]
    fn test_fame_upsert_keeps_one_record_per_area() {
        let store = MemoryStore::new();
        store.upsert(1, 7, &FameLevel::new("Confuser", -10)).unwrap();
        store.upsert(1, 7, &FameLevel::new("Expert", 50)).unwrap();
        store.upsert(1, 8, &FameLevel::new("Confuser", -10)).unwrap();

        let records = store.list_for_user(1).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            ReputationStore::get(&store, 1, 7).unwrap().unwrap().fame_level.numeric_value,
            50
        );
        assert!(ReputationStore::get(&store, 2, 7).unwrap().is_none());
    }

    #[test]
    fn test_compare_and_set_rejects_stale_expectation() {
        let store = MemoryStore::new();
        let insider = FameLevel::new("Insider", 10);
        let dubious = FameLevel::new("Dubious", -2);

        store.compare_and_set(1, 7, None, &insider).unwrap();
        assert!(matches!(
            store.compare_and_set(1, 7, None, &dubious),
            Err(StoreError::Conflict(_))
        ));
        store.compare_and_set(1, 7, Some(&insider), &dubious).unwrap();
        assert!(matches!(
            store.compare_and_set(1, 7, Some(&insider), &FameLevel::new("Confuser", -10)),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            ReputationStore::get(&store, 1, 7).unwrap().unwrap().fame_level,
            dubious
        );
    }

    #[test]
    fn test_bulk_unpublish_only_touches_author() {
        let store = MemoryStore::new();
        let first = UserStore::create(&store, "first", Utc::now()).unwrap().id;
        let second = UserStore::create(&store, "second", Utc::now()).unwrap().id;
        let a = PostStore::create(&store, new_post(first, true)).unwrap();
        let b = PostStore::create(&store, new_post(first, false)).unwrap();
        let c = PostStore::create(&store, new_post(second, true)).unwrap();

        store.update_published(b, true).unwrap();
        assert_eq!(store.bulk_unpublish_by_author(first).unwrap(), 2);
        assert!(!PostStore::get(&store, a).unwrap().unwrap().published);
        assert!(!PostStore::get(&store, b).unwrap().unwrap().published);
        assert!(PostStore::get(&store, c).unwrap().unwrap().published);
        assert!(matches!(
            store.update_published(99, false),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_posts_need_an_active_author() {
        let store = MemoryStore::new();
        let author = UserStore::create(&store, "author", Utc::now()).unwrap().id;
        store.deactivate(author).unwrap();

        assert_eq!(
            PostStore::create(&store, new_post(author, true)),
            Err(StoreError::Inactive(author))
        );
        assert!(matches!(
            PostStore::create(&store, new_post(404, true)),
            Err(StoreError::Constraint(_))
        ));
        assert!(store.list_by_author(author).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_username_is_a_constraint_violation() {
        let store = MemoryStore::new();
        UserStore::create(&store, "alice", Utc::now()).unwrap();
        assert!(matches!(
            UserStore::create(&store, "ALICE", Utc::now()),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_rating_upsert_reports_new_then_updated() {
        let store = MemoryStore::new();
        assert_eq!(store.upsert_rating(1, 5, "truth", 3).unwrap(), RatingOutcome::New);
        assert_eq!(
            store.upsert_rating(1, 5, "truth", -1).unwrap(),
            RatingOutcome::Updated
        );
        assert_eq!(store.rating(1, 5, "truth"), Some(-1));
    }
}
