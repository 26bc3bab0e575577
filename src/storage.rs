//! SQLite storage for users, posts and fame records

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::expertise::AreaId;
use crate::ladder::FameLevel;
use crate::store::{PostStore, ReputationStore, UserStore};
use crate::types::{AreaRating, FameRecord, NewPost, Post, PostId, RatingOutcome, User, UserId};

const BUSY_TIMEOUT_SECS: u64 = 5;

/// Embedded migrations, applied in order
const MIGRATIONS: &[(&str, &str)] = &[("001", include_str!("../migrations/001_schema.sql"))];

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Conflict(err.to_string())
            }
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                StoreError::Constraint(err.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..) => {
                StoreError::Serialization(err.to_string())
            }
            _ => StoreError::Backend(format!("SQLite: {}", err)),
        }
    }
}

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        info!("Opened SQLite store at {}", path.as_ref().display());
        Ok(storage)
    }

    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    fn run_migrations(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
            [],
        )?;

        for (version, sql) in MIGRATIONS {
            let applied: bool = conn.query_row(
                "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
                params![version],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )?;
            if applied {
                continue;
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            info!("Applied migration {}", version);
        }

        Ok(())
    }
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_active: row.get(2)?,
        date_joined: parse_timestamp(row, 3)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let raw: String = row.get(7)?;
    let classification: Vec<AreaRating> = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Post {
        id: row.get(0)?,
        author: row.get(1)?,
        content: row.get(2)?,
        cites: row.get(3)?,
        replies_to: row.get(4)?,
        published: row.get(5)?,
        submitted_at: parse_timestamp(row, 6)?,
        classification,
    })
}

fn fame_from_row(row: &Row<'_>) -> rusqlite::Result<FameRecord> {
    Ok(FameRecord {
        user: row.get(0)?,
        expertise_area: row.get(1)?,
        fame_level: FameLevel {
            name: row.get(2)?,
            numeric_value: row.get(3)?,
        },
    })
}

const POST_COLUMNS: &str =
    "id, author, content, cites, replies_to, published, submitted_at, classification";

impl ReputationStore for SqliteStorage {
    fn get(&self, user: UserId, area: AreaId) -> StoreResult<Option<FameRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT user_id, area_id, level_name, level_value FROM fame WHERE user_id = ?1 AND area_id = ?2",
                params![user, area],
                fame_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert(&self, user: UserId, area: AreaId, level: &FameLevel) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO fame (user_id, area_id, level_name, level_value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, area_id) DO UPDATE SET
                level_name = excluded.level_name,
                level_value = excluded.level_value,
                updated_at = excluded.updated_at",
            params![
                user,
                area,
                level.name,
                level.numeric_value,
                Utc::now().to_rfc3339()
            ],
        )?;
        debug!(
            "Stored fame {} ({}) for user {} in area {}",
            level.name, level.numeric_value, user, area
        );
        Ok(())
    }

    fn compare_and_set(
        &self,
        user: UserId,
        area: AreaId,
        expected: Option<&FameLevel>,
        level: &FameLevel,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        // One statement each: a write from another connection in between
        // makes this one match no row.
        let changed = match expected {
            None => conn.execute(
                "INSERT INTO fame (user_id, area_id, level_name, level_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, area_id) DO NOTHING",
                params![user, area, level.name, level.numeric_value, now],
            )?,
            Some(current) => conn.execute(
                "UPDATE fame SET level_name = ?3, level_value = ?4, updated_at = ?5
                 WHERE user_id = ?1 AND area_id = ?2 AND level_name = ?6 AND level_value = ?7",
                params![
                    user,
                    area,
                    level.name,
                    level.numeric_value,
                    now,
                    current.name,
                    current.numeric_value
                ],
            )?,
        };

        if changed == 0 {
            return Err(StoreError::Conflict(format!(
                "fame of user {} in area {} changed concurrently",
                user, area
            )));
        }
        debug!(
            "Moved user {} in area {} to {} ({})",
            user, area, level.name, level.numeric_value
        );
        Ok(())
    }

    fn list_for_user(&self, user: UserId) -> StoreResult<Vec<FameRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, area_id, level_name, level_value FROM fame WHERE user_id = ?1 ORDER BY area_id",
        )?;
        let records = stmt
            .query_map(params![user], fame_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn list_all(&self) -> StoreResult<Vec<FameRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT user_id, area_id, level_name, level_value FROM fame")?;
        let records = stmt
            .query_map([], fame_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl PostStore for SqliteStorage {
    fn create(&self, post: NewPost) -> StoreResult<PostId> {
        let classification = serde_json::to_string(&post.classification)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let conn = self.conn.lock();
        // The active check and the insert are one statement, so a ban
        // committed by another connection can't slip in between.
        let inserted = conn.execute(
            "INSERT INTO posts (author, content, cites, replies_to, published, submitted_at, classification)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7 FROM users WHERE id = ?1 AND is_active = 1",
            params![
                post.author,
                post.content,
                post.cites,
                post.replies_to,
                post.published,
                post.submitted_at.to_rfc3339(),
                classification,
            ],
        )?;

        if inserted == 0 {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM users WHERE id = ?1",
                    params![post.author],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            return Err(if exists {
                StoreError::Inactive(post.author)
            } else {
                StoreError::Constraint(format!("post author {} does not exist", post.author))
            });
        }
        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: PostId) -> StoreResult<Option<Post>> {
        let conn = self.conn.lock();
        let post = conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
                params![id],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    fn update_published(&self, id: PostId, published: bool) -> StoreResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE posts SET published = ?1 WHERE id = ?2",
            params![published, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("post {}", id)));
        }
        Ok(())
    }

    fn bulk_unpublish_by_author(&self, author: UserId) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE posts SET published = 0 WHERE author = ?1 AND published = 1",
            params![author],
        )?;
        Ok(changed)
    }

    fn list_by_author(&self, author: UserId) -> StoreResult<Vec<Post>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts WHERE author = ?1 ORDER BY id",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![author], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn upsert_rating(
        &self,
        user: UserId,
        post: PostId,
        rating_type: &str,
        score: i32,
    ) -> StoreResult<RatingOutcome> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        let exists: bool = tx.query_row(
            "SELECT COUNT(*) FROM post_ratings WHERE user_id = ?1 AND post_id = ?2 AND rating_type = ?3",
            params![user, post, rating_type],
            |row| row.get::<_, i64>(0).map(|c| c > 0),
        )?;

        tx.execute(
            "INSERT INTO post_ratings (user_id, post_id, rating_type, score, rated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, post_id, rating_type) DO UPDATE SET
                score = excluded.score,
                rated_at = excluded.rated_at",
            params![user, post, rating_type, score, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(if exists {
            RatingOutcome::Updated
        } else {
            RatingOutcome::New
        })
    }
}

impl UserStore for SqliteStorage {
    fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, is_active, date_joined FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, is_active, date_joined FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn create(&self, username: &str, date_joined: DateTime<Utc>) -> StoreResult<User> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (username, is_active, date_joined) VALUES (?1, 1, ?2)",
            params![username, date_joined.to_rfc3339()],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            is_active: true,
            date_joined,
        })
    }

    fn deactivate(&self, id: UserId) -> StoreResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TruthRating;

    fn storage_with_user() -> (SqliteStorage, User) {
        let storage = SqliteStorage::in_memory().unwrap();
        let user = UserStore::create(&storage, "testuser", Utc::now()).unwrap();
        (storage, user)
    }

    #[test]
    fn test_user_roundtrip_and_deactivate() {
        let (storage, user) = storage_with_user();
        let found = storage.find_by_username("TESTUSER").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.is_active);

        storage.deactivate(user.id).unwrap();
        assert!(!UserStore::get(&storage, user.id).unwrap().unwrap().is_active);
        assert!(matches!(
            storage.deactivate(999),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_post_classification_is_persisted() {
        let (storage, user) = storage_with_user();
        let id = PostStore::create(
            &storage,
            NewPost {
                author: user.id,
                content: "the earth is flat".to_string(),
                cites: None,
                replies_to: None,
                published: false,
                submitted_at: Utc::now(),
                classification: vec![AreaRating::new(2, TruthRating::new("false", -5))],
            },
        )
        .unwrap();

        let post = PostStore::get(&storage, id).unwrap().unwrap();
        assert!(!post.published);
        assert_eq!(post.classification[0].truth_rating.numeric_value, -5);
        assert!(PostStore::get(&storage, id + 1).unwrap().is_none());

        storage.update_published(id, true).unwrap();
        assert_eq!(storage.bulk_unpublish_by_author(user.id).unwrap(), 1);
        assert!(!PostStore::get(&storage, id).unwrap().unwrap().published);
        assert!(matches!(
            storage.update_published(id + 1, true),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_fame_upsert_replaces_level() {
        let (storage, user) = storage_with_user();
        storage
            .upsert(user.id, 3, &FameLevel::new("Expert", 50))
            .unwrap();
        storage
            .upsert(user.id, 3, &FameLevel::new("Confuser", -10))
            .unwrap();

        let records = storage.list_for_user(user.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fame_level.name, "Confuser");
        assert_eq!(storage.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_username_is_constraint_violation() {
        let (storage, _) = storage_with_user();
        assert!(matches!(
            UserStore::create(&storage, "TestUser", Utc::now()),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_compare_and_set_detects_stale_level() {
        let (storage, user) = storage_with_user();
        let insider = FameLevel::new("Insider", 10);
        let dubious = FameLevel::new("Dubious", -2);

        storage.compare_and_set(user.id, 1, None, &insider).unwrap();
        assert!(matches!(
            storage.compare_and_set(user.id, 1, None, &dubious),
            Err(StoreError::Conflict(_))
        ));
        storage
            .compare_and_set(user.id, 1, Some(&insider), &dubious)
            .unwrap();
        assert!(matches!(
            storage.compare_and_set(user.id, 1, Some(&insider), &dubious),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            ReputationStore::get(&storage, user.id, 1)
                .unwrap()
                .unwrap()
                .fame_level,
            dubious
        );
    }

    #[test]
    fn test_inactive_author_cannot_post() {
        let (storage, user) = storage_with_user();
        storage.deactivate(user.id).unwrap();

        let post = NewPost {
            author: user.id,
            content: "still here".to_string(),
            cites: None,
            replies_to: None,
            published: true,
            submitted_at: Utc::now(),
            classification: vec![],
        };
        assert_eq!(
            PostStore::create(&storage, post.clone()),
            Err(StoreError::Inactive(user.id))
        );
        assert!(matches!(
            PostStore::create(&storage, NewPost { author: 999, ..post }),
            Err(StoreError::Constraint(_))
        ));
        assert!(storage.list_by_author(user.id).unwrap().is_empty());
    }

    #[test]
    fn test_migrations_are_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fame.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            UserStore::create(&storage, "alice", Utc::now()).unwrap();
        }
        let reopened = SqliteStorage::open(&path).unwrap();
        assert!(reopened.find_by_username("alice").unwrap().is_some());
    }
}
