//! Reputation service - moderation orchestrator
//!
//! Runs post submissions through classification, the publish decision and
//! fame demotion, and owns the ban cascade. Every mutation for a user runs
//! under that user's lock and is retried as a whole on store conflicts.
//!
//! The lock only orders callers sharing this service. Writers in other
//! processes are caught by the store: fame moves are compare-and-set and
//! posts are only inserted for active authors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_MAX_CONFLICT_RETRIES;
use crate::error::{FameError, Result, StoreError};
use crate::expertise::{AreaId, ExpertiseAreaHierarchy};
use crate::ladder::{FameLadder, FameLevel};
use crate::ranking::{self, Leaderboard};
use crate::store::{Classifier, PostStore, ReputationStore, UserStore};
use crate::types::{
    AreaRating, FameProfile, FameRecord, NewPost, Post, PostId, PostOutcome, RatingOutcome,
    SubmitOutcome, User, UserId,
};

/// Outcome of moving one user one rung down in one area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Demotion {
    /// No record existed; one was created at the ladder floor
    Seeded(FameLevel),
    Demoted { from: FameLevel, to: FameLevel },
    /// Already at the floor; the user has to be banned
    Banned,
}

#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn lock_for(&self, user: UserId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(user).or_default().clone()
    }
}

/// Work already committed by a submission, kept across conflict retries
#[derive(Default)]
struct SubmitProgress {
    post: Option<PostOutcome>,
    settled_areas: HashSet<AreaId>,
    banned: bool,
}

struct Draft<'a> {
    content: &'a str,
    cites: Option<PostId>,
    replies_to: Option<PostId>,
    classification: Vec<AreaRating>,
    has_bullshit: bool,
}

pub struct ReputationService {
    reputation: Arc<dyn ReputationStore>,
    posts: Arc<dyn PostStore>,
    users: Arc<dyn UserStore>,
    classifier: Arc<dyn Classifier>,
    ladder: FameLadder,
    hierarchy: ExpertiseAreaHierarchy,
    max_conflict_retries: u32,
    locks: UserLocks,
}

impl ReputationService {
    pub fn new(
        reputation: Arc<dyn ReputationStore>,
        posts: Arc<dyn PostStore>,
        users: Arc<dyn UserStore>,
        classifier: Arc<dyn Classifier>,
        ladder: FameLadder,
        hierarchy: ExpertiseAreaHierarchy,
    ) -> Self {
        Self {
            reputation,
            posts,
            users,
            classifier,
            ladder,
            hierarchy,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            locks: UserLocks::default(),
        }
    }

    /// Wire all three stores to one backend
    pub fn with_store<S>(
        store: Arc<S>,
        classifier: Arc<dyn Classifier>,
        ladder: FameLadder,
        hierarchy: ExpertiseAreaHierarchy,
    ) -> Self
    where
        S: ReputationStore + PostStore + UserStore + 'static,
    {
        Self::new(
            store.clone(),
            store.clone(),
            store,
            classifier,
            ladder,
            hierarchy,
        )
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn ladder(&self) -> &FameLadder {
        &self.ladder
    }

    pub fn hierarchy(&self) -> &ExpertiseAreaHierarchy {
        &self.hierarchy
    }

    pub fn register_user(&self, username: &str) -> Result<User> {
        let user = self
            .users
            .create(username, Utc::now())
            .map_err(|err| match err {
                StoreError::Constraint(_) => FameError::UsernameTaken(username.to_string()),
                other => other.into(),
            })?;
        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.find_by_username(username)?)
    }

    /// Submit a post for publication.
    ///
    /// A post is published only if no classified area is rated as bullshit
    /// and the author has no negative fame in any classified area. Each
    /// area rated as bullshit then costs the author one fame rung; an
    /// author already on the floor is banned and loses all publications.
    pub fn submit_post(
        &self,
        author: UserId,
        content: &str,
        cites: Option<PostId>,
        replies_to: Option<PostId>,
    ) -> Result<SubmitOutcome> {
        let classification = self.classifier.classify(content);
        if let Some(unknown) = classification
            .iter()
            .find(|r| !self.hierarchy.contains(r.expertise_area))
        {
            return Err(FameError::UnknownArea(unknown.expertise_area));
        }
        for reference in [cites, replies_to].into_iter().flatten() {
            if self.posts.get(reference)?.is_none() {
                return Err(FameError::PostNotFound(reference));
            }
        }

        let draft = Draft {
            content,
            cites,
            replies_to,
            has_bullshit: classification.iter().any(|r| r.truth_rating.is_bullshit()),
            classification,
        };

        let mut progress = SubmitProgress::default();
        self.with_user_transaction(author, || {
            self.run_submission(author, &draft, &mut progress)
        })
    }

    fn run_submission(
        &self,
        author: UserId,
        draft: &Draft<'_>,
        progress: &mut SubmitProgress,
    ) -> Result<SubmitOutcome> {
        let post = match progress.post {
            Some(post) => post,
            None => {
                self.active_user(author)?;

                // Standing before this submission touches any record.
                let standing = self.reputation.list_for_user(author)?;
                let censored = is_pre_censored(&standing, &draft.classification);
                let published = !draft.has_bullshit && !censored;

                let id = self.posts.create(NewPost {
                    author,
                    content: draft.content.to_string(),
                    cites: draft.cites,
                    replies_to: draft.replies_to,
                    published,
                    submitted_at: Utc::now(),
                    classification: draft.classification.clone(),
                })?;

                if published {
                    info!("Post {} by user {} published", id, author);
                } else {
                    info!(
                        "Post {} by user {} blocked (bullshit: {}, pre-censored: {})",
                        id, author, draft.has_bullshit, censored
                    );
                }

                let outcome = PostOutcome { published, id };
                progress.post = Some(outcome);
                outcome
            }
        };

        if draft.has_bullshit && !progress.banned {
            for rating in draft
                .classification
                .iter()
                .filter(|r| r.truth_rating.is_bullshit())
            {
                let area = rating.expertise_area;
                if progress.settled_areas.contains(&area) {
                    continue;
                }

                match self.demote(author, area)? {
                    Demotion::Banned => {
                        self.ban(author)?;
                        progress.banned = true;
                        break;
                    }
                    Demotion::Seeded(_) | Demotion::Demoted { .. } => {
                        progress.settled_areas.insert(area);
                    }
                }
            }
        }

        Ok(SubmitOutcome {
            post,
            classification: draft.classification.clone(),
            banned: progress.banned,
        })
    }

    /// Move `user` one rung down the ladder in `area`.
    ///
    /// Does not ban: a [`Demotion::Banned`] result leaves the caller to run
    /// the ban cascade.
    pub fn demote(&self, user: UserId, area: AreaId) -> Result<Demotion> {
        let Some(record) = self.reputation.get(user, area)? else {
            let floor = self.ladder.floor_level().clone();
            self.reputation.compare_and_set(user, area, None, &floor)?;
            info!(
                "User {} enters {} at fame level {} ({})",
                user,
                self.area_label(area),
                floor.name,
                floor.numeric_value
            );
            return Ok(Demotion::Seeded(floor));
        };

        match self.ladder.next_lower(&record.fame_level) {
            Ok(lower) => {
                let lower = lower.clone();
                self.reputation
                    .compare_and_set(user, area, Some(&record.fame_level), &lower)?;
                info!(
                    "User {} demoted in {}: {} -> {}",
                    user,
                    self.area_label(area),
                    record.fame_level.name,
                    lower.name
                );
                Ok(Demotion::Demoted {
                    from: record.fame_level,
                    to: lower,
                })
            }
            Err(floor) => {
                debug!("User {} cannot be demoted further: {}", user, floor);
                Ok(Demotion::Banned)
            }
        }
    }

    /// Deactivate the user and unpublish everything they ever posted
    fn ban(&self, user: UserId) -> Result<()> {
        self.users.deactivate(user)?;
        let unpublished = self.posts.bulk_unpublish_by_author(user)?;
        warn!(
            "User {} banned, {} published posts withdrawn",
            user, unpublished
        );
        Ok(())
    }

    /// Rate someone else's post; rating one's own post is refused.
    pub fn rate_post(
        &self,
        user: UserId,
        post: PostId,
        rating_type: &str,
        score: i32,
    ) -> Result<RatingOutcome> {
        self.with_user_transaction(user, || {
            self.active_user(user)?;
            let target = self
                .posts
                .get(post)?
                .ok_or(FameError::PostNotFound(post))?;
            if target.author == user {
                return Err(FameError::SelfActionNotAllowed { user, post });
            }
            let outcome = self.posts.upsert_rating(user, post, rating_type, score)?;
            debug!(
                "User {} rated post {} ({}={}): {:?}",
                user, post, rating_type, score, outcome
            );
            Ok(outcome)
        })
    }

    /// Administrative fame assignment, e.g. to promote a recognised expert.
    pub fn grant_fame(&self, user: UserId, area: AreaId, level_name: &str) -> Result<FameRecord> {
        if !self.hierarchy.contains(area) {
            return Err(FameError::UnknownArea(area));
        }
        let level = self
            .ladder
            .by_name(level_name)
            .ok_or_else(|| FameError::UnknownLevel(level_name.to_string()))?
            .clone();

        self.with_user_transaction(user, || {
            self.existing_user(user)?;
            self.reputation.upsert(user, area, &level)?;
            info!(
                "User {} granted {} ({}) in {}",
                user,
                level.name,
                level.numeric_value,
                self.area_label(area)
            );
            Ok(FameRecord {
                user,
                expertise_area: area,
                fame_level: level.clone(),
            })
        })
    }

    pub fn fame_profile(&self, user: UserId) -> Result<FameProfile> {
        let user = self.existing_user(user)?;
        let records = self.reputation.list_for_user(user.id)?;
        Ok(FameProfile { user, records })
    }

    pub fn posts_by(&self, author: UserId) -> Result<Vec<Post>> {
        self.existing_user(author)?;
        Ok(self.posts.list_by_author(author)?)
    }

    pub fn rank_experts(&self) -> Result<Leaderboard> {
        Ok(ranking::rank_experts(
            &*self.reputation,
            &*self.users,
            &self.hierarchy,
        )?)
    }

    pub fn rank_bullshitters(&self) -> Result<Leaderboard> {
        Ok(ranking::rank_bullshitters(
            &*self.reputation,
            &*self.users,
            &self.hierarchy,
        )?)
    }

    fn existing_user(&self, user: UserId) -> Result<User> {
        self.users.get(user)?.ok_or(FameError::UserNotFound(user))
    }

    fn active_user(&self, user: UserId) -> Result<User> {
        let found = self.existing_user(user)?;
        if !found.is_active {
            return Err(FameError::UserInactive(user));
        }
        Ok(found)
    }

    fn area_label(&self, area: AreaId) -> String {
        self.hierarchy
            .label(area)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", area))
    }

    /// Run `op` under `user`'s lock, re-running it after store conflicts.
    fn with_user_transaction<T>(
        &self,
        user: UserId,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        // Locks are only handed out for users that exist.
        self.existing_user(user)?;
        let lock = self.locks.lock_for(user);
        let _guard = lock.lock();

        let attempts = self.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            match op() {
                Err(FameError::Store(StoreError::Conflict(reason))) => {
                    warn!(
                        "Store conflict for user {} (attempt {}/{}): {}",
                        user, attempt, attempts, reason
                    );
                }
                other => return other,
            }
        }

        Err(FameError::Transient { user, attempts })
    }
}

/// True if the author already has negative fame in any classified area.
fn is_pre_censored(standing: &[FameRecord], classification: &[AreaRating]) -> bool {
    classification.iter().any(|rating| {
        standing.iter().any(|fame| {
            fame.expertise_area == rating.expertise_area && fame.fame_level.is_negative()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expertise::ExpertiseArea;
    use crate::memory::MemoryStore;
    use crate::types::TruthRating;

    const PHYSICS: AreaId = 1;
    const HISTORY: AreaId = 2;

    fn ladder() -> FameLadder {
        FameLadder::new(vec![
            FameLevel::new("Expert", 50),
            FameLevel::new("Insider", 10),
            FameLevel::new("Dubious", -2),
            FameLevel::new("Confuser", -10),
        ])
        .unwrap()
    }

    fn hierarchy() -> ExpertiseAreaHierarchy {
        ExpertiseAreaHierarchy::new(vec![
            ExpertiseArea {
                id: PHYSICS,
                label: "Physics".to_string(),
                parent: None,
            },
            ExpertiseArea {
                id: HISTORY,
                label: "History".to_string(),
                parent: None,
            },
        ])
        .unwrap()
    }

    /// Classifies "area:value" tokens, e.g. "1:-5 2:7".
    fn token_classifier(content: &str) -> Vec<AreaRating> {
        content
            .split_whitespace()
            .filter_map(|token| {
                let (area, value) = token.split_once(':')?;
                let value: i32 = value.parse().ok()?;
                Some(AreaRating::new(
                    area.parse().ok()?,
                    TruthRating::new("rated", value),
                ))
            })
            .collect()
    }

    fn service() -> (ReputationService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = ReputationService::with_store(
            store.clone(),
            Arc::new(token_classifier),
            ladder(),
            hierarchy(),
        );
        (service, store)
    }

    #[test]
    fn test_demote_seeds_then_steps_then_signals_ban() {
        let (service, store) = service();
        let user = service.register_user("u").unwrap();
        store
            .upsert(user.id, PHYSICS, &FameLevel::new("Insider", 10))
            .unwrap();

        assert_eq!(
            service.demote(user.id, PHYSICS).unwrap(),
            Demotion::Demoted {
                from: FameLevel::new("Insider", 10),
                to: FameLevel::new("Dubious", -2),
            }
        );
        assert_eq!(
            service.demote(user.id, HISTORY).unwrap(),
            Demotion::Seeded(FameLevel::new("Confuser", -10))
        );
        assert_eq!(service.demote(user.id, HISTORY).unwrap(), Demotion::Banned);
        // Signalling a ban does not apply it.
        assert!(UserStore::get(&*store, user.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_repeated_area_in_classification_demotes_once() {
        let (service, store) = service();
        let user = service.register_user("u").unwrap();
        store
            .upsert(user.id, PHYSICS, &FameLevel::new("Expert", 50))
            .unwrap();

        let outcome = service
            .submit_post(user.id, "1:-5 1:-8", None, None)
            .unwrap();
        assert!(!outcome.banned);
        assert_eq!(
            ReputationStore::get(&*store, user.id, PHYSICS)
                .unwrap()
                .unwrap()
                .fame_level
                .name,
            "Insider"
        );
    }

    #[test]
    fn test_unknown_area_and_missing_references_rejected() {
        let (service, _) = service();
        let user = service.register_user("u").unwrap();

        assert_eq!(
            service.submit_post(user.id, "9:3", None, None).unwrap_err(),
            FameError::UnknownArea(9)
        );
        assert_eq!(
            service.submit_post(user.id, "1:3", Some(42), None).unwrap_err(),
            FameError::PostNotFound(42)
        );
        assert_eq!(
            service.submit_post(777, "1:3", None, None).unwrap_err(),
            FameError::UserNotFound(777)
        );
    }

    #[test]
    fn test_unknown_users_get_no_lock() {
        let (service, _) = service();
        let user = service.register_user("u").unwrap();

        for ghost in [777, 778, 779] {
            assert_eq!(
                service.submit_post(ghost, "1:3", None, None).unwrap_err(),
                FameError::UserNotFound(ghost)
            );
            assert!(service.rate_post(ghost, 1, "truth", 1).is_err());
        }
        assert!(service.locks.locks.lock().is_empty());

        service.submit_post(user.id, "1:3", None, None).unwrap();
        assert_eq!(service.locks.locks.lock().len(), 1);
    }

    #[test]
    fn test_taken_username_is_reported() {
        let (service, _) = service();
        service.register_user("alice").unwrap();
        assert_eq!(
            service.register_user("Alice").unwrap_err(),
            FameError::UsernameTaken("Alice".to_string())
        );
    }

    #[test]
    fn test_banned_user_cannot_submit() {
        let (service, store) = service();
        let user = service.register_user("u").unwrap();
        store.deactivate(user.id).unwrap();

        assert_eq!(
            service.submit_post(user.id, "1:3", None, None).unwrap_err(),
            FameError::UserInactive(user.id)
        );
    }

    #[test]
    fn test_rate_own_post_is_refused() {
        let (service, store) = service();
        let author = service.register_user("author").unwrap();
        let reader = service.register_user("reader").unwrap();
        let post = service
            .submit_post(author.id, "2:7", None, None)
            .unwrap()
            .post
            .id;

        let err = service.rate_post(author.id, post, "truth", 5).unwrap_err();
        assert_eq!(
            err,
            FameError::SelfActionNotAllowed {
                user: author.id,
                post
            }
        );
        assert!(err.is_permission_error());

        assert_eq!(
            service.rate_post(reader.id, post, "truth", 5).unwrap(),
            RatingOutcome::New
        );
        assert_eq!(
            service.rate_post(reader.id, post, "truth", 2).unwrap(),
            RatingOutcome::Updated
        );
        assert_eq!(store.rating(reader.id, post, "truth"), Some(2));
    }

    #[test]
    fn test_grant_fame_validates_inputs() {
        let (service, _) = service();
        let user = service.register_user("u").unwrap();

        let record = service.grant_fame(user.id, PHYSICS, "expert").unwrap();
        assert_eq!(record.fame_level.numeric_value, 50);
        assert_eq!(
            service.grant_fame(user.id, 99, "Expert").unwrap_err(),
            FameError::UnknownArea(99)
        );
        assert_eq!(
            service.grant_fame(user.id, PHYSICS, "Wizard").unwrap_err(),
            FameError::UnknownLevel("Wizard".to_string())
        );
        assert_eq!(
            service.grant_fame(404, PHYSICS, "Expert").unwrap_err(),
            FameError::UserNotFound(404)
        );

        let profile = service.fame_profile(user.id).unwrap();
        assert_eq!(profile.records.len(), 1);
    }

    #[test]
    fn test_pre_censorship_only_matches_classified_areas() {
        let standing = vec![FameRecord {
            user: 1,
            expertise_area: HISTORY,
            fame_level: FameLevel::new("Dubious", -2),
        }];
        let physics = vec![AreaRating::new(PHYSICS, TruthRating::new("true", 5))];
        let history = vec![AreaRating::new(HISTORY, TruthRating::new("true", 5))];
        assert!(!is_pre_censored(&standing, &physics));
        assert!(is_pre_censored(&standing, &history));
    }
}
