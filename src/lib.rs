//! Fame Moderation - Reputation-driven publishing per expertise area
//!
//! Every post is classified into expertise areas with a truth rating. A
//! user's fame in each area decides whether their content may be
//! published, and false content costs fame until the account is banned.
//!
//! # How it works
//!
//! 1. The classifier rates a submitted post per expertise area
//! 2. The post is published only if no rating is negative and the author
//!    has no negative fame in any of the classified areas
//! 3. Each negatively rated area demotes the author one rung on the fame
//!    ladder, starting at the floor level for first offenders
//! 4. An author already on the floor is banned: the account is deactivated
//!    and every post they ever wrote is unpublished
//! 5. Experts and bullshitters leaderboards rank users per area by fame
//!
//! # Anti-abuse measures
//!
//! - Users with negative fame in an area are censored there even for true content
//! - One ladder step per area per submission, however false the content
//! - Nobody can rate their own posts
//! - A post's published flag only ever changes when its author is banned
//! - Per-user serialization of every fame and ban transition

pub mod classifier;
pub mod config;
pub mod error;
pub mod expertise;
pub mod ladder;
pub mod memory;
pub mod ranking;
pub mod service;
pub mod storage;
pub mod store;
pub mod types;

pub use classifier::{KeywordClassifier, KeywordRule};
pub use config::Config;
pub use error::{FameError, StoreError};
pub use expertise::{AreaId, AreaPath, ExpertiseArea, ExpertiseAreaHierarchy, HierarchyError};
pub use ladder::{FameLadder, FameLevel, LadderError, NoLowerLevel};
pub use memory::MemoryStore;
pub use ranking::{by_label, AreaRanking, Leaderboard, RankedUser};
pub use service::{Demotion, ReputationService};
pub use storage::SqliteStorage;
pub use store::{Classifier, PostStore, ReputationStore, UserStore};
pub use types::{
    AreaRating, FameProfile, FameRecord, NewPost, Post, PostId, PostOutcome, RatingOutcome,
    SubmitOutcome, TruthRating, User, UserId,
};
