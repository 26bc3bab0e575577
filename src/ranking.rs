//! Experts and bullshitters leaderboards
//!
//! Both boards are pure reads over the reputation store: records are
//! filtered by sign, grouped by expertise area id and sorted. Ties on fame
//! go to the most recently joined user.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::StoreResult;
use crate::expertise::{AreaId, ExpertiseAreaHierarchy};
use crate::store::{ReputationStore, UserStore};
use crate::types::{User, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedUser {
    pub rank: u32,
    pub user: UserId,
    pub username: String,
    pub fame_level_numeric: i32,
    pub date_joined: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaRanking {
    pub area: AreaId,
    pub label: String,
    pub users: Vec<RankedUser>,
}

/// Rankings keyed by expertise area id. Areas without entries are absent.
pub type Leaderboard = BTreeMap<AreaId, AreaRanking>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Board {
    Experts,
    Bullshitters,
}

impl Board {
    fn qualifies(self, numeric_value: i32) -> bool {
        match self {
            Board::Experts => numeric_value > 0,
            Board::Bullshitters => numeric_value < 0,
        }
    }

    fn order(self, a: &RankedUser, b: &RankedUser) -> Ordering {
        let by_fame = match self {
            Board::Experts => b.fame_level_numeric.cmp(&a.fame_level_numeric),
            Board::Bullshitters => a.fame_level_numeric.cmp(&b.fame_level_numeric),
        };
        by_fame
            .then_with(|| b.date_joined.cmp(&a.date_joined))
            .then_with(|| a.user.cmp(&b.user))
    }
}

/// Users with positive fame per area, highest fame first.
pub fn rank_experts(
    reputation: &dyn ReputationStore,
    users: &dyn UserStore,
    hierarchy: &ExpertiseAreaHierarchy,
) -> StoreResult<Leaderboard> {
    build(Board::Experts, reputation, users, hierarchy)
}

/// Users with negative fame per area, most negative first.
pub fn rank_bullshitters(
    reputation: &dyn ReputationStore,
    users: &dyn UserStore,
    hierarchy: &ExpertiseAreaHierarchy,
) -> StoreResult<Leaderboard> {
    build(Board::Bullshitters, reputation, users, hierarchy)
}

/// Presentation view keyed by area label.
pub fn by_label(board: &Leaderboard) -> BTreeMap<String, Vec<RankedUser>> {
    board
        .values()
        .map(|ranking| (ranking.label.clone(), ranking.users.clone()))
        .collect()
}

fn build(
    board: Board,
    reputation: &dyn ReputationStore,
    users: &dyn UserStore,
    hierarchy: &ExpertiseAreaHierarchy,
) -> StoreResult<Leaderboard> {
    let mut known_users: HashMap<UserId, Option<User>> = HashMap::new();
    let mut leaderboard = Leaderboard::new();

    for record in reputation.list_all()? {
        if !board.qualifies(record.fame_level.numeric_value) {
            continue;
        }

        let user = match known_users.get(&record.user) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = users.get(record.user)?;
                known_users.insert(record.user, fetched.clone());
                fetched
            }
        };
        let Some(user) = user else {
            warn!("Fame record references missing user {}", record.user);
            continue;
        };

        let area = record.expertise_area;
        let entry = leaderboard.entry(area).or_insert_with(|| AreaRanking {
            area,
            label: hierarchy
                .label(area)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", area)),
            users: Vec::new(),
        });

        entry.users.push(RankedUser {
            rank: 0,
            user: user.id,
            username: user.username,
            fame_level_numeric: record.fame_level.numeric_value,
            date_joined: user.date_joined,
            is_active: user.is_active,
        });
    }

    for ranking in leaderboard.values_mut() {
        ranking.users.sort_by(|a, b| board.order(a, b));
        for (i, entry) in ranking.users.iter_mut().enumerate() {
            entry.rank = (i + 1) as u32;
        }
    }

    Ok(leaderboard)
}
