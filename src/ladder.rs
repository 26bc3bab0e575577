//! Fame level ladder
//!
//! A fixed, totally ordered scale of named levels. Demotion walks it one
//! rung at a time; stepping below the floor is impossible and is what
//! turns a demotion into a ban.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FameLevel {
    pub name: String,
    pub numeric_value: i32,
}

impl FameLevel {
    pub fn new(name: impl Into<String>, numeric_value: i32) -> Self {
        Self {
            name: name.into(),
            numeric_value,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.numeric_value < 0
    }
}

/// Returned by [`FameLadder::next_lower`] when the level is already the floor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fame level '{level}' is the floor, no lower level exists")]
pub struct NoLowerLevel {
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LadderError {
    #[error("fame ladder has no levels")]
    Empty,

    #[error("fame value {0} is used by more than one level")]
    DuplicateValue(i32),

    #[error("fame level name '{0}' is used more than once")]
    DuplicateName(String),
}

#[derive(Debug, Clone)]
pub struct FameLadder {
    /// Sorted by `numeric_value` ascending; index 0 is the floor.
    levels: Vec<FameLevel>,
}

impl FameLadder {
    pub fn new(mut levels: Vec<FameLevel>) -> Result<Self, LadderError> {
        if levels.is_empty() {
            return Err(LadderError::Empty);
        }

        levels.sort_by_key(|l| l.numeric_value);
        for pair in levels.windows(2) {
            if pair[0].numeric_value == pair[1].numeric_value {
                return Err(LadderError::DuplicateValue(pair[0].numeric_value));
            }
        }
        for (i, level) in levels.iter().enumerate() {
            if levels[..i].iter().any(|l| l.name == level.name) {
                return Err(LadderError::DuplicateName(level.name.clone()));
            }
        }

        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[FameLevel] {
        &self.levels
    }

    pub fn floor_level(&self) -> &FameLevel {
        &self.levels[0]
    }

    pub fn ceiling_level(&self) -> &FameLevel {
        &self.levels[self.levels.len() - 1]
    }

    pub fn is_floor(&self, level: &FameLevel) -> bool {
        level.numeric_value <= self.floor_level().numeric_value
    }

    /// Level with the greatest value strictly below `level`.
    pub fn next_lower(&self, level: &FameLevel) -> Result<&FameLevel, NoLowerLevel> {
        self.levels
            .iter()
            .rev()
            .find(|l| l.numeric_value < level.numeric_value)
            .ok_or_else(|| NoLowerLevel {
                level: level.name.clone(),
            })
    }

    pub fn by_name(&self, name: &str) -> Option<&FameLevel> {
        self.levels.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }

    pub fn by_value(&self, numeric_value: i32) -> Option<&FameLevel> {
        self.levels.iter().find(|l| l.numeric_value == numeric_value)
    }

    /// Number of rungs between `level` and the floor.
    pub fn steps_above_floor(&self, level: &FameLevel) -> usize {
        self.levels
            .iter()
            .filter(|l| l.numeric_value < level.numeric_value)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> FameLadder {
        FameLadder::new(vec![
            FameLevel::new("Expert", 50),
            FameLevel::new("Confuser", -10),
            FameLevel::new("Insider", 10),
            FameLevel::new("Dubious", -2),
        ])
        .unwrap()
    }

    #[test]
    fn test_floor_and_ceiling() {
        let ladder = ladder();
        assert_eq!(ladder.floor_level().name, "Confuser");
        assert_eq!(ladder.ceiling_level().name, "Expert");
    }

    #[test]
    fn test_next_lower_picks_closest_smaller_value() {
        let ladder = ladder();
        let expert = ladder.by_name("Expert").unwrap().clone();
        assert_eq!(ladder.next_lower(&expert).unwrap().name, "Insider");

        let floor = ladder.floor_level().clone();
        assert_eq!(
            ladder.next_lower(&floor).unwrap_err(),
            NoLowerLevel {
                level: "Confuser".to_string()
            }
        );
    }

    #[test]
    fn test_repeated_steps_reach_floor_in_rank_steps() {
        let ladder = ladder();
        for start in ladder.levels() {
            let mut current = start.clone();
            let mut steps = 0;
            while let Ok(next) = ladder.next_lower(&current) {
                assert!(next.numeric_value < current.numeric_value);
                current = next.clone();
                steps += 1;
            }
            assert!(ladder.is_floor(&current));
            assert_eq!(steps, ladder.steps_above_floor(start));
        }
    }

    #[test]
    fn test_rejects_invalid_ladders() {
        assert_eq!(FameLadder::new(vec![]).unwrap_err(), LadderError::Empty);
        assert_eq!(
            FameLadder::new(vec![FameLevel::new("A", 1), FameLevel::new("B", 1)]).unwrap_err(),
            LadderError::DuplicateValue(1)
        );
        assert_eq!(
            FameLadder::new(vec![FameLevel::new("A", 1), FameLevel::new("A", 2)]).unwrap_err(),
            LadderError::DuplicateName("A".to_string())
        );
    }
}
