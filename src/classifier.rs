//! Keyword classifier
//!
//! Configurable stand-in for a real content classifier: each rule maps a
//! case-insensitive keyword to an expertise area and a truth rating. Only
//! the first matching rule per area counts.

use serde::{Deserialize, Serialize};

use crate::expertise::AreaId;
use crate::store::Classifier;
use crate::types::{AreaRating, TruthRating};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub area: AreaId,
    pub rating_name: String,
    pub rating_value: i32,
}

#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
}

impl KeywordClassifier {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut r| {
                r.keyword = r.keyword.to_lowercase();
                r
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, content: &str) -> Vec<AreaRating> {
        let content = content.to_lowercase();
        let mut ratings: Vec<AreaRating> = Vec::new();

        for rule in &self.rules {
            if !content.contains(&rule.keyword) {
                continue;
            }
            if ratings.iter().any(|r| r.expertise_area == rule.area) {
                continue;
            }
            ratings.push(AreaRating::new(
                rule.area,
                TruthRating::new(rule.rating_name.clone(), rule.rating_value),
            ));
        }

        ratings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(keyword: &str, area: AreaId, value: i32) -> KeywordRule {
        KeywordRule {
            keyword: keyword.to_string(),
            area,
            rating_name: if value < 0 { "false" } else { "true" }.to_string(),
            rating_value: value,
        }
    }

    #[test]
    fn test_first_rule_per_area_wins() {
        let classifier = KeywordClassifier::new(vec![
            rule("Flat Earth", 1, -5),
            rule("earth", 1, 3),
            rule("pyramids", 2, 4),
        ]);

        let ratings = classifier.classify("The flat earth and the pyramids");
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].expertise_area, 1);
        assert!(ratings[0].truth_rating.is_bullshit());
        assert_eq!(ratings[1].expertise_area, 2);
        assert!(!ratings[1].truth_rating.is_bullshit());
    }

    #[test]
    fn test_no_match_is_empty() {
        let classifier = KeywordClassifier::new(vec![rule("physics", 1, 1)]);
        assert!(classifier.classify("cats are great").is_empty());
    }
}
