//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - SQLite database location
//! - Conflict retry budget for moderation transactions
//! - The fame ladder and expertise area hierarchy
//! - Keyword classifier rules

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classifier::{KeywordClassifier, KeywordRule};
use crate::expertise::{ExpertiseArea, ExpertiseAreaHierarchy};
use crate::ladder::{FameLadder, FameLevel};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    pub ladder: Vec<FameLevel>,
    #[serde(default)]
    pub areas: Vec<ExpertiseArea>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Database configuration (FAME_DATABASE env var takes precedence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "fame.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Extra attempts for a single-user transaction after a store conflict
    pub max_conflict_retries: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub rules: Vec<KeywordRule>,
}

impl Config {
    /// Load from `path`, falling back to the embedded defaults if it is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            // Use embedded default config
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")
        }
    }

    /// Get database path (env var takes precedence)
    pub fn database_path(&self) -> String {
        match std::env::var("FAME_DATABASE") {
            Ok(path) if !path.is_empty() => path,
            _ => self.database.path.clone(),
        }
    }

    pub fn fame_ladder(&self) -> Result<FameLadder> {
        FameLadder::new(self.ladder.clone()).context("Invalid fame ladder in config")
    }

    pub fn hierarchy(&self) -> Result<ExpertiseAreaHierarchy> {
        ExpertiseAreaHierarchy::new(self.areas.clone())
            .context("Invalid expertise areas in config")
    }

    /// Keyword classifier, after checking every rule targets a known area
    pub fn classifier(&self) -> Result<KeywordClassifier> {
        if let Some(rule) = self
            .classifier
            .rules
            .iter()
            .find(|r| !self.areas.iter().any(|a| a.id == r.area))
        {
            anyhow::bail!(
                "Classifier rule '{}' targets unknown expertise area {}",
                rule.keyword,
                rule.area
            );
        }
        Ok(KeywordClassifier::new(self.classifier.rules.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_config_is_valid() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        let ladder = config.fame_ladder().unwrap();
        assert_eq!(ladder.floor_level(), &FameLevel::new("Confuser", -10));
        assert!(!config.hierarchy().unwrap().is_empty());
        assert!(!config.classifier().unwrap().rules().is_empty());
        assert_eq!(config.moderation.max_conflict_retries, 3);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = Config::load_from("/definitely/not/here/config.toml").unwrap();
        assert_eq!(config.database.path, "fame.db");
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [[ladder]]
            name = "Confuser"
            numeric_value = -10

            [[areas]]
            id = 1
            label = "Physics"

            [[classifier.rules]]
            keyword = "perpetual motion"
            area = 2
            rating_name = "False"
            rating_value = -3
            "#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.moderation.max_conflict_retries, DEFAULT_MAX_CONFLICT_RETRIES);
        assert_eq!(config.hierarchy().unwrap().len(), 1);
        assert!(config.classifier().is_err());
    }
}
