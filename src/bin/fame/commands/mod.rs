//! Subcommand implementations

pub mod config;
pub mod grant;
pub mod leaderboard;
pub mod rate;
pub mod register;
pub mod status;
pub mod submit;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use serde::Serialize;

use fame_moderation::{Config, ReputationService, SqliteStorage, User};

/// Everything a command needs: the wired service and output mode
pub struct Context {
    pub config: Config,
    pub database: String,
    pub service: ReputationService,
    pub json: bool,
}

impl Context {
    pub fn open(config_path: &Path, database: Option<&str>, json: bool) -> Result<Self> {
        let config = Config::load_from(config_path)?;
        let database = database
            .map(str::to_string)
            .unwrap_or_else(|| config.database_path());

        let storage = Arc::new(
            SqliteStorage::open(&database)
                .with_context(|| format!("Failed to open database {}", database))?,
        );
        let service = ReputationService::with_store(
            storage,
            Arc::new(config.classifier()?),
            config.fame_ladder()?,
            config.hierarchy()?,
        )
        .with_max_conflict_retries(config.moderation.max_conflict_retries);

        Ok(Self {
            config,
            database,
            service,
            json,
        })
    }

    pub fn user(&self, username: &str) -> Result<User> {
        self.service
            .find_user(username)?
            .ok_or_else(|| anyhow!("Unknown user '{}'", username))
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
