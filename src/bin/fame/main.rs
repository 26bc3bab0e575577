//! Fame CLI
//!
//! Command-line interface for the fame moderation engine.

mod commands;
mod style;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use style::*;
use tracing_subscriber::EnvFilter;

use fame_moderation::PostId;

#[derive(Parser)]
#[command(name = "fame")]
#[command(author = "CortexLM")]
#[command(version)]
#[command(about = "Fame Moderation - Reputation-driven publishing per expertise area", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        env = "FAME_CONFIG",
        default_value = "config.toml",
        global = true
    )]
    config: PathBuf,

    /// SQLite database path (overrides config and FAME_DATABASE)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply migrations
    Init,

    /// Register a new user
    #[command(visible_alias = "r")]
    Register { username: String },

    /// Assign a fame level to a user in an expertise area
    Grant {
        username: String,
        /// Expertise area id or label
        area: String,
        /// Fame level name from the ladder
        level: String,
    },

    /// Submit a post for moderation
    #[command(visible_alias = "s")]
    Submit {
        username: String,
        content: String,
        /// Post this one cites
        #[arg(long)]
        cites: Option<PostId>,
        /// Post this one replies to
        #[arg(long)]
        replies_to: Option<PostId>,
    },

    /// Rate another user's post
    Rate {
        username: String,
        post: PostId,
        rating_type: String,
        #[arg(allow_hyphen_values = true)]
        score: i32,
    },

    /// Show a user's fame profile and posts
    #[command(visible_alias = "st")]
    Status { username: String },

    /// Leaderboard of users with positive fame
    Experts,

    /// Leaderboard of users with negative fame
    Bullshitters,

    /// Show the fame ladder and expertise areas
    Config,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match commands::Context::open(&cli.config, cli.database.as_deref(), cli.json) {
        Ok(ctx) => run(&ctx, cli.command),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(ctx: &commands::Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => commands::register::init(ctx),
        Commands::Register { username } => commands::register::run(ctx, &username),
        Commands::Grant {
            username,
            area,
            level,
        } => commands::grant::run(ctx, &username, &area, &level),
        Commands::Submit {
            username,
            content,
            cites,
            replies_to,
        } => commands::submit::run(ctx, &username, &content, cites, replies_to),
        Commands::Rate {
            username,
            post,
            rating_type,
            score,
        } => commands::rate::rate(ctx, &username, post, &rating_type, score),
        Commands::Status { username } => commands::status::run(ctx, &username),
        Commands::Experts => commands::leaderboard::experts(ctx),
        Commands::Bullshitters => commands::leaderboard::bullshitters(ctx),
        Commands::Config => commands::config::run(ctx),
    }
}
