//! Leaderboard commands

use crate::commands::Context;
use crate::style::*;
use anyhow::Result;
use fame_moderation::{by_label, Leaderboard};

pub fn experts(ctx: &Context) -> Result<()> {
    let board = ctx.service.rank_experts()?;
    print_board(ctx, "Experts", &board, "No experts yet.")
}

pub fn bullshitters(ctx: &Context) -> Result<()> {
    let board = ctx.service.rank_bullshitters()?;
    print_board(ctx, "Bullshitters", &board, "No bullshitters. Yet.")
}

fn print_board(ctx: &Context, title: &str, board: &Leaderboard, empty: &str) -> Result<()> {
    if ctx.json {
        return ctx.print_json(&by_label(board));
    }

    print_header(title);

    if board.is_empty() {
        print_info(empty);
        return Ok(());
    }

    for ranking in board.values() {
        println!();
        println!("{}", style_bold(&ranking.label));
        println!("{:>4}  {:<18}  {:>6}  Joined", "Rank", "User", "Fame");
        println!("{}", "─".repeat(50));

        for entry in &ranking.users {
            let rank = format!("#{}", entry.rank);
            let rank_styled = if entry.rank == 1 {
                style_yellow(&rank)
            } else if entry.rank <= 3 {
                style_cyan(&rank)
            } else {
                rank
            };
            let name = if entry.is_active {
                entry.username.clone()
            } else {
                format!("{} (banned)", entry.username)
            };

            println!(
                "{:>4}  {:<18}  {:>6}  {}",
                rank_styled,
                name,
                style_fame(entry.fame_level_numeric),
                style_dim(&entry.date_joined.format("%Y-%m-%d").to_string())
            );
        }
    }

    println!();
    Ok(())
}
