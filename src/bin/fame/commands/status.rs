//! Status command - fame profile of a user

use crate::commands::Context;
use crate::style::*;
use anyhow::Result;

pub fn run(ctx: &Context, username: &str) -> Result<()> {
    let user = ctx.user(username)?;
    let profile = ctx.service.fame_profile(user.id)?;
    let posts = ctx.service.posts_by(user.id)?;

    if ctx.json {
        return ctx.print_json(&serde_json::json!({
            "profile": profile,
            "posts": posts,
        }));
    }

    print_header("User Status");
    println!("Username:   @{}", style_cyan(&profile.user.username));
    println!(
        "Joined:     {}",
        profile.user.date_joined.format("%Y-%m-%d %H:%M UTC")
    );
    if profile.user.is_active {
        println!("Account:    {}", style_green("active"));
    } else {
        println!("Account:    {}", style_red("banned"));
    }

    let published = posts.iter().filter(|p| p.published).count();
    println!(
        "Posts:      {} ({} published, {} withheld)",
        style_bold(&posts.len().to_string()),
        published,
        posts.len() - published
    );

    println!();
    if profile.records.is_empty() {
        print_info("No fame recorded yet.");
        return Ok(());
    }

    let hierarchy = ctx.service.hierarchy();
    println!("{:<28}  {:<14}  {:>6}", "Expertise Area", "Level", "Fame");
    println!("{}", "─".repeat(52));
    for record in &profile.records {
        let area = hierarchy
            .lineage(record.expertise_area)
            .iter()
            .rev()
            .map(|a| a.label.as_str())
            .collect::<Vec<_>>()
            .join(" › ");
        println!(
            "{:<28}  {:<14}  {:>6}",
            area,
            record.fame_level.name,
            style_fame(record.fame_level.numeric_value)
        );
    }

    if profile.records.iter().any(|r| r.fame_level.is_negative()) && profile.user.is_active {
        println!();
        print_warning("Posts in areas with negative fame are not published");
        println!("  A further false post in those areas bans the account");
    }

    Ok(())
}
