//! Config command - show ladder, areas and classifier rules

use crate::commands::Context;
use crate::style::*;
use anyhow::Result;

pub fn run(ctx: &Context) -> Result<()> {
    let ladder = ctx.service.ladder();
    let hierarchy = ctx.service.hierarchy();

    if ctx.json {
        let areas: Vec<_> = hierarchy
            .iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "label": a.label,
                    "parent_expertise_area": hierarchy
                        .path(a.id)
                        .and_then(|p| p.parent_expertise_area),
                })
            })
            .collect();
        return ctx.print_json(&serde_json::json!({
            "database": ctx.database,
            "max_conflict_retries": ctx.config.moderation.max_conflict_retries,
            "ladder": ladder.levels(),
            "areas": areas,
            "classifier_rules": ctx.config.classifier.rules,
        }));
    }

    print_header("Fame Ladder");
    for level in ladder.levels().iter().rev() {
        let marker = if ladder.is_floor(level) {
            style_red(" floor, next offence bans")
        } else if level == ladder.ceiling_level() {
            style_green(" ceiling")
        } else {
            String::new()
        };
        println!(
            "  {:>6}  {:<14} {}{}",
            style_fame(level.numeric_value),
            level.name,
            style_dim(&format!("{} steps above floor", ladder.steps_above_floor(level))),
            marker
        );
    }

    print_header("Expertise Areas");
    for area in hierarchy.iter() {
        let path = hierarchy
            .lineage(area.id)
            .iter()
            .rev()
            .map(|a| a.label.as_str())
            .collect::<Vec<_>>()
            .join(" › ");
        println!("  {:>3}  {}", area.id, path);
    }

    println!();
    println!("Database:          {}", style_cyan(&ctx.database));
    println!("Classifier rules:  {}", ctx.config.classifier.rules.len());
    println!(
        "Conflict retries:  {}",
        ctx.config.moderation.max_conflict_retries
    );
    Ok(())
}
