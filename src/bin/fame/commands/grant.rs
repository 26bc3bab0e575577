//! Grant command - administrative fame assignment

use crate::commands::Context;
use crate::style::*;
use anyhow::{anyhow, Result};
use fame_moderation::AreaId;

pub fn run(ctx: &Context, username: &str, area: &str, level: &str) -> Result<()> {
    let user = ctx.user(username)?;
    let hierarchy = ctx.service.hierarchy();

    let area_id: AreaId = match area.parse() {
        Ok(id) => id,
        Err(_) => {
            hierarchy
                .find_by_label(area)
                .ok_or_else(|| anyhow!("Unknown expertise area '{}'", area))?
                .id
        }
    };

    let record = ctx.service.grant_fame(user.id, area_id, level)?;

    if ctx.json {
        return ctx.print_json(&record);
    }

    print_success(&format!(
        "@{} is now {} ({}) in {}",
        user.username,
        style_bold(&record.fame_level.name),
        style_fame(record.fame_level.numeric_value),
        hierarchy.label(area_id).unwrap_or(area)
    ));
    Ok(())
}
