//! Register command - create the database and users

use crate::commands::Context;
use crate::style::*;
use anyhow::Result;

pub fn init(ctx: &Context) -> Result<()> {
    // Opening the context already applied migrations.
    print_success(&format!("Database ready at {}", style_cyan(&ctx.database)));
    Ok(())
}

pub fn run(ctx: &Context, username: &str) -> Result<()> {
    let user = ctx.service.register_user(username)?;

    if ctx.json {
        return ctx.print_json(&user);
    }

    print_success(&format!(
        "Registered @{} (id {})",
        style_cyan(&user.username),
        user.id
    ));
    Ok(())
}
