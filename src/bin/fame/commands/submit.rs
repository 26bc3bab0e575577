//! Submit command - run a post through moderation

use crate::commands::Context;
use crate::style::*;
use anyhow::Result;
use fame_moderation::PostId;

pub fn run(
    ctx: &Context,
    username: &str,
    content: &str,
    cites: Option<PostId>,
    replies_to: Option<PostId>,
) -> Result<()> {
    let user = ctx.user(username)?;
    let outcome = ctx.service.submit_post(user.id, content, cites, replies_to)?;

    if ctx.json {
        return ctx.print_json(&outcome);
    }

    print_header(&format!("Post #{}", outcome.post.id));

    if outcome.classification.is_empty() {
        print_info("No expertise area recognised");
    }
    for rating in &outcome.classification {
        let label = ctx
            .service
            .hierarchy()
            .label(rating.expertise_area)
            .unwrap_or("?");
        println!(
            "  {:<20} {:<20} {}",
            label,
            rating.truth_rating.name,
            style_fame(rating.truth_rating.numeric_value)
        );
    }
    println!();

    if outcome.post.published {
        print_success("Published");
    } else {
        print_warning("Not published");
    }

    if outcome.banned {
        println!();
        print_error(&format!(
            "@{} has been banned and all of their posts were withdrawn",
            user.username
        ));
    }

    Ok(())
}
