//! Rate command - score another user's post

use crate::commands::Context;
use crate::style::*;
use anyhow::Result;
use fame_moderation::{PostId, RatingOutcome};

pub fn rate(
    ctx: &Context,
    username: &str,
    post: PostId,
    rating_type: &str,
    score: i32,
) -> Result<()> {
    let user = ctx.user(username)?;
    let outcome = ctx.service.rate_post(user.id, post, rating_type, score)?;

    if ctx.json {
        return ctx.print_json(&serde_json::json!({
            "rated": true,
            "type": outcome,
        }));
    }

    match outcome {
        RatingOutcome::New => print_success(&format!(
            "Rated post #{} ({}={})",
            post, rating_type, score
        )),
        RatingOutcome::Updated => print_success(&format!(
            "Updated rating of post #{} ({}={})",
            post, rating_type, score
        )),
    }
    Ok(())
}
