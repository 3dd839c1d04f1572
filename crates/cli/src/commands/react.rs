//! Like and best-answer commands

use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;

use super::feed::print_question;
use super::post::print_award;
use crate::args::{BestArgs, LikeArgs};

pub async fn like(args: LikeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut app = super::open(config_path).await?;
    app.require_session()?;
    app.feed.load().await.context("Failed to load questions")?;

    let state = app.feed.toggle_like(&args.question).await;
    app.flush_notices();
    let state = state.context("Failed to update like")?;

    println!(
        "{} {} ({} likes)",
        if state.liked { "Liked" } else { "Unliked" },
        args.question,
        state.like_count
    );
    Ok(())
}

pub async fn best(args: BestArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut app = super::open(config_path).await?;
    app.require_session()?;
    app.feed.load().await.context("Failed to load questions")?;

    let question_id = app
        .feed
        .snapshot()
        .questions
        .iter()
        .find(|q| q.reply(&args.reply).is_some())
        .map(|q| q.id.clone())
        .ok_or_else(|| anyhow!("Reply not found: {}", args.reply))?;

    let posted = app.feed.mark_best_answer(&question_id, &args.reply).await;
    app.flush_notices();
    let posted = posted.context("Failed to mark best answer")?;

    println!("Best answer selected for {}", question_id);
    print_award(posted.xp.as_ref());
    print_question(&posted.record);
    Ok(())
}
