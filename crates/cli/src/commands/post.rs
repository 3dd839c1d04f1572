//! Ask and answer commands

use anyhow::{Context, Result};
use connectum_domain::usecases::{LoadSource, XpAward};
use std::path::PathBuf;

use crate::args::{AnswerArgs, AskArgs};

pub async fn ask(args: AskArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut app = super::open(config_path).await?;

    let posted = app
        .feed
        .post_question(&args.text, args.language.as_deref(), args.category.as_deref())
        .await
        .context("Failed to post question");
    app.flush_notices();
    let posted = posted?;

    match posted.stored {
        LoadSource::Remote => println!("Question posted: {}", posted.record.id),
        LoadSource::Local => println!(
            "Question saved locally (backend unreachable): {}",
            posted.record.id
        ),
    }
    print_award(posted.xp.as_ref());
    Ok(())
}

pub async fn answer(args: AnswerArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut app = super::open(config_path).await?;

    let posted = app
        .feed
        .post_answer(&args.question, &args.text)
        .await
        .context("Failed to post answer");
    app.flush_notices();
    let posted = posted?;

    match posted.stored {
        LoadSource::Remote => println!("Answer posted: {}", posted.record.id),
        LoadSource::Local => println!(
            "Answer saved locally (backend unreachable): {}",
            posted.record.id
        ),
    }
    print_award(posted.xp.as_ref());
    Ok(())
}

pub(crate) fn print_award(award: Option<&XpAward>) {
    let Some(award) = award else {
        return;
    };
    match award.remote_xp {
        Some(total) => println!("+{} XP (total {})", award.amount, total),
        None => println!(
            "+{} XP (total {}, not yet saved to the backend)",
            award.amount, award.displayed_xp
        ),
    }
}
