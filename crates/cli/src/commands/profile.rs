//! Profile and leaderboard commands

use anyhow::{Context, Result, bail};
use connectum_domain::Profile;
use connectum_domain::mapper::default_avatar;
use connectum_domain::usecases::XpSource;
use serde::Serialize;
use std::path::PathBuf;

use crate::app::session_from_config;
use crate::args::{LeaderboardArgs, ProfileArgs};

#[derive(Debug, Serialize)]
struct LeaderboardRow {
    rank: usize,
    user_id: String,
    name: String,
    avatar_url: String,
    xp: u64,
    level: u64,
}

impl LeaderboardRow {
    fn new(rank: usize, profile: &Profile) -> Self {
        let name = profile
            .display_name
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string());
        Self {
            rank,
            user_id: profile.id.clone(),
            avatar_url: profile
                .avatar_url
                .clone()
                .unwrap_or_else(|| default_avatar(&name)),
            name,
            xp: profile.xp,
            level: profile.level(),
        }
    }
}

pub async fn show(args: ProfileArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut app = super::open(config_path).await?;

    let user_id = match args.user {
        Some(user) => user,
        None => match session_from_config(&app.config) {
            Some(session) => session.user_id,
            None => bail!("No user given. Pass --user or set [session] user_id"),
        },
    };

    let ledger = app.feed.ledger();
    let summary = ledger.summary(&user_id).await;
    let unread = match ledger.unread_notifications(&user_id, 20).await {
        Ok(list) => list,
        Err(error) => {
            tracing::warn!(error = %error, "Could not read notifications");
            Vec::new()
        }
    };
    app.flush_notices();

    if args.json {
        let out = serde_json::json!({
            "profile": summary,
            "unread_notifications": unread,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{}",
        summary.display_name.as_deref().unwrap_or(&summary.user_id)
    );
    println!("  XP:       {}", summary.xp);
    println!(
        "  Level:    {} ({:.0}% to next)",
        summary.level,
        summary.progress * 100.0
    );
    if summary.source == XpSource::LocalMirror {
        println!("  (backend unreachable, showing the last locally saved XP)");
    }
    if !unread.is_empty() {
        println!("  Unread notifications:");
        for notification in &unread {
            println!("    - {}", notification.content);
        }
    }
    Ok(())
}

pub async fn leaderboard(args: LeaderboardArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = super::open(config_path).await?;
    let limit = args
        .limit
        .unwrap_or(app.config.gamification.leaderboard_limit);

    let profiles = app
        .feed
        .ledger()
        .leaderboard(args.timeframe, limit)
        .await
        .context("Failed to load leaderboard")?;

    let rows: Vec<LeaderboardRow> = profiles
        .iter()
        .enumerate()
        .map(|(i, p)| LeaderboardRow::new(i + 1, p))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No profiles yet.");
        return Ok(());
    }
    for row in &rows {
        println!(
            "{:>3}. {:<24} {:>7} XP  (level {})",
            row.rank, row.name, row.xp, row.level
        );
    }
    Ok(())
}
