//! Feed command - load, search and watch the question feed

use anyhow::{Context, Result};
use connectum_domain::QuestionView;
use connectum_domain::usecases::{LoadSource, Reconciler, filter_questions};
use std::path::PathBuf;
use std::time::Duration;

use crate::app::print_notice;
use crate::args::FeedArgs;

pub async fn execute(args: FeedArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut app = super::open(config_path).await?;

    let source = app.feed.load().await.context("Failed to load questions")?;
    if source == LoadSource::Local {
        eprintln!("Backend unreachable, showing the local copy");
    }
    app.flush_notices();

    let mut shown = visible(&app.feed.snapshot().questions, args.search.as_deref());
    print_questions(&shown, args.json)?;

    if !args.watch {
        return Ok(());
    }

    let handle = Reconciler::new(app.feed.clone(), app.reconciler_config()).spawn();
    let mut notices = app.feed.subscribe_notices();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    tracing::info!("Watching for changes, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(notice) = notices.recv() => print_notice(&notice),
            _ = ticker.tick() => {
                let current = visible(&app.feed.snapshot().questions, args.search.as_deref());
                if current != shown {
                    print_questions(&current, args.json)?;
                    shown = current;
                }
            }
        }
    }

    app.feed.close();
    handle.stop().await;
    Ok(())
}

fn visible(questions: &[QuestionView], search: Option<&str>) -> Vec<QuestionView> {
    match search {
        Some(query) => filter_questions(questions, query),
        None => questions.to_vec(),
    }
}

fn print_questions(questions: &[QuestionView], json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(questions).context("Failed to serialize feed")?;
        println!("{}", out);
        return Ok(());
    }

    if questions.is_empty() {
        println!("No questions yet.");
        return Ok(());
    }

    for question in questions {
        print_question(question);
    }
    Ok(())
}

pub(crate) fn print_question(question: &QuestionView) {
    println!(
        "{} {} · {} · {}  [{}]",
        question.flag, question.author_name, question.country, question.time_ago, question.id
    );
    if let Some(category) = &question.category {
        println!("  #{}", category);
    }
    println!("  {}", question.text);
    if let Some(translated) = &question.translated {
        println!("  → {}", translated.text);
    }
    println!(
        "  {} XP · {} answers · {} likes{}",
        question.xp,
        question.comment_count,
        question.like_count,
        if question.liked { " (liked)" } else { "" }
    );
    for reply in &question.replies {
        let marker = if reply.is_best_answer { "★" } else { "-" };
        println!(
            "    {} {}: {} ({}) [{}]",
            marker, reply.author_name, reply.text, reply.time_ago, reply.id
        );
    }
    println!();
}
