//! Backend record to view model mapping
//!
//! Everything here is pure: the caller passes the current time and the viewer,
//! so mapping is deterministic and testable with literal fixtures.

use std::cmp::Ordering;
use time::OffsetDateTime;

use crate::model::{QuestionRecord, QuestionView, ReplyRecord, ReplyView};

const ANONYMOUS: &str = "Anonymous";

/// Flag and country code for a source language name
pub fn locale_for_language(language: &str) -> (&'static str, &'static str) {
    match language {
        "Ukrainian" => ("🇺🇦", "UA"),
        "Japanese" => ("🇯🇵", "JP"),
        "Spanish" => ("🇪🇸", "ES"),
        "German" => ("🇩🇪", "DE"),
        "French" => ("🇫🇷", "FR"),
        "Chinese" => ("🇨🇳", "CN"),
        _ => ("🇺🇸", "US"),
    }
}

/// Relative time label
pub fn time_ago(created_at: Option<OffsetDateTime>, now: OffsetDateTime) -> String {
    let Some(created_at) = created_at else {
        return "Just now".to_string();
    };

    let seconds = (now - created_at).whole_seconds();
    if seconds < 60 {
        return "Just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// Placeholder avatar seeded by the author name
pub fn default_avatar(seed: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", seed)
}

/// Descending by time, a missing timestamp counts as newest
pub(crate) fn newest_first(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Best answer first, then newest first
pub fn sort_replies(replies: &mut [ReplyView]) {
    replies.sort_by(|a, b| {
        b.is_best_answer
            .cmp(&a.is_best_answer)
            .then_with(|| newest_first(a.created_at, b.created_at))
    });
}

pub fn map_reply(record: &ReplyRecord, now: OffsetDateTime) -> ReplyView {
    let author_name = record
        .author_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    ReplyView {
        id: record.id.clone(),
        question_id: record.question_id.clone(),
        author_id: record.author_id.clone(),
        avatar_url: record
            .avatar
            .clone()
            .unwrap_or_else(|| default_avatar(&author_name)),
        author_name,
        text: record.text.clone(),
        time_ago: time_ago(record.created_at, now),
        created_at: record.created_at,
        is_best_answer: record.is_best_answer,
    }
}

/// Map a question for `viewer` (the session user id, if any)
pub fn map_question(
    record: &QuestionRecord,
    now: OffsetDateTime,
    viewer: Option<&str>,
) -> QuestionView {
    let (flag, country) = locale_for_language(&record.language);
    let author_name = record
        .author_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    let mut replies: Vec<ReplyView> = record.replies.iter().map(|r| map_reply(r, now)).collect();
    sort_replies(&mut replies);

    let liked = viewer.is_some_and(|user| record.liked_by.iter().any(|id| id == user));

    QuestionView {
        id: record.id.clone(),
        author_id: record.author_id.clone(),
        avatar_url: record
            .author_avatar
            .clone()
            .unwrap_or_else(|| default_avatar(&author_name)),
        author_name,
        language: record.language.clone(),
        category: record.category.clone(),
        flag: flag.to_string(),
        country: country.to_string(),
        time_ago: time_ago(record.created_at, now),
        created_at: record.created_at,
        text: record.text.clone(),
        translated: None,
        xp: record.xp_reward,
        comment_count: replies.len(),
        replies,
        liked,
        like_count: u32::try_from(record.liked_by.len()).unwrap_or(u32::MAX),
    }
}

/// Map a whole list and order it newest first
pub fn map_questions(
    records: &[QuestionRecord],
    now: OffsetDateTime,
    viewer: Option<&str>,
) -> Vec<QuestionView> {
    let mut views: Vec<QuestionView> = records
        .iter()
        .map(|r| map_question(r, now, viewer))
        .collect();
    views.sort_by(|a, b| newest_first(a.created_at, b.created_at));
    views
}
