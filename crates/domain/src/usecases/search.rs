//! Feed search and leaderboard windows

use time::{Duration, OffsetDateTime, Time, UtcOffset};

use crate::model::{QuestionView, Timeframe};

/// Case-insensitive substring match over text, author name and category.
/// A blank query keeps everything.
pub fn filter_questions(questions: &[QuestionView], query: &str) -> Vec<QuestionView> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return questions.to_vec();
    }

    questions
        .iter()
        .filter(|q| {
            q.text.to_lowercase().contains(&needle)
                || q.author_name.to_lowercase().contains(&needle)
                || q
                    .category
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Earliest profile creation time included in a leaderboard window
///
/// Monthly starts at the first day of the current UTC month, weekly at the
/// most recent Sunday. Both at midnight UTC.
pub fn timeframe_start(timeframe: Timeframe, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let today = now.to_offset(UtcOffset::UTC).date();
    let start = match timeframe {
        Timeframe::All => return None,
        Timeframe::Monthly => today.replace_day(1).ok()?,
        Timeframe::Weekly => {
            let back = i64::from(today.weekday().number_days_from_sunday());
            today.checked_sub(Duration::days(back))?
        }
    };
    Some(start.with_time(Time::MIDNIGHT).assume_utc())
}
