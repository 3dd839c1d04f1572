//! Domain records, view models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Authenticated identity handed over by the external identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Identity-provider user id (also the profile id)
    pub user_id: String,
    /// Name shown next to authored content
    pub display_name: String,
    /// Avatar URL, if the provider has one
    pub avatar_url: Option<String>,
}

/// A question as stored by the backend, with its replies and likes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Server-assigned id, immutable
    pub id: String,
    /// Source text, never empty
    pub text: String,
    /// Source language name (e.g. "English", "Ukrainian"), empty when unknown
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_avatar: Option<String>,
    /// Experience reward, fixed at creation
    #[serde(default)]
    pub xp_reward: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub replies: Vec<ReplyRecord>,
    /// User ids that liked this question
    #[serde(default)]
    pub liked_by: Vec<String>,
}

/// An answer to a question as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub id: String,
    pub question_id: String,
    pub text: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_best_answer: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Fields for a question about to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub language: String,
    pub category: Option<String>,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub author_avatar: Option<String>,
    pub xp_reward: u32,
}

/// Fields for a reply about to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReply {
    pub question_id: String,
    pub text: String,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub avatar: Option<String>,
}

/// Display-ready question produced by the mapper
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub author_id: Option<String>,
    pub author_name: String,
    pub avatar_url: String,
    pub language: String,
    pub category: Option<String>,
    pub flag: String,
    pub country: String,
    pub time_ago: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    pub text: String,
    /// Lazily filled translation, `None` until requested
    pub translated: Option<TranslatedText>,
    pub xp: u32,
    pub comment_count: usize,
    /// Best answer first, then newest first
    pub replies: Vec<ReplyView>,
    pub liked: bool,
    pub like_count: u32,
}

impl QuestionView {
    /// First reply flagged as best answer. Readers take the first match
    /// because the two-step best-answer write can briefly leave two.
    pub fn best_answer(&self) -> Option<&ReplyView> {
        self.replies.iter().find(|r| r.is_best_answer)
    }

    pub fn best_answer_count(&self) -> usize {
        self.replies.iter().filter(|r| r.is_best_answer).count()
    }

    pub fn reply(&self, reply_id: &str) -> Option<&ReplyView> {
        self.replies.iter().find(|r| r.id == reply_id)
    }
}

/// Display-ready reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyView {
    pub id: String,
    pub question_id: String,
    pub author_id: Option<String>,
    pub author_name: String,
    pub avatar_url: String,
    pub text: String,
    pub time_ago: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    pub is_best_answer: bool,
}

/// Persistent gamification state of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Equals the identity-provider user id
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub xp: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl Profile {
    pub fn level(&self) -> u64 {
        crate::ledger::level(self.xp)
    }

    pub fn progress(&self) -> f64 {
        crate::ledger::progress(self.xp)
    }
}

/// User-scoped message created as a side effect of experience awards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub related_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Backend collection a change event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Questions,
    Replies,
    Likes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single insert/update/delete notification from the change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Primary key of the changed row
    pub record_id: String,
    /// Parent question id, when the row belongs to one
    pub question_id: Option<String>,
}

impl ChangeEvent {
    /// Question whose view must be refreshed, if the event says so
    pub fn affected_question(&self) -> Option<&str> {
        match self.table {
            Table::Questions => Some(self.record_id.as_str()),
            Table::Replies | Table::Likes => self.question_id.as_deref(),
        }
    }
}

/// Message carried on the internal realtime queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The underlying subscription died and must be recreated
    Closed { reason: String },
}

/// Leaderboard window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[default]
    All,
    Monthly,
    Weekly,
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Self::All),
            "monthly" => Ok(Self::Monthly),
            "weekly" => Ok(Self::Weekly),
            other => Err(format!("Invalid timeframe: {}", other)),
        }
    }
}

/// Severity of a user-visible transient notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
    Xp,
    Degraded,
}

/// Transient message for the user (toast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Where a translated text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationOrigin {
    Upstream,
    Cache,
    /// Translation failed, text is a labeled stand-in
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedText {
    pub text: String,
    pub target_lang: String,
    pub origin: TranslationOrigin,
}

impl TranslatedText {
    pub fn is_placeholder(&self) -> bool {
        self.origin == TranslationOrigin::Placeholder
    }
}
