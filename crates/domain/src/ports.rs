//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and the hosted backend,
//! local persistence, translation and object storage. Adapters implement them.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::{
    FeedMessage, NewQuestion, NewReply, Notification, Profile, QuestionRecord, ReplyRecord,
};

/// Error type for remote backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Remote backend unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The backend refused the request (bad input, expired token, row policy)
    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

/// Guard for a live change subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription that needs no teardown
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Port for the hosted relational backend (questions, replies, likes)
///
/// Implementations perform no retries; retry policy belongs to the caller.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// All questions newest first, replies best-answer first then newest first
    async fn fetch_questions(&self) -> Result<Vec<QuestionRecord>, GatewayError>;

    async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, GatewayError>;

    async fn create_question(&self, question: &NewQuestion)
    -> Result<QuestionRecord, GatewayError>;

    async fn create_reply(&self, reply: &NewReply) -> Result<ReplyRecord, GatewayError>;

    /// Clear every best flag of the reply's question, then set this one.
    /// The two writes are not atomic.
    async fn set_best_answer(&self, reply_id: &str) -> Result<(), GatewayError>;

    /// Create or delete the (question, user) like
    async fn toggle_like(&self, question_id: &str, user_id: &str) -> Result<(), GatewayError>;

    /// Start delivering change events for questions, replies and likes into `events`
    async fn subscribe(
        &self,
        events: UnboundedSender<FeedMessage>,
    ) -> Result<Subscription, GatewayError>;
}

/// Port for profiles, leaderboard and notifications on the hosted backend
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError>;

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, GatewayError>;

    /// Last-write-wins update of the xp column
    async fn set_xp(&self, user_id: &str, xp: u64) -> Result<(), GatewayError>;

    /// Profiles by xp descending, optionally only those created since `since`
    async fn leaderboard(
        &self,
        limit: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<Profile>, GatewayError>;

    async fn create_notification(&self, notification: &Notification) -> Result<(), GatewayError>;

    async fn notifications(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, GatewayError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), GatewayError>;
}

/// Error type for local persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for durable key-value persistence used in degraded mode
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All records of a collection, empty if it was never written
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// Replace a collection
    async fn write_all(&self, collection: &str, records: &[Value]) -> Result<(), StoreError>;

    /// Add one record at the end of a collection
    async fn append(&self, collection: &str, record: Value) -> Result<(), StoreError>;
}

/// Error type for translation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Text is required")]
    EmptyText,
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("No translation returned")]
    NoTranslation,
    #[error("Network error: {0}")]
    Network(String),
}

/// Port for text translation
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_lang` (two-letter, upper case)
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError>;
}

/// Error type for object storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Network error: {0}")]
    Network(String),
}

/// Port for binary object storage (avatars, attachments)
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` inside `bucket` and return its public URL
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StorageError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
