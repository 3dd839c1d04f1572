//! Live question feed with optimistic mutations
//!
//! The feed holds the mapped question list. User actions go through
//! [`optimistic::run`] where something is applied locally first; posts are
//! not inserted directly and arrive through the reconciler instead. When the
//! backend is unreachable the feed falls back to the local store and says so
//! through `Degraded` notices.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ledger::XpRewards;
use crate::lock;
use crate::mapper::{map_question, newest_first, sort_replies};
use crate::model::{
    NewQuestion, NewReply, Notice, NoticeKind, QuestionRecord, QuestionView, ReplyRecord, Session,
    TranslatedText,
};
use crate::ports::{Clock, GatewayError, LocalStore, RemoteGateway};
use crate::usecases::gamification::{XpAward, XpLedger};
use crate::usecases::optimistic::{self, TxOutcome, Versioned};
use crate::usecases::translate::TranslationService;

/// Local store collection holding the question list for degraded mode
pub const LOCAL_QUESTIONS: &str = "local_questions";

const NOTICE_CAPACITY: usize = 64;

/// Errors surfaced by feed operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("{0}")]
    Validation(String),
    #[error("Remote backend unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Rejected by backend: {0}")]
    Rejected(String),
    #[error("Not allowed: {0}")]
    Forbidden(String),
    #[error("A change for {0} is already in flight")]
    InFlight(String),
    #[error("Translation unavailable: {0}")]
    TranslationUnavailable(String),
    #[error("Feed is closed")]
    Closed,
}

impl From<GatewayError> for FeedError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::RemoteUnavailable(msg) => Self::RemoteUnavailable(msg),
            GatewayError::NotFound(msg) => Self::NotFound(msg),
            GatewayError::Conflict(msg) => Self::Conflict(msg),
            GatewayError::Rejected(msg) => Self::Rejected(msg),
        }
    }
}

/// Feed behavior knobs
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub rewards: XpRewards,
    /// Consecutive backend failures between loud degraded-mode notices
    pub degraded_notice_every: u32,
    /// Language stored on questions posted without one
    pub default_language: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            rewards: XpRewards::default(),
            degraded_notice_every: 3,
            default_language: "English".to_string(),
        }
    }
}

/// Where the current list was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Remote,
    Local,
}

/// Outcome of a post that reached some store
#[derive(Debug, Clone, PartialEq)]
pub struct Posted<T> {
    pub record: T,
    pub stored: LoadSource,
    pub xp: Option<XpAward>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u32,
}

/// Read-only copy of the feed state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub questions: Vec<QuestionView>,
    pub loading: bool,
    pub degraded: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    questions: Vec<QuestionView>,
    loading: bool,
    generations: HashMap<String, u64>,
    likes_in_flight: HashSet<String>,
    consecutive_failures: u32,
    degraded: bool,
    closed: bool,
}

impl Versioned for FeedState {
    fn bump(&mut self, key: &str) -> u64 {
        let generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FeedState {
    fn question_mut(&mut self, id: &str) -> Option<&mut QuestionView> {
        self.questions.iter_mut().find(|q| q.id == id)
    }

    /// Replace or insert by primary key, keeping in-flight like state and
    /// any translation already shown
    fn merge(&mut self, mut view: QuestionView) {
        if let Some(existing) = self.questions.iter_mut().find(|q| q.id == view.id) {
            if self.likes_in_flight.contains(&view.id) {
                view.liked = existing.liked;
                view.like_count = existing.like_count;
            }
            if view.translated.is_none() {
                view.translated = existing.translated.take();
            }
            *existing = view;
        } else {
            self.questions.push(view);
        }
        self.questions
            .sort_by(|a, b| newest_first(a.created_at, b.created_at));
    }

    fn remove(&mut self, id: &str) {
        self.questions.retain(|q| q.id != id);
    }
}

// Each mutation kind owns its own generation so one kind never supersedes another.
fn like_key(question_id: &str) -> String {
    format!("like:{}", question_id)
}

fn best_answer_key(question_id: &str) -> String {
    format!("best:{}", question_id)
}

/// The live feed engine for one client
pub struct Feed {
    gateway: Arc<dyn RemoteGateway>,
    local: Arc<dyn LocalStore>,
    ledger: Arc<XpLedger>,
    translations: Option<Arc<TranslationService>>,
    clock: Arc<dyn Clock>,
    session: Option<Session>,
    config: FeedConfig,
    state: Mutex<FeedState>,
    notices: broadcast::Sender<Notice>,
}

impl Feed {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        local: Arc<dyn LocalStore>,
        ledger: Arc<XpLedger>,
        clock: Arc<dyn Clock>,
        notices: broadcast::Sender<Notice>,
        config: FeedConfig,
    ) -> Self {
        Self {
            gateway,
            local,
            ledger,
            translations: None,
            clock,
            session: None,
            config,
            state: Mutex::new(FeedState::default()),
            notices,
        }
    }

    /// Fresh notice channel sized for one feed
    pub fn notice_channel() -> broadcast::Sender<Notice> {
        broadcast::channel(NOTICE_CAPACITY).0
    }

    pub fn with_session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn with_translations(mut self, translations: Arc<TranslationService>) -> Self {
        self.translations = Some(translations);
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn ledger(&self) -> &XpLedger {
        &self.ledger
    }

    pub(crate) fn gateway(&self) -> Arc<dyn RemoteGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = lock(&self.state);
        FeedSnapshot {
            questions: state.questions.clone(),
            loading: state.loading,
            degraded: state.degraded,
        }
    }

    pub fn question(&self, id: &str) -> Option<QuestionView> {
        lock(&self.state)
            .questions
            .iter()
            .find(|q| q.id == id)
            .cloned()
    }

    pub fn is_degraded(&self) -> bool {
        lock(&self.state).degraded
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Tear down: pending outcomes stop touching the list
    pub fn close(&self) {
        lock(&self.state).closed = true;
        tracing::debug!("Feed closed");
    }

    /// Initial load. Shows the loading flag, falls back to the local copy
    /// when the backend is unreachable.
    pub async fn load(&self) -> Result<LoadSource, FeedError> {
        self.ensure_open()?;
        lock(&self.state).loading = true;
        let result = self.load_inner().await;
        lock(&self.state).loading = false;
        result
    }

    async fn load_inner(&self) -> Result<LoadSource, FeedError> {
        if let Some(session) = &self.session {
            if let Err(error) = self.ledger.ensure_profile(session).await {
                tracing::warn!(user_id = %session.user_id, error = %error, "Profile setup failed");
            }
        }

        match self.gateway.fetch_questions().await {
            Ok(records) => {
                self.record_success();
                self.mirror_locally(&records).await;
                let count = records.len();
                self.replace_all(&records);
                tracing::info!(count, "Loaded questions");
                Ok(LoadSource::Remote)
            }
            Err(error) if error.is_unavailable() => {
                self.record_failure(&error);
                let records = self.read_local().await;
                let count = records.len();
                self.replace_all(&records);
                tracing::warn!(count, "Loaded questions from local copy");
                Ok(LoadSource::Local)
            }
            Err(error) => {
                self.notify(NoticeKind::Error, "Failed to load questions");
                Err(error.into())
            }
        }
    }

    /// Full re-fetch merged by primary key. Never touches the loading flag.
    pub async fn refresh_all(&self) -> Result<(), FeedError> {
        self.ensure_open()?;
        let records = match self.gateway.fetch_questions().await {
            Ok(records) => records,
            Err(error) => {
                self.record_failure(&error);
                return Err(error.into());
            }
        };
        self.record_success();
        self.mirror_locally(&records).await;

        let now = self.clock.now();
        let viewer = self.viewer();
        let mut state = lock(&self.state);
        if state.closed {
            return Err(FeedError::Closed);
        }
        for record in &records {
            state.merge(map_question(record, now, viewer));
        }
        tracing::debug!(count = records.len(), "Merged full refresh");
        Ok(())
    }

    /// Re-fetch one question and merge it; a deleted question leaves the list
    pub async fn refresh_question(&self, id: &str) -> Result<(), FeedError> {
        self.ensure_open()?;
        let fetched = self.gateway.fetch_question(id).await;
        let now = self.clock.now();

        match fetched {
            Ok(record) => {
                self.record_success();
                let view = map_question(&record, now, self.viewer());
                let mut state = lock(&self.state);
                if state.closed {
                    return Err(FeedError::Closed);
                }
                state.merge(view);
                tracing::debug!(question_id = %id, "Merged question");
                Ok(())
            }
            Err(GatewayError::NotFound(_)) => {
                self.record_success();
                lock(&self.state).remove(id);
                tracing::debug!(question_id = %id, "Question gone, removed");
                Ok(())
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error.into())
            }
        }
    }

    /// Post a question. Nothing is applied to the list; the new item arrives
    /// through the change feed.
    pub async fn post_question(
        &self,
        text: &str,
        language: Option<&str>,
        category: Option<&str>,
    ) -> Result<Posted<QuestionRecord>, FeedError> {
        self.ensure_open()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedError::Validation("Question text is required".to_string()));
        }

        let question = NewQuestion {
            text: text.to_string(),
            language: language
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(&self.config.default_language)
                .to_string(),
            category: category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from),
            author_name: self.session.as_ref().map(|s| s.display_name.clone()),
            author_id: self.session.as_ref().map(|s| s.user_id.clone()),
            author_avatar: self.session.as_ref().and_then(|s| s.avatar_url.clone()),
            xp_reward: self.config.rewards.question,
        };

        match self.gateway.create_question(&question).await {
            Ok(record) => {
                self.record_success();
                tracing::info!(question_id = %record.id, "Question posted");
                self.notify(NoticeKind::Success, "Question posted");
                let xp = self
                    .award_self(self.config.rewards.question, "Posted question", &record.id)
                    .await;
                Ok(Posted {
                    record,
                    stored: LoadSource::Remote,
                    xp,
                })
            }
            Err(error) if error.is_unavailable() => {
                self.record_failure(&error);
                let record = self.store_question_locally(question).await?;
                Ok(Posted {
                    record,
                    stored: LoadSource::Local,
                    xp: None,
                })
            }
            Err(error) => {
                self.notify(NoticeKind::Error, format!("Failed to post question: {}", error));
                Err(error.into())
            }
        }
    }

    /// Post an answer, same shape as [`Feed::post_question`]
    pub async fn post_answer(
        &self,
        question_id: &str,
        text: &str,
    ) -> Result<Posted<ReplyRecord>, FeedError> {
        self.ensure_open()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FeedError::Validation("Answer text is required".to_string()));
        }

        let reply = NewReply {
            question_id: question_id.to_string(),
            text: text.to_string(),
            author_name: self.session.as_ref().map(|s| s.display_name.clone()),
            author_id: self.session.as_ref().map(|s| s.user_id.clone()),
            avatar: self.session.as_ref().and_then(|s| s.avatar_url.clone()),
        };

        match self.gateway.create_reply(&reply).await {
            Ok(record) => {
                self.record_success();
                tracing::info!(question_id = %question_id, reply_id = %record.id, "Answer posted");
                self.notify(NoticeKind::Success, "Answer posted");
                let xp = self
                    .award_self(self.config.rewards.answer, "Posted answer", &record.id)
                    .await;
                Ok(Posted {
                    record,
                    stored: LoadSource::Remote,
                    xp,
                })
            }
            Err(error) if error.is_unavailable() => {
                self.record_failure(&error);
                let record = self.store_reply_locally(reply).await?;
                Ok(Posted {
                    record,
                    stored: LoadSource::Local,
                    xp: None,
                })
            }
            Err(error) => {
                self.notify(NoticeKind::Error, format!("Failed to post answer: {}", error));
                Err(error.into())
            }
        }
    }

    /// Flip the viewer's like optimistically. A second toggle for the same
    /// question while one is in flight is rejected with `InFlight`.
    pub async fn toggle_like(&self, question_id: &str) -> Result<LikeState, FeedError> {
        let session = self.require_session("like questions")?;

        {
            let mut state = lock(&self.state);
            if state.closed {
                return Err(FeedError::Closed);
            }
            if state.question_mut(question_id).is_none() {
                return Err(FeedError::NotFound(question_id.to_string()));
            }
            if !state.likes_in_flight.insert(question_id.to_string()) {
                return Err(FeedError::InFlight(question_id.to_string()));
            }
        }

        let gateway = Arc::clone(&self.gateway);
        let user_id = session.user_id.clone();
        let key = like_key(question_id);
        let outcome = optimistic::run(
            &self.state,
            &key,
            |state: &mut FeedState| {
                let question = state.question_mut(question_id)?;
                let before = LikeState {
                    liked: question.liked,
                    like_count: question.like_count,
                };
                question.liked = !before.liked;
                question.like_count = if before.liked {
                    before.like_count.saturating_sub(1)
                } else {
                    before.like_count.saturating_add(1)
                };
                Some(before)
            },
            async move { gateway.toggle_like(question_id, &user_id).await },
            |state: &mut FeedState, before: Option<LikeState>| {
                if let (Some(before), Some(question)) = (before, state.question_mut(question_id))
                {
                    question.liked = before.liked;
                    question.like_count = before.like_count;
                }
            },
        )
        .await;

        let current = {
            let mut state = lock(&self.state);
            state.likes_in_flight.remove(question_id);
            state.question_mut(question_id).map(|q| LikeState {
                liked: q.liked,
                like_count: q.like_count,
            })
        };

        match outcome {
            TxOutcome::Confirmed(()) => {
                self.record_success();
                tracing::info!(
                    question_id = %question_id,
                    liked = ?current.map(|c| c.liked),
                    "Like confirmed"
                );
                current.ok_or_else(|| FeedError::NotFound(question_id.to_string()))
            }
            TxOutcome::RolledBack(error) | TxOutcome::Superseded(error) => {
                self.record_failure(&error);
                tracing::warn!(question_id = %question_id, error = %error, "Like failed");
                if !error.is_unavailable() {
                    self.notify(NoticeKind::Error, "Could not update like");
                }
                Err(error.into())
            }
            TxOutcome::Cancelled => Err(FeedError::Closed),
        }
    }

    /// Mark a reply as the best answer of its question
    ///
    /// Only the question's author may do this. The backend write is two
    /// steps, so the question is always re-read afterwards and more than one
    /// best answer in that read is reported as `Conflict`.
    pub async fn mark_best_answer(
        &self,
        question_id: &str,
        reply_id: &str,
    ) -> Result<Posted<QuestionView>, FeedError> {
        let session = self.require_session("mark a best answer")?;

        let reply_author = {
            let mut state = lock(&self.state);
            if state.closed {
                return Err(FeedError::Closed);
            }
            let question = state
                .question_mut(question_id)
                .ok_or_else(|| FeedError::NotFound(question_id.to_string()))?;
            if question.author_id.as_deref() != Some(session.user_id.as_str()) {
                return Err(FeedError::Forbidden(
                    "Only the question author can pick the best answer".to_string(),
                ));
            }
            let reply = question
                .reply(reply_id)
                .ok_or_else(|| FeedError::NotFound(reply_id.to_string()))?;
            reply.author_id.clone()
        };

        let gateway = Arc::clone(&self.gateway);
        let key = best_answer_key(question_id);
        let outcome = optimistic::run(
            &self.state,
            &key,
            |state: &mut FeedState| {
                let question = state.question_mut(question_id)?;
                let before = question.replies.clone();
                for reply in &mut question.replies {
                    reply.is_best_answer = reply.id == reply_id;
                }
                sort_replies(&mut question.replies);
                Some(before)
            },
            async move { gateway.set_best_answer(reply_id).await },
            |state: &mut FeedState, before: Option<Vec<_>>| {
                if let (Some(before), Some(question)) = (before, state.question_mut(question_id))
                {
                    question.replies = before;
                }
            },
        )
        .await;

        let written = match outcome {
            TxOutcome::Confirmed(()) => Ok(()),
            TxOutcome::RolledBack(error) | TxOutcome::Superseded(error) => {
                self.record_failure(&error);
                Err(error)
            }
            TxOutcome::Cancelled => return Err(FeedError::Closed),
        };

        if let Err(error) = self.refresh_question(question_id).await {
            tracing::warn!(
                question_id = %question_id,
                error = %error,
                "Re-read after best answer failed"
            );
        }

        if let Err(error) = written {
            tracing::warn!(reply_id = %reply_id, error = %error, "Best answer failed");
            self.notify(NoticeKind::Error, "Could not select best answer");
            return Err(error.into());
        }

        let question = self
            .question(question_id)
            .ok_or_else(|| FeedError::NotFound(question_id.to_string()))?;
        if question.best_answer_count() > 1 {
            tracing::warn!(
                question_id = %question_id,
                count = question.best_answer_count(),
                "More than one best answer after re-read"
            );
            return Err(FeedError::Conflict(format!(
                "question {} has {} best answers",
                question_id,
                question.best_answer_count()
            )));
        }

        self.record_success();
        tracing::info!(question_id = %question_id, reply_id = %reply_id, "Best answer selected");
        self.notify(NoticeKind::Success, "Best answer selected!");

        let xp = match reply_author {
            Some(author) => {
                let announce = author == session.user_id;
                Some(
                    self.ledger
                        .award(
                            &author,
                            self.config.rewards.best_answer,
                            "Best answer",
                            Some(reply_id),
                            announce,
                        )
                        .await,
                )
            }
            None => None,
        };

        Ok(Posted {
            record: question,
            stored: LoadSource::Remote,
            xp,
        })
    }

    /// Translate a question into `target_lang` and attach the result to its
    /// view. A failed translation is attached as a labeled placeholder.
    pub async fn translate_question(
        &self,
        question_id: &str,
        target_lang: &str,
    ) -> Result<TranslatedText, FeedError> {
        self.ensure_open()?;
        let translations = self.translations.as_ref().ok_or_else(|| {
            FeedError::TranslationUnavailable("no translator configured".to_string())
        })?;
        let text = self
            .question(question_id)
            .map(|q| q.text)
            .ok_or_else(|| FeedError::NotFound(question_id.to_string()))?;

        let translated = translations
            .translate(&text, target_lang)
            .await
            .map_err(|e| FeedError::Validation(e.to_string()))?;

        if translated.is_placeholder() {
            self.notify(NoticeKind::Error, "Translation unavailable");
        }

        let mut state = lock(&self.state);
        if state.closed {
            return Err(FeedError::Closed);
        }
        if let Some(question) = state.question_mut(question_id) {
            question.translated = Some(translated.clone());
        }
        Ok(translated)
    }

    fn ensure_open(&self) -> Result<(), FeedError> {
        if self.is_closed() {
            Err(FeedError::Closed)
        } else {
            Ok(())
        }
    }

    fn require_session(&self, action: &str) -> Result<&Session, FeedError> {
        self.ensure_open()?;
        self.session
            .as_ref()
            .ok_or_else(|| FeedError::Forbidden(format!("Sign in to {}", action)))
    }

    fn viewer(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        let _ = self.notices.send(Notice::new(kind, message));
    }

    fn replace_all(&self, records: &[QuestionRecord]) {
        let now = self.clock.now();
        let viewer = self.viewer();
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        let previous: HashMap<String, QuestionView> = state
            .questions
            .drain(..)
            .map(|q| (q.id.clone(), q))
            .collect();
        state.questions = records
            .iter()
            .map(|r| map_question(r, now, viewer))
            .collect();
        for question in &mut state.questions {
            if let Some(old) = previous.get(&question.id) {
                question.translated = old.translated.clone();
            }
        }
        state
            .questions
            .sort_by(|a, b| newest_first(a.created_at, b.created_at));
    }

    fn record_success(&self) {
        let mut state = lock(&self.state);
        let was_degraded = state.degraded;
        state.consecutive_failures = 0;
        state.degraded = false;
        drop(state);
        if was_degraded {
            tracing::info!("Backend reachable again, leaving degraded mode");
            self.notify(NoticeKind::Success, "Back online");
        }
    }

    fn record_failure(&self, error: &GatewayError) {
        if !error.is_unavailable() {
            return;
        }
        let every = self.config.degraded_notice_every.max(1);
        let mut state = lock(&self.state);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.degraded = true;
        let failures = state.consecutive_failures;
        drop(state);

        if failures == 1 {
            tracing::warn!(error = %error, "Backend unreachable, entering degraded mode");
            self.notify(
                NoticeKind::Degraded,
                "Offline: showing locally saved questions",
            );
        } else if failures % every == 0 {
            tracing::warn!(failures, error = %error, "Backend still unreachable");
            self.notify(
                NoticeKind::Degraded,
                format!(
                    "Still offline after {} attempts; new posts are saved on this device only",
                    failures
                ),
            );
        }
    }

    async fn award_self(&self, amount: u32, reason: &str, related_id: &str) -> Option<XpAward> {
        let session = self.session.as_ref()?;
        Some(
            self.ledger
                .award(&session.user_id, amount, reason, Some(related_id), true)
                .await,
        )
    }

    async fn mirror_locally(&self, records: &[QuestionRecord]) {
        let values: Vec<Value> = records
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        if let Err(error) = self.local.write_all(LOCAL_QUESTIONS, &values).await {
            tracing::warn!(error = %error, "Failed to mirror questions locally");
        }
    }

    async fn read_local(&self) -> Vec<QuestionRecord> {
        match self.local.read_all(LOCAL_QUESTIONS).await {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            Err(error) => {
                tracing::warn!(error = %error, "Failed to read local questions");
                Vec::new()
            }
        }
    }

    async fn store_question_locally(
        &self,
        question: NewQuestion,
    ) -> Result<QuestionRecord, FeedError> {
        let record = QuestionRecord {
            id: Uuid::new_v4().to_string(),
            text: question.text,
            language: question.language,
            category: question.category,
            author_name: question.author_name,
            author_id: question.author_id,
            author_avatar: question.author_avatar,
            xp_reward: question.xp_reward,
            created_at: Some(self.clock.now()),
            replies: vec![],
            liked_by: vec![],
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| FeedError::Validation(e.to_string()))?;
        if let Err(error) = self.local.append(LOCAL_QUESTIONS, value).await {
            tracing::error!(error = %error, "Failed to save question locally");
            self.notify(NoticeKind::Error, "Failed to post question");
            return Err(FeedError::RemoteUnavailable(error.to_string()));
        }

        tracing::info!(question_id = %record.id, "Question saved locally");
        self.notify(NoticeKind::Success, "Question saved locally");
        let view = map_question(&record, self.clock.now(), self.viewer());
        lock(&self.state).merge(view);
        Ok(record)
    }

    async fn store_reply_locally(&self, reply: NewReply) -> Result<ReplyRecord, FeedError> {
        let record = ReplyRecord {
            id: Uuid::new_v4().to_string(),
            question_id: reply.question_id,
            text: reply.text,
            author_name: reply.author_name,
            author_id: reply.author_id,
            avatar: reply.avatar,
            is_best_answer: false,
            created_at: Some(self.clock.now()),
        };

        let mut questions = self.read_local().await;
        let Some(parent) = questions.iter_mut().find(|q| q.id == record.question_id) else {
            self.notify(NoticeKind::Error, "Failed to post answer");
            return Err(FeedError::NotFound(record.question_id.clone()));
        };
        parent.replies.push(record.clone());
        let view = map_question(parent, self.clock.now(), self.viewer());

        let values: Vec<Value> = questions
            .iter()
            .filter_map(|q| serde_json::to_value(q).ok())
            .collect();
        if let Err(error) = self.local.write_all(LOCAL_QUESTIONS, &values).await {
            tracing::error!(error = %error, "Failed to save answer locally");
            self.notify(NoticeKind::Error, "Failed to post answer");
            return Err(FeedError::RemoteUnavailable(error.to_string()));
        }

        tracing::info!(reply_id = %record.id, "Answer saved locally");
        self.notify(NoticeKind::Success, "Answer saved locally");
        lock(&self.state).merge(view);
        Ok(record)
    }
}
