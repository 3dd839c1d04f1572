//! Hand-written port fakes shared by the use case tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;

use crate::mapper::newest_first;
use crate::model::{
    ChangeEvent, ChangeKind, FeedMessage, NewQuestion, NewReply, Notification, Profile,
    QuestionRecord, ReplyRecord, Table,
};
use crate::ports::{
    GatewayError, LocalStore, ProfileStore, RemoteGateway, StoreError, Subscription,
    TranslateError, Translator,
};

pub const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

pub fn record(id: &str, author_id: &str, minutes_ago: i64) -> QuestionRecord {
    QuestionRecord {
        id: id.to_string(),
        text: format!("question {}", id),
        language: "English".to_string(),
        category: None,
        author_name: Some(author_id.to_string()),
        author_id: Some(author_id.to_string()),
        author_avatar: None,
        xp_reward: 50,
        created_at: Some(NOW - time::Duration::minutes(minutes_ago)),
        replies: vec![],
        liked_by: vec![],
    }
}

#[derive(Default)]
struct Backend {
    questions: Vec<QuestionRecord>,
    next_id: u64,
    calls: HashMap<String, usize>,
    failures: HashMap<String, VecDeque<GatewayError>>,
    unavailable: bool,
    skip_best_clear: bool,
    subscribers: Vec<(u64, UnboundedSender<FeedMessage>)>,
}

impl Backend {
    fn begin(&mut self, op: &str) {
        *self.calls.entry(op.to_string()).or_insert(0) += 1;
    }

    fn check(&mut self, op: &str) -> Result<(), GatewayError> {
        if self.unavailable {
            return Err(GatewayError::RemoteUnavailable("connection refused".into()));
        }
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn emit(&mut self, table: Table, kind: ChangeKind, record_id: &str, question_id: Option<&str>) {
        let event = ChangeEvent {
            table,
            kind,
            record_id: record_id.to_string(),
            question_id: question_id.map(String::from),
        };
        self.subscribers
            .retain(|(_, tx)| tx.send(FeedMessage::Change(event.clone())).is_ok());
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn question_mut(&mut self, id: &str) -> Result<&mut QuestionRecord, GatewayError> {
        self.questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }
}

/// In-memory backend with failure injection and change events
#[derive(Default)]
pub struct FakeGateway {
    inner: Arc<Mutex<Backend>>,
    like_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeGateway {
    pub fn seed(&self, record: QuestionRecord) {
        self.inner.lock().unwrap().questions.push(record);
    }

    pub fn seed_reply(&self, question_id: &str, reply_id: &str, author_id: &str, best: bool) {
        let mut inner = self.inner.lock().unwrap();
        let question = inner.question_mut(question_id).unwrap();
        let minutes = question.replies.len() as i64;
        question.replies.push(ReplyRecord {
            id: reply_id.to_string(),
            question_id: question_id.to_string(),
            text: format!("reply {}", reply_id),
            author_name: Some(author_id.to_string()),
            author_id: Some(author_id.to_string()),
            avatar: None,
            is_best_answer: best,
            created_at: Some(NOW - time::Duration::minutes(30 - minutes)),
        });
    }

    pub fn remove(&self, id: &str) {
        self.inner.lock().unwrap().questions.retain(|q| q.id != id);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_next(&self, op: &str, error: GatewayError) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unwrap().unavailable = unavailable;
    }

    /// Make `set_best_answer` skip its clearing step
    pub fn skip_best_answer_clear(&self) {
        self.inner.lock().unwrap().skip_best_clear = true;
    }

    /// Block like toggles until the returned handle is notified
    pub fn hold_likes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.like_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn active_subscribers(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    pub async fn wait_for_subscribers(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.active_subscribers() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no subscriber showed up");
    }

    pub fn push(&self, message: FeedMessage) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(message.clone()).is_ok());
    }

    /// Tell every subscriber its channel died and forget them
    pub fn drop_subscribers(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        for (_, tx) in inner.subscribers.drain(..) {
            let _ = tx.send(FeedMessage::Closed {
                reason: reason.to_string(),
            });
        }
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn fetch_questions(&self) -> Result<Vec<QuestionRecord>, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin("fetch_questions");
        inner.check("fetch_questions")?;
        let mut questions = inner.questions.clone();
        questions.sort_by(|a, b| newest_first(a.created_at, b.created_at));
        Ok(questions)
    }

    async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin("fetch_question");
        inner.check("fetch_question")?;
        inner.question_mut(id).map(|q| q.clone())
    }

    async fn create_question(
        &self,
        question: &NewQuestion,
    ) -> Result<QuestionRecord, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin("create_question");
        inner.check("create_question")?;
        let record = QuestionRecord {
            id: inner.next_id("q-"),
            text: question.text.clone(),
            language: question.language.clone(),
            category: question.category.clone(),
            author_name: question.author_name.clone(),
            author_id: question.author_id.clone(),
            author_avatar: question.author_avatar.clone(),
            xp_reward: question.xp_reward,
            created_at: Some(NOW),
            replies: vec![],
            liked_by: vec![],
        };
        inner.questions.push(record.clone());
        inner.emit(Table::Questions, ChangeKind::Insert, &record.id, None);
        Ok(record)
    }

    async fn create_reply(&self, reply: &NewReply) -> Result<ReplyRecord, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin("create_reply");
        inner.check("create_reply")?;
        let record = ReplyRecord {
            id: inner.next_id("r-"),
            question_id: reply.question_id.clone(),
            text: reply.text.clone(),
            author_name: reply.author_name.clone(),
            author_id: reply.author_id.clone(),
            avatar: reply.avatar.clone(),
            is_best_answer: false,
            created_at: Some(NOW),
        };
        inner
            .question_mut(&reply.question_id)?
            .replies
            .push(record.clone());
        inner.emit(
            Table::Replies,
            ChangeKind::Insert,
            &record.id,
            Some(&reply.question_id),
        );
        Ok(record)
    }

    async fn set_best_answer(&self, reply_id: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin("set_best_answer");
        inner.check("set_best_answer")?;
        let skip_clear = inner.skip_best_clear;
        let question = inner
            .questions
            .iter_mut()
            .find(|q| q.replies.iter().any(|r| r.id == reply_id))
            .ok_or_else(|| GatewayError::NotFound(reply_id.to_string()))?;
        for reply in &mut question.replies {
            if reply.id == reply_id {
                reply.is_best_answer = true;
            } else if !skip_clear {
                reply.is_best_answer = false;
            }
        }
        let question_id = question.id.clone();
        inner.emit(
            Table::Replies,
            ChangeKind::Update,
            reply_id,
            Some(&question_id),
        );
        Ok(())
    }

    async fn toggle_like(&self, question_id: &str, user_id: &str) -> Result<(), GatewayError> {
        self.inner.lock().unwrap().begin("toggle_like");
        let gate = self.like_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.check("toggle_like")?;
        let question = inner.question_mut(question_id)?;
        let kind = if let Some(pos) = question.liked_by.iter().position(|u| u == user_id) {
            question.liked_by.remove(pos);
            ChangeKind::Delete
        } else {
            question.liked_by.push(user_id.to_string());
            ChangeKind::Insert
        };
        let record_id = format!("{}:{}", question_id, user_id);
        inner.emit(Table::Likes, kind, &record_id, Some(question_id));
        Ok(())
    }

    async fn subscribe(
        &self,
        events: UnboundedSender<FeedMessage>,
    ) -> Result<Subscription, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin("subscribe");
        inner.check("subscribe")?;
        let id = inner.next_id.wrapping_add(1000);
        inner.next_id += 1;
        inner.subscribers.push((id, events));

        let shared = Arc::clone(&self.inner);
        Ok(Subscription::new(move || {
            shared
                .lock()
                .unwrap()
                .subscribers
                .retain(|(sub, _)| *sub != id);
        }))
    }
}

#[derive(Default)]
struct ProfileData {
    profiles: HashMap<String, Profile>,
    notifications: Vec<Notification>,
    created: usize,
    unavailable: bool,
    last_leaderboard: Option<(usize, Option<OffsetDateTime>)>,
}

#[derive(Default)]
pub struct FakeProfiles {
    data: Mutex<ProfileData>,
}

impl FakeProfiles {
    pub fn insert(&self, profile: Profile) {
        self.data
            .lock()
            .unwrap()
            .profiles
            .insert(profile.id.clone(), profile);
    }

    pub fn xp(&self, user_id: &str) -> Option<u64> {
        self.data
            .lock()
            .unwrap()
            .profiles
            .get(user_id)
            .map(|p| p.xp)
    }

    pub fn created(&self) -> usize {
        self.data.lock().unwrap().created
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.data.lock().unwrap().unavailable = unavailable;
    }

    pub fn last_leaderboard_query(&self) -> Option<(usize, Option<OffsetDateTime>)> {
        self.data.lock().unwrap().last_leaderboard
    }

    fn guard(data: &ProfileData) -> Result<(), GatewayError> {
        if data.unavailable {
            Err(GatewayError::RemoteUnavailable("profiles offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError> {
        let data = self.data.lock().unwrap();
        Self::guard(&data)?;
        Ok(data.profiles.get(user_id).cloned())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, GatewayError> {
        let mut data = self.data.lock().unwrap();
        Self::guard(&data)?;
        data.created += 1;
        data.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn set_xp(&self, user_id: &str, xp: u64) -> Result<(), GatewayError> {
        let mut data = self.data.lock().unwrap();
        Self::guard(&data)?;
        let profile = data
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| GatewayError::NotFound(user_id.to_string()))?;
        profile.xp = xp;
        Ok(())
    }

    async fn leaderboard(
        &self,
        limit: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<Profile>, GatewayError> {
        let mut data = self.data.lock().unwrap();
        Self::guard(&data)?;
        data.last_leaderboard = Some((limit, since));
        let mut profiles: Vec<Profile> = data.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| b.xp.cmp(&a.xp));
        profiles.truncate(limit);
        Ok(profiles)
    }

    async fn create_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        let mut data = self.data.lock().unwrap();
        Self::guard(&data)?;
        let mut stored = notification.clone();
        stored.id = Some(format!("n{}", data.notifications.len() + 1));
        data.notifications.push(stored);
        Ok(())
    }

    async fn notifications(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, GatewayError> {
        let data = self.data.lock().unwrap();
        Self::guard(&data)?;
        Ok(data
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), GatewayError> {
        let mut data = self.data.lock().unwrap();
        Self::guard(&data)?;
        for notification in &mut data.notifications {
            if notification.id.as_deref() == Some(notification_id) {
                notification.read = true;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLocalStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl FakeLocalStore {
    pub fn collection(&self, name: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocalStore for FakeLocalStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.collection(collection))
    }

    async fn write_all(&self, collection: &str, records: &[Value]) -> Result<(), StoreError> {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), records.to_vec());
        Ok(())
    }

    async fn append(&self, collection: &str, record: Value) -> Result<(), StoreError> {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTranslator {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeTranslator {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TranslateError::Upstream {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(format!("[{}] {}", target_lang, text))
    }
}
