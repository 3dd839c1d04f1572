//! In-memory hosted backend
//!
//! Implements both the question gateway and the profile store on shared
//! process-local state. Writes emit change events to every live subscriber.
//! Failures can be injected per operation for offline demos and tests.

use async_trait::async_trait;
use connectum_domain::{
    ChangeEvent, ChangeKind, Clock, FeedMessage, GatewayError, NewQuestion, NewReply,
    Notification, Profile, ProfileStore, QuestionRecord, RemoteGateway, ReplyRecord,
    Subscription, Table,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct State {
    questions: Vec<QuestionRecord>,
    profiles: HashMap<String, Profile>,
    notifications: Vec<Notification>,
    failures: HashMap<String, VecDeque<GatewayError>>,
    unavailable: bool,
    next_subscriber: u64,
    subscribers: Vec<(u64, UnboundedSender<FeedMessage>)>,
}

impl State {
    fn check(&mut self, op: &str) -> Result<(), GatewayError> {
        if self.unavailable {
            return Err(GatewayError::RemoteUnavailable(
                "in-memory backend offline".to_string(),
            ));
        }
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn broadcast(&mut self, message: FeedMessage) {
        self.subscribers
            .retain(|(_, tx)| tx.send(message.clone()).is_ok());
    }

    fn emit(&mut self, table: Table, kind: ChangeKind, record_id: &str, question_id: Option<&str>) {
        self.broadcast(FeedMessage::Change(ChangeEvent {
            table,
            kind,
            record_id: record_id.to_string(),
            question_id: question_id.map(String::from),
        }));
    }

    fn question_mut(&mut self, id: &str) -> Result<&mut QuestionRecord, GatewayError> {
        self.questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("question {}", id)))
    }
}

/// Process-local backend sharing one state between gateway and profile store
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Backend pre-filled with a handful of multilingual questions
    pub fn with_demo_data(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let backend = Self::new(clock);
        for record in demo_questions(now) {
            backend.seed(record);
        }
        backend
    }

    pub fn seed(&self, record: QuestionRecord) {
        lock(&self.state).questions.push(record);
    }

    pub fn seed_profile(&self, profile: Profile) {
        lock(&self.state)
            .profiles
            .insert(profile.id.clone(), profile);
    }

    /// Fail the next call of `op` (a trait method name) with `error`
    pub fn fail_next(&self, op: &str, error: GatewayError) {
        lock(&self.state)
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make every call fail as unreachable until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
        tracing::debug!(unavailable, "In-memory backend availability changed");
    }

    /// Deliver `message` to every live subscriber
    pub fn push(&self, message: FeedMessage) {
        lock(&self.state).broadcast(message);
    }

    /// Close every subscription with `reason`
    pub fn close_subscriptions(&self, reason: &str) {
        let mut state = lock(&self.state);
        for (_, tx) in state.subscribers.drain(..) {
            let _ = tx.send(FeedMessage::Closed {
                reason: reason.to_string(),
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }

    pub fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        lock(&self.state)
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> Option<OffsetDateTime>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl RemoteGateway for InMemoryBackend {
    async fn fetch_questions(&self) -> Result<Vec<QuestionRecord>, GatewayError> {
        let mut state = lock(&self.state);
        state.check("fetch_questions")?;
        let mut questions = state.questions.clone();
        newest_first(&mut questions, |q| q.created_at);
        for question in &mut questions {
            newest_first(&mut question.replies, |r| r.created_at);
            question
                .replies
                .sort_by(|a, b| b.is_best_answer.cmp(&a.is_best_answer));
        }
        Ok(questions)
    }

    async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, GatewayError> {
        let mut state = lock(&self.state);
        state.check("fetch_question")?;
        state.question_mut(id).map(|q| q.clone())
    }

    async fn create_question(
        &self,
        question: &NewQuestion,
    ) -> Result<QuestionRecord, GatewayError> {
        let now = self.now();
        let mut state = lock(&self.state);
        state.check("create_question")?;
        let record = QuestionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            text: question.text.clone(),
            language: question.language.clone(),
            category: question.category.clone(),
            author_name: question.author_name.clone(),
            author_id: question.author_id.clone(),
            author_avatar: question.author_avatar.clone(),
            xp_reward: question.xp_reward,
            created_at: Some(now),
            replies: vec![],
            liked_by: vec![],
        };
        state.questions.push(record.clone());
        state.emit(Table::Questions, ChangeKind::Insert, &record.id, None);
        Ok(record)
    }

    async fn create_reply(&self, reply: &NewReply) -> Result<ReplyRecord, GatewayError> {
        let now = self.now();
        let mut state = lock(&self.state);
        state.check("create_reply")?;
        let record = ReplyRecord {
            id: uuid::Uuid::new_v4().to_string(),
            question_id: reply.question_id.clone(),
            text: reply.text.clone(),
            author_name: reply.author_name.clone(),
            author_id: reply.author_id.clone(),
            avatar: reply.avatar.clone(),
            is_best_answer: false,
            created_at: Some(now),
        };
        state
            .question_mut(&reply.question_id)?
            .replies
            .push(record.clone());
        state.emit(
            Table::Replies,
            ChangeKind::Insert,
            &record.id,
            Some(&reply.question_id),
        );
        Ok(record)
    }

    async fn set_best_answer(&self, reply_id: &str) -> Result<(), GatewayError> {
        let mut state = lock(&self.state);
        state.check("set_best_answer")?;
        let question = state
            .questions
            .iter_mut()
            .find(|q| q.replies.iter().any(|r| r.id == reply_id))
            .ok_or_else(|| GatewayError::NotFound(format!("reply {}", reply_id)))?;
        for reply in &mut question.replies {
            reply.is_best_answer = reply.id == reply_id;
        }
        let question_id = question.id.clone();
        state.emit(
            Table::Replies,
            ChangeKind::Update,
            reply_id,
            Some(&question_id),
        );
        Ok(())
    }

    async fn toggle_like(&self, question_id: &str, user_id: &str) -> Result<(), GatewayError> {
        let mut state = lock(&self.state);
        state.check("toggle_like")?;
        let question = state.question_mut(question_id)?;
        let kind = match question.liked_by.iter().position(|u| u == user_id) {
            Some(pos) => {
                question.liked_by.remove(pos);
                ChangeKind::Delete
            }
            None => {
                question.liked_by.push(user_id.to_string());
                ChangeKind::Insert
            }
        };
        let record_id = format!("{}:{}", question_id, user_id);
        state.emit(Table::Likes, kind, &record_id, Some(question_id));
        Ok(())
    }

    async fn subscribe(
        &self,
        events: UnboundedSender<FeedMessage>,
    ) -> Result<Subscription, GatewayError> {
        let mut state = lock(&self.state);
        state.check("subscribe")?;
        state.next_subscriber += 1;
        let id = state.next_subscriber;
        state.subscribers.push((id, events));

        let shared = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            lock(&shared).subscribers.retain(|(sub, _)| *sub != id);
        }))
    }
}

#[async_trait]
impl ProfileStore for InMemoryBackend {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError> {
        let mut state = lock(&self.state);
        state.check("get_profile")?;
        Ok(state.profiles.get(user_id).cloned())
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, GatewayError> {
        let now = self.now();
        let mut state = lock(&self.state);
        state.check("create_profile")?;
        if state.profiles.contains_key(&profile.id) {
            return Err(GatewayError::Conflict(format!("profile {}", profile.id)));
        }
        let mut created = profile.clone();
        created.created_at.get_or_insert(now);
        state.profiles.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn set_xp(&self, user_id: &str, xp: u64) -> Result<(), GatewayError> {
        let mut state = lock(&self.state);
        state.check("set_xp")?;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("profile {}", user_id)))?;
        profile.xp = xp;
        Ok(())
    }

    async fn leaderboard(
        &self,
        limit: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<Profile>, GatewayError> {
        let mut state = lock(&self.state);
        state.check("leaderboard")?;
        let mut profiles: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| match (since, p.created_at) {
                (Some(since), Some(created)) => created >= since,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        profiles.sort_by(|a, b| b.xp.cmp(&a.xp).then_with(|| a.id.cmp(&b.id)));
        profiles.truncate(limit);
        Ok(profiles)
    }

    async fn create_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        let now = self.now();
        let mut state = lock(&self.state);
        state.check("create_notification")?;
        let mut stored = notification.clone();
        stored
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
        stored.created_at.get_or_insert(now);
        state.notifications.push(stored);
        Ok(())
    }

    async fn notifications(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, GatewayError> {
        let mut state = lock(&self.state);
        state.check("notifications")?;
        let mut found: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut found, |n| n.created_at);
        found.truncate(limit);
        Ok(found)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), GatewayError> {
        let mut state = lock(&self.state);
        state.check("mark_notification_read")?;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id.as_deref() == Some(notification_id))
            .ok_or_else(|| GatewayError::NotFound(format!("notification {}", notification_id)))?;
        notification.read = true;
        Ok(())
    }
}

fn demo_questions(now: OffsetDateTime) -> Vec<QuestionRecord> {
    let question = |id: &str, text: &str, language: &str, author: &str, minutes: i64| {
        QuestionRecord {
            id: id.to_string(),
            text: text.to_string(),
            language: language.to_string(),
            category: Some("Culture".to_string()),
            author_name: Some(author.to_string()),
            author_id: Some(format!("demo-{}", author.to_lowercase())),
            author_avatar: None,
            xp_reward: 50,
            created_at: Some(now - time::Duration::minutes(minutes)),
            replies: vec![],
            liked_by: vec![],
        }
    };

    let mut kyiv = question(
        "demo-1",
        "Що варто спробувати в Києві вперше?",
        "Ukrainian",
        "Olena",
        5,
    );
    kyiv.replies.push(ReplyRecord {
        id: "demo-1-r1".to_string(),
        question_id: "demo-1".to_string(),
        text: "Borscht at a local canteen, then a walk along Andriyivskyy Descent.".to_string(),
        author_name: Some("Kenji".to_string()),
        author_id: Some("demo-kenji".to_string()),
        avatar: None,
        is_best_answer: true,
        created_at: Some(now - time::Duration::minutes(2)),
    });

    vec![
        kyiv,
        question(
            "demo-2",
            "東京で静かなカフェを知っていますか？",
            "Japanese",
            "Kenji",
            90,
        ),
        question(
            "demo-3",
            "¿Cuál es la mejor época para visitar Sevilla?",
            "Spanish",
            "Lucia",
            60 * 26,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectum_domain::FixedClock;
    use time::macros::datetime;
    use tokio::sync::mpsc;

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new(Arc::new(FixedClock(datetime!(2024-06-01 12:00 UTC))))
    }

    fn new_question(text: &str) -> NewQuestion {
        NewQuestion {
            text: text.to_string(),
            language: "English".to_string(),
            category: None,
            author_name: Some("Ana".to_string()),
            author_id: Some("u1".to_string()),
            author_avatar: None,
            xp_reward: 50,
        }
    }

    #[tokio::test]
    async fn test_writes_emit_change_events() {
        let backend = backend();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = backend.subscribe(tx).await.unwrap();

        let question = backend.create_question(&new_question("Hi?")).await.unwrap();
        backend.toggle_like(&question.id, "u2").await.unwrap();

        let FeedMessage::Change(inserted) = rx.recv().await.unwrap() else {
            panic!("expected change");
        };
        assert_eq!(inserted.table, Table::Questions);
        assert_eq!(inserted.record_id, question.id);

        let FeedMessage::Change(liked) = rx.recv().await.unwrap() else {
            panic!("expected change");
        };
        assert_eq!(liked.table, Table::Likes);
        assert_eq!(liked.affected_question(), Some(question.id.as_str()));
    }

    #[tokio::test]
    async fn test_dropping_subscription_detaches_subscriber() {
        let backend = backend();
        let (tx, _rx) = mpsc::unbounded_channel();
        let subscription = backend.subscribe(tx).await.unwrap();
        assert_eq!(backend.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_best_answer_is_exclusive() {
        let backend = backend();
        let question = backend.create_question(&new_question("Hi?")).await.unwrap();
        let reply = |text: &str| NewReply {
            question_id: question.id.clone(),
            text: text.to_string(),
            author_name: None,
            author_id: None,
            avatar: None,
        };
        let first = backend.create_reply(&reply("one")).await.unwrap();
        let second = backend.create_reply(&reply("two")).await.unwrap();

        backend.set_best_answer(&first.id).await.unwrap();
        backend.set_best_answer(&second.id).await.unwrap();

        let stored = backend.fetch_question(&question.id).await.unwrap();
        let best: Vec<_> = stored.replies.iter().filter(|r| r.is_best_answer).collect();
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].id, second.id);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_once() {
        let backend = backend();
        backend.fail_next(
            "fetch_questions",
            GatewayError::RemoteUnavailable("boom".to_string()),
        );

        assert!(backend.fetch_questions().await.unwrap_err().is_unavailable());
        assert!(backend.fetch_questions().await.is_ok());

        backend.set_unavailable(true);
        assert!(backend.get_profile("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_xp_and_filters_since() {
        let backend = backend();
        let profile = |id: &str, xp: u64, day: u8| Profile {
            id: id.to_string(),
            display_name: None,
            avatar_url: None,
            xp,
            created_at: Some(
                datetime!(2024-05-01 00:00 UTC)
                    .replace_day(day)
                    .unwrap(),
            ),
        };
        backend.seed_profile(profile("old", 900, 1));
        backend.seed_profile(profile("mid", 300, 20));
        backend.seed_profile(profile("top", 500, 28));

        let all = backend.leaderboard(10, None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "top", "mid"]);

        let recent = backend
            .leaderboard(1, Some(datetime!(2024-05-15 00:00 UTC)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "top");
    }

    #[tokio::test]
    async fn test_notifications_can_be_marked_read() {
        let backend = backend();
        backend
            .create_notification(&Notification {
                id: None,
                user_id: "u1".to_string(),
                kind: "xp_awarded".to_string(),
                content: "You earned 10 XP for posted answer".to_string(),
                related_id: None,
                read: false,
                created_at: None,
            })
            .await
            .unwrap();

        let listed = backend.notifications("u1", 20).await.unwrap();
        let id = listed[0].id.clone().unwrap();
        backend.mark_notification_read(&id).await.unwrap();

        assert!(backend.notifications_for("u1")[0].read);
    }

    #[tokio::test]
    async fn test_demo_data_is_newest_first() {
        let backend = InMemoryBackend::with_demo_data(Arc::new(FixedClock(datetime!(
            2024-06-01 12:00 UTC
        ))));
        let questions = backend.fetch_questions().await.unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].id, "demo-1");
        assert!(questions[0].replies[0].is_best_answer);
    }
}
