//! Polling change feed
//!
//! Turns periodic full snapshots into insert/update/delete events by
//! comparing per-row fingerprints. The first snapshot only sets the baseline.

use async_trait::async_trait;
use connectum_domain::{
    ChangeEvent, ChangeKind, FeedMessage, GatewayError, QuestionRecord, Subscription, Table,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;

/// Consecutive snapshot failures before the feed reports itself closed
pub const MAX_POLL_FAILURES: u32 = 3;

/// Anything that can produce a full question snapshot
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn snapshot(&self) -> Result<Vec<QuestionRecord>, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    table: Table,
    record_id: String,
    question_id: Option<String>,
    fingerprint: String,
}

fn fingerprint(value: &impl Serialize) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/// Fingerprints of every question, reply and like in one snapshot
#[derive(Debug, Default, Clone)]
pub struct Fingerprints {
    rows: HashMap<String, Row>,
}

impl Fingerprints {
    pub fn of(records: &[QuestionRecord]) -> Self {
        let mut rows = HashMap::new();
        for record in records {
            let mut question = record.clone();
            question.replies.clear();
            question.liked_by.clear();
            rows.insert(
                format!("questions:{}", record.id),
                Row {
                    table: Table::Questions,
                    record_id: record.id.clone(),
                    question_id: None,
                    fingerprint: fingerprint(&question),
                },
            );

            for reply in &record.replies {
                rows.insert(
                    format!("replies:{}", reply.id),
                    Row {
                        table: Table::Replies,
                        record_id: reply.id.clone(),
                        question_id: Some(record.id.clone()),
                        fingerprint: fingerprint(reply),
                    },
                );
            }

            for user in &record.liked_by {
                let id = format!("{}:{}", record.id, user);
                rows.insert(
                    format!("likes:{}", id),
                    Row {
                        table: Table::Likes,
                        record_id: id,
                        question_id: Some(record.id.clone()),
                        fingerprint: String::new(),
                    },
                );
            }
        }
        Self { rows }
    }

    /// Events turning `self` into `next`
    pub fn diff(&self, next: &Fingerprints) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for (key, row) in &next.rows {
            let kind = match self.rows.get(key) {
                None => ChangeKind::Insert,
                Some(old) if old.fingerprint != row.fingerprint => ChangeKind::Update,
                Some(_) => continue,
            };
            events.push(event(row, kind));
        }

        for (key, row) in &self.rows {
            if !next.rows.contains_key(key) {
                events.push(event(row, ChangeKind::Delete));
            }
        }

        events
    }
}

fn event(row: &Row, kind: ChangeKind) -> ChangeEvent {
    ChangeEvent {
        table: row.table,
        kind,
        record_id: row.record_id.clone(),
        question_id: row.question_id.clone(),
    }
}

/// Poll `source` every `period` and push changes into `events`
///
/// The returned guard stops polling when dropped. After
/// [`MAX_POLL_FAILURES`] failed snapshots in a row a `Closed` message is sent
/// and polling ends, leaving re-subscription to the consumer.
pub fn spawn_polling(
    source: Arc<dyn SnapshotSource>,
    period: Duration,
    events: UnboundedSender<FeedMessage>,
) -> Subscription {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut known: Option<Fingerprints> = None;
        let mut failures: u32 = 0;

        loop {
            ticker.tick().await;
            if events.is_closed() {
                break;
            }

            match source.snapshot().await {
                Ok(records) => {
                    failures = 0;
                    let next = Fingerprints::of(&records);
                    if let Some(previous) = &known {
                        let changes = previous.diff(&next);
                        if !changes.is_empty() {
                            tracing::debug!(count = changes.len(), "Change feed detected changes");
                        }
                        for change in changes {
                            if events.send(FeedMessage::Change(change)).is_err() {
                                return;
                            }
                        }
                    }
                    known = Some(next);
                }
                Err(error) => {
                    failures += 1;
                    tracing::warn!(error = %error, failures, "Change feed snapshot failed");
                    if failures >= MAX_POLL_FAILURES {
                        let _ = events.send(FeedMessage::Closed {
                            reason: error.to_string(),
                        });
                        break;
                    }
                }
            }
        }
    });

    Subscription::new(move || task.abort())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectum_domain::ReplyRecord;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn question(id: &str) -> QuestionRecord {
        QuestionRecord {
            id: id.to_string(),
            text: "Best way to learn Rust?".to_string(),
            language: "English".to_string(),
            category: None,
            author_name: None,
            author_id: None,
            author_avatar: None,
            xp_reward: 50,
            created_at: None,
            replies: vec![],
            liked_by: vec![],
        }
    }

    fn reply(id: &str, question_id: &str) -> ReplyRecord {
        ReplyRecord {
            id: id.to_string(),
            question_id: question_id.to_string(),
            text: "Start with the book.".to_string(),
            author_name: None,
            author_id: None,
            avatar: None,
            is_best_answer: false,
            created_at: None,
        }
    }

    #[test]
    fn test_diff_detects_insert_update_delete() {
        let mut q1 = question("q1");
        let before = Fingerprints::of(&[q1.clone(), question("q2")]);

        q1.replies.push(reply("r1", "q1"));
        q1.liked_by.push("bob".to_string());
        let after = Fingerprints::of(&[q1.clone()]);

        let events = before.diff(&after);
        let find = |table: Table| {
            events
                .iter()
                .find(|e| e.table == table)
                .unwrap_or_else(|| panic!("no {:?} event in {:?}", table, events))
        };

        assert_eq!(events.len(), 3);
        let deleted = find(Table::Questions);
        assert_eq!(deleted.kind, ChangeKind::Delete);
        assert_eq!(deleted.record_id, "q2");
        let liked = find(Table::Likes);
        assert_eq!(liked.kind, ChangeKind::Insert);
        assert_eq!(liked.question_id.as_deref(), Some("q1"));
        let replied = find(Table::Replies);
        assert_eq!(replied.kind, ChangeKind::Insert);
        assert_eq!(replied.record_id, "r1");

        let mut best = q1.clone();
        best.replies[0].is_best_answer = true;
        let updated = after.diff(&Fingerprints::of(&[best]));
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].kind, ChangeKind::Update);
        assert_eq!(updated[0].question_id.as_deref(), Some("q1"));
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let records = vec![question("q1")];
        assert!(
            Fingerprints::of(&records)
                .diff(&Fingerprints::of(&records))
                .is_empty()
        );
    }

    struct ScriptedSource {
        snapshots: Mutex<Vec<Result<Vec<QuestionRecord>, GatewayError>>>,
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn snapshot(&self) -> Result<Vec<QuestionRecord>, GatewayError> {
            let mut snapshots = self.snapshots.lock().unwrap();
            if snapshots.len() > 1 {
                snapshots.remove(0)
            } else {
                snapshots[0].clone()
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_emits_changes_then_closes_after_failures() {
        let down = || Err(GatewayError::RemoteUnavailable("down".to_string()));
        let source = Arc::new(ScriptedSource {
            snapshots: Mutex::new(vec![
                Ok(vec![]),
                Ok(vec![question("q1")]),
                down(),
                down(),
                down(),
            ]),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _subscription = spawn_polling(source, Duration::from_secs(5), tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            FeedMessage::Change(ChangeEvent { ref record_id, kind: ChangeKind::Insert, .. })
                if record_id == "q1"
        ));

        let closed = rx.recv().await.unwrap();
        assert!(matches!(closed, FeedMessage::Closed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_subscription_stops_polling() {
        let source = Arc::new(ScriptedSource {
            snapshots: Mutex::new(vec![Ok(vec![])]),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = spawn_polling(source, Duration::from_secs(5), tx);
        drop(subscription);

        // the aborted task drops its sender
        assert!(rx.recv().await.is_none());
    }
}
