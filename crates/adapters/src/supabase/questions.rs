//! Questions, replies and likes over the REST API

use async_trait::async_trait;
use connectum_domain::{
    FeedMessage, GatewayError, NewQuestion, NewReply, QuestionRecord, RemoteGateway, ReplyRecord,
    Subscription,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;

use super::SupabaseGateway;
use crate::change_feed::{SnapshotSource, spawn_polling};

const QUESTION_SELECT: &str = "*,replies(*),likes(user_id)";

#[derive(Debug, Deserialize)]
struct QuestionRow {
    id: String,
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    author_avatar: Option<String>,
    #[serde(default)]
    xp_reward: Option<u32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
    #[serde(default)]
    replies: Vec<ReplyRecord>,
    #[serde(default)]
    likes: Vec<LikeRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LikeRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    question_id: Option<String>,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ReplyParent {
    question_id: String,
}

impl From<QuestionRow> for QuestionRecord {
    fn from(row: QuestionRow) -> Self {
        let mut replies = row.replies;
        order_replies(&mut replies);
        Self {
            id: row.id,
            text: row.text,
            language: row.language.unwrap_or_default(),
            category: row.category,
            author_name: row.author_name,
            author_id: row.author_id,
            author_avatar: row.author_avatar,
            xp_reward: row.xp_reward.unwrap_or(0),
            created_at: row.created_at,
            replies,
            liked_by: row.likes.into_iter().map(|like| like.user_id).collect(),
        }
    }
}

/// Best answer first, then newest first
fn order_replies(replies: &mut [ReplyRecord]) {
    replies.sort_by(|a, b| {
        b.is_best_answer
            .cmp(&a.is_best_answer)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RemoteGateway for SupabaseGateway {
    async fn fetch_questions(&self) -> Result<Vec<QuestionRecord>, GatewayError> {
        let request = self.get("questions").query(&[
            ("select", QUESTION_SELECT),
            ("order", "created_at.desc"),
            ("replies.order", "created_at.desc"),
        ]);
        let rows: Vec<QuestionRow> = self.rows(request).await?;
        tracing::debug!(count = rows.len(), "Fetched questions");
        Ok(rows.into_iter().map(QuestionRecord::from).collect())
    }

    async fn fetch_question(&self, id: &str) -> Result<QuestionRecord, GatewayError> {
        let request = self.get("questions").query(&[
            ("select", QUESTION_SELECT.to_string()),
            ("id", eq(id)),
            ("replies.order", "created_at.desc".to_string()),
        ]);
        let row: QuestionRow = self.single(request, &format!("question {}", id)).await?;
        Ok(row.into())
    }

    async fn create_question(
        &self,
        question: &NewQuestion,
    ) -> Result<QuestionRecord, GatewayError> {
        let row: QuestionRow = self
            .single(self.post("questions").json(question), "created question")
            .await?;
        tracing::info!(question_id = %row.id, "Question created");
        Ok(row.into())
    }

    async fn create_reply(&self, reply: &NewReply) -> Result<ReplyRecord, GatewayError> {
        let row: ReplyRecord = self
            .single(self.post("replies").json(reply), "created reply")
            .await?;
        tracing::info!(reply_id = %row.id, question_id = %row.question_id, "Reply created");
        Ok(row)
    }

    async fn set_best_answer(&self, reply_id: &str) -> Result<(), GatewayError> {
        let lookup = self
            .get("replies")
            .query(&[("select", "question_id".to_string()), ("id", eq(reply_id))]);
        let parent: ReplyParent = self.single(lookup, &format!("reply {}", reply_id)).await?;

        let clear = self
            .patch("replies")
            .query(&[("question_id", eq(&parent.question_id))])
            .json(&serde_json::json!({ "is_best_answer": false }));
        self.send(clear).await?;

        let set = self
            .patch("replies")
            .query(&[("id", eq(reply_id))])
            .json(&serde_json::json!({ "is_best_answer": true }));
        self.send(set).await?;

        tracing::info!(reply_id, question_id = %parent.question_id, "Best answer stored");
        Ok(())
    }

    async fn toggle_like(&self, question_id: &str, user_id: &str) -> Result<(), GatewayError> {
        let filters = [("question_id", eq(question_id)), ("user_id", eq(user_id))];
        let existing: Vec<LikeRow> = self
            .rows(
                self.get("likes")
                    .query(&[("select", "user_id")])
                    .query(&filters),
            )
            .await?;

        if existing.is_empty() {
            let like = LikeRow {
                question_id: Some(question_id.to_string()),
                user_id: user_id.to_string(),
            };
            self.send(self.post("likes").json(&like)).await?;
            tracing::debug!(question_id, user_id, "Like added");
        } else {
            self.send(self.delete("likes").query(&filters)).await?;
            tracing::debug!(question_id, user_id, "Like removed");
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        events: UnboundedSender<FeedMessage>,
    ) -> Result<Subscription, GatewayError> {
        // Fail fast so the caller can back off instead of polling a dead backend
        self.fetch_questions().await?;
        tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "Change feed started");
        Ok(spawn_polling(
            Arc::new(self.clone()),
            self.poll_interval,
            events,
        ))
    }
}

#[async_trait]
impl SnapshotSource for SupabaseGateway {
    async fn snapshot(&self) -> Result<Vec<QuestionRecord>, GatewayError> {
        self.fetch_questions().await
    }
}
