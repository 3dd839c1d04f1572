//! Realtime reconciler - consumes change events and merges affected questions
//!
//! Events arrive on one internal queue. Each wake-up drains everything queued,
//! coalesces it by question id and re-fetches only what changed. A dead
//! subscription is recreated with exponential backoff.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::model::FeedMessage;
use crate::usecases::feed::Feed;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay before the first re-subscribe attempt
    pub base_backoff: Duration,
    /// Highest power of two applied to `base_backoff`
    pub max_backoff_exponent: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_secs(5),
            max_backoff_exponent: 8,
        }
    }
}

/// `base * 2^min(failures, max_exponent)`
pub fn backoff_delay(base: Duration, consecutive_failures: u32, max_exponent: u32) -> Duration {
    let capped = consecutive_failures.min(max_exponent);
    base.saturating_mul(2_u32.saturating_pow(capped))
}

/// What one drained batch of messages asks for
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub questions: BTreeSet<String>,
    pub full_refresh: bool,
    pub closed: Option<String>,
}

impl ReconcilePlan {
    pub fn from_messages(messages: impl IntoIterator<Item = FeedMessage>) -> Self {
        let mut plan = Self::default();
        for message in messages {
            match message {
                FeedMessage::Change(event) => match event.affected_question() {
                    Some(id) => {
                        plan.questions.insert(id.to_string());
                    }
                    None => plan.full_refresh = true,
                },
                FeedMessage::Closed { reason } => plan.closed = Some(reason),
            }
        }
        if plan.full_refresh {
            plan.questions.clear();
        }
        plan
    }

    fn is_empty(&self) -> bool {
        self.questions.is_empty() && !self.full_refresh
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

pub struct Reconciler {
    feed: Arc<Feed>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(feed: Arc<Feed>, config: ReconcilerConfig) -> Self {
        Self { feed, config }
    }

    /// Run on a background task until the handle is stopped
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        ReconcilerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Subscribe and merge until `shutdown` flips or the feed closes
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;
        let mut resubscribing = false;

        loop {
            if *shutdown.borrow() || self.feed.is_closed() {
                break;
            }

            let (tx, mut rx) = mpsc::unbounded_channel();
            let subscription = match self.feed.gateway().subscribe(tx).await {
                Ok(subscription) => subscription,
                Err(error) => {
                    tracing::warn!(error = %error, failures, "Subscribe failed");
                    if self.back_off(&mut shutdown, failures).await {
                        break;
                    }
                    failures = failures.saturating_add(1);
                    resubscribing = true;
                    continue;
                }
            };
            tracing::info!("Subscribed to change feed");

            if resubscribing {
                // catch up on whatever happened while disconnected
                if let Err(error) = self.feed.refresh_all().await {
                    tracing::warn!(error = %error, "Catch-up refresh failed");
                }
            }

            let end = self
                .consume(&mut rx, &mut shutdown, &mut failures)
                .await;
            subscription.unsubscribe();

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    tracing::warn!(reason = %reason, failures, "Change feed lost, re-subscribing");
                    if self.back_off(&mut shutdown, failures).await {
                        break;
                    }
                    failures = failures.saturating_add(1);
                    resubscribing = true;
                }
            }
        }

        tracing::info!("Reconciler stopped");
    }

    async fn consume(
        &self,
        rx: &mut mpsc::UnboundedReceiver<FeedMessage>,
        shutdown: &mut watch::Receiver<bool>,
        failures: &mut u32,
    ) -> SessionEnd {
        loop {
            let first = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return SessionEnd::Shutdown;
                    }
                    continue;
                }
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => return SessionEnd::Lost("event channel closed".to_string()),
                },
            };

            let mut batch = vec![first];
            while let Ok(message) = rx.try_recv() {
                batch.push(message);
            }
            let received = batch.len();
            let plan = ReconcilePlan::from_messages(batch);

            if !plan.is_empty() {
                tracing::debug!(
                    received,
                    questions = plan.questions.len(),
                    full_refresh = plan.full_refresh,
                    "Reconciling"
                );
                *failures = 0;
                self.apply(&plan).await;
            }

            if self.feed.is_closed() {
                return SessionEnd::Shutdown;
            }
            if let Some(reason) = plan.closed {
                return SessionEnd::Lost(reason);
            }
        }
    }

    async fn apply(&self, plan: &ReconcilePlan) {
        if plan.full_refresh {
            if let Err(error) = self.feed.refresh_all().await {
                tracing::warn!(error = %error, "Full refresh failed");
            }
            return;
        }
        for id in &plan.questions {
            if let Err(error) = self.feed.refresh_question(id).await {
                tracing::warn!(question_id = %id, error = %error, "Refresh failed");
            }
        }
    }

    /// Sleep before the next attempt; true if shutdown arrived meanwhile
    async fn back_off(&self, shutdown: &mut watch::Receiver<bool>, failures: u32) -> bool {
        let delay = backoff_delay(
            self.config.base_backoff,
            failures,
            self.config.max_backoff_exponent,
        );
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
        tokio::select! {
            _ = tokio::time::sleep(delay) => *shutdown.borrow() || self.feed.is_closed(),
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}

/// Owner of a spawned reconciler
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signal shutdown and wait until the subscription is released
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::error!(error = %error, "Reconciler task failed");
        }
    }
}
