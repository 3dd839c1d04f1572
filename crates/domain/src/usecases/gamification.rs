//! Experience awards, profiles, leaderboard and notifications
//!
//! Awards are best-effort: the displayed total moves immediately and the
//! remote read-modify-write may fail without undoing it. The remote profile
//! is the source of truth on the next read. Updates are last-write-wins, so
//! concurrent awards from two sessions of one user can lose an increment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::ledger;
use crate::lock;
use crate::mapper::default_avatar;
use crate::model::{Notice, NoticeKind, Notification, Profile, Session, Timeframe};
use crate::ports::{Clock, GatewayError, LocalStore, ProfileStore};
use crate::usecases::search::timeframe_start;

/// Notification type recorded for every award
pub const XP_AWARDED: &str = "xp_awarded";

/// Local store collection mirroring a user's total
pub fn mirror_collection(user_id: &str) -> String {
    format!("user_xp_{}", user_id)
}

/// Result of one award
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XpAward {
    pub user_id: String,
    pub amount: u32,
    /// Total shown locally right after the award
    pub displayed_xp: u64,
    /// Total written to the backend, `None` if that write failed
    pub remote_xp: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    Remote,
    LocalMirror,
}

/// Display-ready profile progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub user_id: String,
    pub display_name: Option<String>,
    pub xp: u64,
    pub level: u64,
    pub progress: f64,
    pub source: XpSource,
}

impl ProfileSummary {
    fn new(user_id: &str, display_name: Option<String>, xp: u64, source: XpSource) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name,
            xp,
            level: ledger::level(xp),
            progress: ledger::progress(xp),
            source,
        }
    }
}

pub struct XpLedger {
    profiles: Arc<dyn ProfileStore>,
    local: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    notices: broadcast::Sender<Notice>,
    displayed: Mutex<HashMap<String, u64>>,
}

impl XpLedger {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        local: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
        notices: broadcast::Sender<Notice>,
    ) -> Self {
        Self {
            profiles,
            local,
            clock,
            notices,
            displayed: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the session user's profile, creating it with zero XP if absent
    pub async fn ensure_profile(&self, session: &Session) -> Result<Profile, GatewayError> {
        let profile = match self.profiles.get_profile(&session.user_id).await? {
            Some(profile) => profile,
            None => {
                let fresh = Profile {
                    id: session.user_id.clone(),
                    display_name: Some(session.display_name.clone()),
                    avatar_url: Some(
                        session
                            .avatar_url
                            .clone()
                            .unwrap_or_else(|| default_avatar(&session.display_name)),
                    ),
                    xp: 0,
                    created_at: Some(self.clock.now()),
                };
                tracing::info!(user_id = %session.user_id, "Creating profile");
                self.profiles.create_profile(&fresh).await?
            }
        };
        lock(&self.displayed).insert(profile.id.clone(), profile.xp);
        Ok(profile)
    }

    /// Current total shown for `user_id` without touching the backend
    pub async fn displayed_xp(&self, user_id: &str) -> u64 {
        let known = lock(&self.displayed).get(user_id).copied();
        match known {
            Some(xp) => xp,
            None => self.mirrored_xp(user_id).await.unwrap_or(0),
        }
    }

    /// Grant `amount` XP to `user_id`
    ///
    /// When `announce` is set an `Xp` notice `+N XP - reason` goes out
    /// before the remote write starts.
    pub async fn award(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
        related_id: Option<&str>,
        announce: bool,
    ) -> XpAward {
        let displayed_xp = self.displayed_xp(user_id).await + u64::from(amount);
        lock(&self.displayed).insert(user_id.to_string(), displayed_xp);
        if announce {
            let _ = self.notices.send(Notice::new(
                NoticeKind::Xp,
                format!("+{} XP - {}", amount, reason),
            ));
        }

        let remote_xp = match self.write_remote(user_id, amount).await {
            Ok(total) => {
                tracing::info!(user_id = %user_id, amount, total, reason = %reason, "XP awarded");
                lock(&self.displayed).insert(user_id.to_string(), total);
                self.notify(user_id, amount, reason, related_id).await;
                Some(total)
            }
            Err(error) => {
                tracing::warn!(
                    user_id = %user_id,
                    amount,
                    error = %error,
                    "Failed to persist XP, keeping local display"
                );
                None
            }
        };

        self.write_mirror(user_id, remote_xp.unwrap_or(displayed_xp))
            .await;

        XpAward {
            user_id: user_id.to_string(),
            amount,
            displayed_xp,
            remote_xp,
        }
    }

    /// XP, level and progress, falling back to the local mirror when the
    /// backend cannot be read
    pub async fn summary(&self, user_id: &str) -> ProfileSummary {
        match self.profiles.get_profile(user_id).await {
            Ok(Some(profile)) => {
                ProfileSummary::new(user_id, profile.display_name, profile.xp, XpSource::Remote)
            }
            Ok(None) => ProfileSummary::new(user_id, None, 0, XpSource::Remote),
            Err(error) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %error,
                    "Profile read failed, using local mirror"
                );
                let xp = self.mirrored_xp(user_id).await.unwrap_or(0);
                ProfileSummary::new(user_id, None, xp, XpSource::LocalMirror)
            }
        }
    }

    pub async fn leaderboard(
        &self,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Profile>, GatewayError> {
        let since = timeframe_start(timeframe, self.clock.now());
        self.profiles.leaderboard(limit, since).await
    }

    pub async fn unread_notifications(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, GatewayError> {
        let all = self.profiles.notifications(user_id, limit).await?;
        Ok(all.into_iter().filter(|n| !n.read).collect())
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<(), GatewayError> {
        self.profiles.mark_notification_read(notification_id).await
    }

    async fn write_remote(&self, user_id: &str, amount: u32) -> Result<u64, GatewayError> {
        let current = match self.profiles.get_profile(user_id).await? {
            Some(profile) => profile.xp,
            None => {
                let fresh = Profile {
                    id: user_id.to_string(),
                    display_name: None,
                    avatar_url: None,
                    xp: 0,
                    created_at: Some(self.clock.now()),
                };
                self.profiles.create_profile(&fresh).await?.xp
            }
        };
        let total = current.saturating_add(u64::from(amount));
        self.profiles.set_xp(user_id, total).await?;
        Ok(total)
    }

    async fn notify(&self, user_id: &str, amount: u32, reason: &str, related_id: Option<&str>) {
        let notification = Notification {
            id: None,
            user_id: user_id.to_string(),
            kind: XP_AWARDED.to_string(),
            content: format!("You earned {} XP for {}", amount, reason.to_lowercase()),
            related_id: related_id.map(String::from),
            read: false,
            created_at: Some(self.clock.now()),
        };
        if let Err(error) = self.profiles.create_notification(&notification).await {
            tracing::debug!(user_id = %user_id, error = %error, "Notification not recorded");
        }
    }

    async fn mirrored_xp(&self, user_id: &str) -> Option<u64> {
        let records = self
            .local
            .read_all(&mirror_collection(user_id))
            .await
            .ok()?;
        records.first()?.get("xp")?.as_u64()
    }

    async fn write_mirror(&self, user_id: &str, xp: u64) {
        let record = json!({ "xp": xp });
        if let Err(error) = self
            .local
            .write_all(&mirror_collection(user_id), &[record])
            .await
        {
            tracing::warn!(user_id = %user_id, error = %error, "Failed to mirror XP locally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::testing::{FakeLocalStore, FakeProfiles};
    use time::macros::datetime;

    fn ledger(profiles: Arc<FakeProfiles>, local: Arc<FakeLocalStore>) -> XpLedger {
        let (notices, _) = broadcast::channel(16);
        XpLedger::new(
            profiles,
            local,
            Arc::new(FixedClock(datetime!(2024-06-13 12:00 UTC))),
            notices,
        )
    }

    fn session(id: &str) -> Session {
        Session {
            user_id: id.to_string(),
            display_name: format!("user {}", id),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn ensure_profile_creates_once_with_zero_xp() {
        let profiles = Arc::new(FakeProfiles::default());
        let ledger = ledger(profiles.clone(), Arc::new(FakeLocalStore::default()));

        let created = ledger.ensure_profile(&session("a")).await.unwrap();
        assert_eq!(created.xp, 0);
        assert_eq!(
            created.avatar_url.as_deref(),
            Some("https://api.dicebear.com/7.x/avataaars/svg?seed=user a")
        );

        ledger.ensure_profile(&session("a")).await.unwrap();
        assert_eq!(profiles.created(), 1);
    }

    #[tokio::test]
    async fn award_updates_display_remote_mirror_and_notifications() {
        let profiles = Arc::new(FakeProfiles::default());
        let local = Arc::new(FakeLocalStore::default());
        let (notices, mut rx) = broadcast::channel(16);
        let ledger = XpLedger::new(
            profiles.clone(),
            local.clone(),
            Arc::new(FixedClock(datetime!(2024-06-13 12:00 UTC))),
            notices,
        );
        ledger.ensure_profile(&session("a")).await.unwrap();

        let award = ledger
            .award("a", 50, "Posted question", Some("q1"), true)
            .await;

        assert_eq!(award.displayed_xp, 50);
        assert_eq!(award.remote_xp, Some(50));
        assert_eq!(profiles.xp("a"), Some(50));
        assert_eq!(rx.try_recv().unwrap().message, "+50 XP - Posted question");

        let mirror = local.collection("user_xp_a");
        assert_eq!(mirror, vec![json!({"xp": 50})]);

        let unread = ledger.unread_notifications("a", 10).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, "xp_awarded");
        assert_eq!(unread[0].content, "You earned 50 XP for posted question");
        assert_eq!(unread[0].related_id.as_deref(), Some("q1"));
    }

    #[tokio::test]
    async fn remote_failure_keeps_local_display() {
        let profiles = Arc::new(FakeProfiles::default());
        let local = Arc::new(FakeLocalStore::default());
        let ledger = ledger(profiles.clone(), local.clone());
        ledger.ensure_profile(&session("a")).await.unwrap();
        profiles.set_unavailable(true);

        let award = ledger.award("a", 10, "Posted answer", None, true).await;

        assert_eq!(award.displayed_xp, 10);
        assert_eq!(award.remote_xp, None);
        assert_eq!(ledger.displayed_xp("a").await, 10);

        let summary = ledger.summary("a").await;
        assert_eq!(summary.source, XpSource::LocalMirror);
        assert_eq!(summary.xp, 10);
    }

    #[tokio::test]
    async fn award_to_unknown_user_creates_profile_lazily() {
        let profiles = Arc::new(FakeProfiles::default());
        let ledger = ledger(profiles.clone(), Arc::new(FakeLocalStore::default()));

        let award = ledger.award("b", 25, "Best answer", Some("r1"), false).await;

        assert_eq!(award.remote_xp, Some(25));
        assert_eq!(profiles.xp("b"), Some(25));
    }

    #[tokio::test]
    async fn summary_derives_level_and_progress() {
        let profiles = Arc::new(FakeProfiles::default());
        profiles.insert(Profile {
            id: "a".to_string(),
            display_name: Some("alice".to_string()),
            avatar_url: None,
            xp: 2500,
            created_at: None,
        });
        let ledger = ledger(profiles, Arc::new(FakeLocalStore::default()));

        let summary = ledger.summary("a").await;
        assert_eq!(summary.level, 3);
        assert!((summary.progress - 0.5).abs() < f64::EPSILON);
        assert_eq!(summary.source, XpSource::Remote);
    }

    #[tokio::test]
    async fn leaderboard_passes_window_start() {
        let profiles = Arc::new(FakeProfiles::default());
        let ledger = ledger(profiles.clone(), Arc::new(FakeLocalStore::default()));

        ledger.leaderboard(Timeframe::Weekly, 5).await.unwrap();

        assert_eq!(
            profiles.last_leaderboard_query(),
            Some((5, Some(datetime!(2024-06-09 0:00 UTC))))
        );
    }
}
