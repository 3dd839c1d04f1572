//! Profiles, leaderboard and notifications over the REST API

use async_trait::async_trait;
use connectum_domain::{GatewayError, Notification, Profile, ProfileStore};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::SupabaseGateway;

const PROFILE_COLUMNS: &str = "id,username,full_name,avatar_url,xp,created_at";

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    xp: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            display_name: row.full_name.or(row.username),
            avatar_url: row.avatar_url,
            xp: row.xp.unwrap_or(0).max(0) as u64,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct NewProfileRow<'a> {
    id: &'a str,
    full_name: Option<&'a str>,
    avatar_url: Option<&'a str>,
    xp: u64,
}

#[derive(Debug, Serialize)]
struct NewNotificationRow<'a> {
    user_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a str,
    related_id: Option<&'a str>,
    read: bool,
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl ProfileStore for SupabaseGateway {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, GatewayError> {
        let request = self
            .get("profiles")
            .query(&[("select", PROFILE_COLUMNS.to_string()), ("id", eq(user_id))]);
        let rows: Vec<ProfileRow> = self.rows(request).await?;
        Ok(rows.into_iter().next().map(Profile::from))
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, GatewayError> {
        let row = NewProfileRow {
            id: &profile.id,
            full_name: profile.display_name.as_deref(),
            avatar_url: profile.avatar_url.as_deref(),
            xp: profile.xp,
        };
        let created: ProfileRow = self
            .single(self.post("profiles").json(&row), "created profile")
            .await?;
        tracing::info!(user_id = %created.id, "Profile created");
        Ok(created.into())
    }

    async fn set_xp(&self, user_id: &str, xp: u64) -> Result<(), GatewayError> {
        let request = self
            .patch("profiles")
            .header("Prefer", "return=representation")
            .query(&[("id", eq(user_id))])
            .json(&serde_json::json!({ "xp": xp }));
        let _: ProfileRow = self
            .single(request, &format!("profile {}", user_id))
            .await?;
        tracing::debug!(user_id, xp, "Profile xp stored");
        Ok(())
    }

    async fn leaderboard(
        &self,
        limit: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<Vec<Profile>, GatewayError> {
        let mut params = vec![
            ("select", PROFILE_COLUMNS.to_string()),
            ("order", "xp.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(since) = since {
            let since = since
                .format(&Rfc3339)
                .map_err(|e| GatewayError::RemoteUnavailable(format!("Invalid timestamp: {}", e)))?;
            params.push(("created_at", format!("gte.{}", since)));
        }

        let rows: Vec<ProfileRow> = self.rows(self.get("profiles").query(&params)).await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    async fn create_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        let row = NewNotificationRow {
            user_id: &notification.user_id,
            kind: &notification.kind,
            content: &notification.content,
            related_id: notification.related_id.as_deref(),
            read: notification.read,
        };
        self.send(self.post("notifications").json(&row)).await?;
        Ok(())
    }

    async fn notifications(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Notification>, GatewayError> {
        let request = self.get("notifications").query(&[
            ("select", "*".to_string()),
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.rows(request).await
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), GatewayError> {
        let request = self
            .patch("notifications")
            .query(&[("id", eq(notification_id))])
            .json(&serde_json::json!({ "read": true }));
        self.send(request).await?;
        Ok(())
    }
}
