//! Hosted backend adapters speaking the PostgREST dialect
//!
//! - `questions`: questions, replies and likes (Remote Data Gateway)
//! - `profiles`: profiles, leaderboard and notifications
//! - `storage`: public object buckets

mod profiles;
mod questions;
mod storage;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use connectum_domain::GatewayError;

use crate::http_client;

/// Default interval between change-feed snapshots
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Map a non-success status onto the gateway error taxonomy
pub(crate) fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let detail = format!("{} {}", status.as_u16(), body);
    match status.as_u16() {
        404 | 406 => GatewayError::NotFound(detail),
        409 => GatewayError::Conflict(detail),
        400 | 401 | 403 => GatewayError::Rejected(detail),
        _ => GatewayError::RemoteUnavailable(detail),
    }
}

/// REST client for the hosted backend
///
/// `api_key` is the project's public key. `access_token` is the signed-in
/// user's token; row-level security sees requests as anonymous without it.
#[derive(Clone)]
pub struct SupabaseGateway {
    client: Client,
    base_url: String,
    api_key: Arc<SecretString>,
    access_token: Option<Arc<SecretString>>,
    poll_interval: Duration,
}

impl SupabaseGateway {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: Arc::new(api_key),
            access_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_access_token(mut self, token: Option<SecretString>) -> Self {
        self.access_token = token.map(Arc::new);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token
            .as_ref()
            .unwrap_or(&self.api_key)
            .expose_secret()
            .to_string();
        request
            .header("apikey", self.api_key.expose_secret())
            .header("Authorization", format!("Bearer {}", bearer))
    }

    pub(crate) fn get(&self, table: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.table_url(table)))
    }

    pub(crate) fn post(&self, table: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
    }

    pub(crate) fn patch(&self, table: &str) -> RequestBuilder {
        self.authorize(self.client.patch(self.table_url(table)))
    }

    pub(crate) fn delete(&self, table: &str) -> RequestBuilder {
        self.authorize(self.client.delete(self.table_url(table)))
    }

    /// Send and fail on transport errors or non-success statuses
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::RemoteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = %status, body = %body, "Backend request failed");
            return Err(classify_status(status, &body));
        }

        Ok(response)
    }

    /// Send and decode a JSON array of rows
    pub(crate) async fn rows<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, GatewayError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::RemoteUnavailable(format!("Invalid response: {}", e)))
    }

    /// Send and take the first returned row
    pub(crate) async fn single<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, GatewayError> {
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(what.to_string()))
    }
}
