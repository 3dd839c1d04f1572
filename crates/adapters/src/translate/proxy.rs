//! Client for the translation proxy

use async_trait::async_trait;
use connectum_domain::{TranslateError, Translator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::normalize_target;
use crate::http_client;

/// Translator that forwards to `POST {base}/api/translate`
pub struct ProxyTranslator {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest<'a> {
    text: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    #[serde(default)]
    translated_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProxyErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

impl ProxyTranslator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for ProxyTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyText);
        }
        let target = normalize_target(target_lang);

        let response = self
            .client
            .post(format!("{}/api/translate", self.base_url))
            .json(&ProxyRequest {
                text,
                target_lang: &target,
            })
            .send()
            .await
            .map_err(|e| TranslateError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let raw = response.text().await.unwrap_or_default();
            let body: ProxyErrorBody = serde_json::from_str(&raw).unwrap_or_default();
            let message = match (body.error, body.details) {
                (Some(error), Some(details)) => format!("{}: {}", error, details),
                (Some(error), None) => error,
                _ => raw,
            };
            return Err(TranslateError::Upstream { status, message });
        }

        let body: ProxyResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Network(format!("Invalid response: {}", e)))?;

        body.translated_text
            .filter(|t| !t.is_empty())
            .ok_or(TranslateError::NoTranslation)
    }
}
