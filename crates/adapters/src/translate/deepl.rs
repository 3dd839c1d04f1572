//! DeepL REST API adapter

use async_trait::async_trait;
use connectum_domain::{TranslateError, Translator};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::{DEFAULT_DEEPL_URL, normalize_target};
use crate::http_client;

/// Translator backed by `POST {base}/v2/translate`
pub struct DeepLTranslator {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLTranslator {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(api_key, DEFAULT_DEEPL_URL.to_string())
    }

    pub fn with_base_url(api_key: SecretString, base_url: String) -> Self {
        Self {
            client: http_client(Duration::from_secs(20)),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyText);
        }
        let target = normalize_target(target_lang);
        tracing::debug!(
            target_lang = %target,
            chars = text.chars().count(),
            "Requesting DeepL translation"
        );

        let response = self
            .client
            .post(format!("{}/v2/translate", self.base_url))
            .header(
                "Authorization",
                format!("DeepL-Auth-Key {}", self.api_key.expose_secret()),
            )
            .form(&[("text", text), ("target_lang", target.as_str())])
            .send()
            .await
            .map_err(|e| TranslateError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status, "DeepL returned an error");
            return Err(TranslateError::Upstream { status, message });
        }

        let body: DeepLResponse = response
            .json()
            .await
            .map_err(|e| TranslateError::Network(format!("Invalid response: {}", e)))?;

        body.translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or(TranslateError::NoTranslation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn translator(server: &MockServer) -> DeepLTranslator {
        DeepLTranslator::with_base_url(SecretString::from("deepl-key"), server.uri())
    }

    #[tokio::test]
    async fn test_translate_sends_form_and_reads_first_translation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key deepl-key"))
            .and(body_string_contains("target_lang=DE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": [{"detected_source_language": "EN", "text": "Hallo Welt"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = translator(&server).translate("Hello world", "de").await.unwrap();
        assert_eq!(out, "Hallo Welt");
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
            .mount(&server)
            .await;

        let err = translator(&server).translate("Hello", "DE").await.unwrap_err();
        assert_eq!(
            err,
            TranslateError::Upstream {
                status: 456,
                message: "Quota exceeded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_translation_list() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"translations": []})))
            .mount(&server)
            .await;

        let err = translator(&server).translate("Hello", "DE").await.unwrap_err();
        assert_eq!(err, TranslateError::NoTranslation);
    }
}
