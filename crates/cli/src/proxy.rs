//! Translation proxy HTTP server
//!
//! `POST /api/translate` forwards `{text, targetLang}` to DeepL, or answers
//! with a labelled mock translation when no DeepL key is configured.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use connectum_adapters::translate::{DeepLTranslator, MockTranslator, normalize_target};
use connectum_domain::{TranslateError, Translator};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{TranslationConfig, load_secret};

#[derive(Clone)]
struct ProxyState {
    translator: Arc<dyn Translator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    target_lang: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// DeepL when its key is present, the mock translator otherwise
pub fn upstream_translator(config: &TranslationConfig) -> Arc<dyn Translator> {
    match load_secret(&config.deepl_api_key_env) {
        Some(key) => Arc::new(DeepLTranslator::with_base_url(
            key,
            config.deepl_base_url.clone(),
        )),
        None => {
            tracing::warn!(
                env = %config.deepl_api_key_env,
                "DeepL API key missing, serving mock translations"
            );
            Arc::new(MockTranslator)
        }
    }
}

pub fn router(translator: Arc<dyn Translator>, timeout: Duration) -> Router {
    Router::new()
        .route(
            "/api/translate",
            post(translate).fallback(method_not_allowed),
        )
        .route("/health", get(health))
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ProxyState { translator })
}

fn error_body(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let body = match details {
        Some(details) => json!({ "error": error, "details": details }),
        None => json!({ "error": error }),
    };
    (status, Json(body)).into_response()
}

async fn translate(
    State(state): State<ProxyState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_body(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(rejection.body_text()),
            );
        }
    };

    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "Text is required", None);
    }
    let target = normalize_target(request.target_lang.as_deref().unwrap_or_default());
    tracing::info!(
        target_lang = %target,
        preview = %text.chars().take(30).collect::<String>(),
        "Translating"
    );

    match state.translator.translate(&text, &target).await {
        Ok(translated_text) => Json(TranslateResponse { translated_text }).into_response(),
        Err(TranslateError::EmptyText) => {
            error_body(StatusCode::BAD_REQUEST, "Text is required", None)
        }
        Err(TranslateError::Upstream { status, message }) => error_body(
            StatusCode::BAD_GATEWAY,
            "DeepL API error",
            Some(format!("{} {}", status, message)),
        ),
        Err(TranslateError::NoTranslation) => {
            error_body(StatusCode::BAD_GATEWAY, "No translation returned", None)
        }
        Err(TranslateError::Network(details)) => {
            tracing::error!(error = %details, "Translation failed");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Translation failed",
                Some(details),
            )
        }
    }
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
