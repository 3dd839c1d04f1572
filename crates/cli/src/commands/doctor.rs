//! Doctor command - validate configuration and show status

use anyhow::Result;
use connectum_domain::{SystemClock, usecases::feed::LOCAL_QUESTIONS};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::{build_backend, build_local_store, session_from_config};
use crate::args::DoctorArgs;
use crate::config::{AppConfig, load_secret};

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    backend: CheckResult,
    local_store: CheckResult,
    translation: CheckResult,
    session: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        backend: CheckResult::error("Not checked"),
        local_store: CheckResult::error("Not checked"),
        translation: CheckResult::error("Not checked"),
        session: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.backend = check_backend(config).await;
        report.local_store = check_local_store(config).await;
        report.translation = check_translation(config);
        report.session = check_session(config);
    }

    let checks = [
        &report.config,
        &report.backend,
        &report.local_store,
        &report.translation,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_backend(config: &AppConfig) -> CheckResult {
    let backend = match build_backend(config, Arc::new(SystemClock)) {
        Ok(backend) => backend,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    match backend.gateway.fetch_questions().await {
        Ok(questions) => CheckResult::ok(format!(
            "Backend: {}, {} questions reachable",
            config.backend.kind,
            questions.len()
        ))
        .with_details(serde_json::json!({
            "kind": config.backend.kind,
            "url": config.backend.url,
            "questions": questions.len(),
        })),
        Err(e) if e.is_unavailable() => CheckResult::warn(format!(
            "Backend: {} unreachable ({}), the local copy will be used",
            config.backend.kind, e
        )),
        Err(e) => CheckResult::error(format!(
            "Backend: {} rejected the request: {}",
            config.backend.kind, e
        )),
    }
}

async fn check_local_store(config: &AppConfig) -> CheckResult {
    let store = match build_local_store(config).await {
        Ok(store) => store,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    match store.read_all(LOCAL_QUESTIONS).await {
        Ok(records) => {
            let location = if config.general.local_store == "sqlite" {
                config.general.local_db_path.display().to_string()
            } else {
                "memory".to_string()
            };
            CheckResult::ok(format!(
                "Local store: {}, {} questions cached",
                location,
                records.len()
            ))
        }
        Err(e) => CheckResult::error(format!("Local store unreadable: {}", e)),
    }
}

fn check_translation(config: &AppConfig) -> CheckResult {
    let translation = &config.translation;
    match translation.provider.as_str() {
        "proxy" => {
            if translation.proxy_url.trim().is_empty() {
                CheckResult::error("Provider: proxy, proxy_url is empty")
            } else {
                CheckResult::ok(format!("Provider: proxy, url: {}", translation.proxy_url))
            }
        }
        "deepl" => match load_secret(&translation.deepl_api_key_env) {
            Some(_) => CheckResult::ok(format!(
                "Provider: deepl, API key: {} (set)",
                translation.deepl_api_key_env
            )),
            None => CheckResult::error(format!(
                "Provider: deepl, API key: {} (not set)",
                translation.deepl_api_key_env
            )),
        },
        "mock" => CheckResult::warn("Provider: mock (translations are labelled stand-ins)"),
        other => CheckResult::error(format!("Unknown translation provider: {}", other)),
    }
}

fn check_session(config: &AppConfig) -> CheckResult {
    match session_from_config(config) {
        Some(session) => CheckResult::ok(format!(
            "Signed in as {} ({})",
            session.display_name, session.user_id
        )),
        None => CheckResult::warn("Anonymous: liking, best answers and XP are disabled"),
    }
}

fn print_report(report: &DoctorReport) {
    println!("connectum Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Backend", &report.backend);
    print_check("Local Store", &report.local_store);
    print_check("Translation", &report.translation);
    print_check("Session", &report.session);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready! Try: connectum feed");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
