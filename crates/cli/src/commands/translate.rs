//! Translate command - translate text through the configured provider

use anyhow::{Context, Result};
use connectum_domain::usecases::{TranslationService, user_language};
use std::path::PathBuf;

use crate::app::{build_local_store, build_translator};
use crate::args::TranslateArgs;
use crate::config::AppConfig;

pub async fn execute(args: TranslateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let local = build_local_store(&config).await?;
    let translator = build_translator(&config.translation)?;
    let service = TranslationService::new(translator, config.translation.cache_capacity)
        .with_store(local);
    service.restore().await;

    let target = args
        .target
        .unwrap_or_else(|| user_language(&config.general.locale));

    let translated = service
        .translate(&args.text, &target)
        .await
        .context("Translation failed")?;

    tracing::debug!(origin = ?translated.origin, target = %translated.target_lang, "Translated");
    if translated.is_placeholder() {
        eprintln!("Translation service unavailable, showing the original text");
    }
    println!("{}", translated.text);
    Ok(())
}
