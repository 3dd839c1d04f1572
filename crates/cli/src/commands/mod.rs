//! Subcommand implementations

pub mod config;
pub mod doctor;
pub mod feed;
pub mod post;
pub mod profile;
pub mod react;
pub mod serve;
pub mod translate;
pub mod upload;

use anyhow::Result;
use std::path::PathBuf;

use crate::app::App;
use crate::config::AppConfig;

/// Load configuration and wire the application
pub(crate) async fn open(config_path: Option<PathBuf>) -> Result<App> {
    let config = AppConfig::load(config_path.as_deref())?;
    App::build(config).await
}
