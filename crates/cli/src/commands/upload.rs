//! Upload-avatar command

use anyhow::{Context, Result, anyhow};
use connectum_domain::usecases::MediaService;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::UploadAvatarArgs;

pub async fn execute(args: UploadAvatarArgs, config_path: Option<PathBuf>) -> Result<()> {
    let app = super::open(config_path).await?;
    let session = app.require_session()?;
    let storage = app
        .storage
        .clone()
        .ok_or_else(|| anyhow!("Object storage needs the supabase backend"))?;

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("avatar");

    let media = MediaService::new(storage, Arc::clone(&app.clock));
    let url = media
        .upload_avatar(&session.user_id, file_name, bytes)
        .await
        .context("Avatar upload failed")?;

    println!("{}", url);
    Ok(())
}
