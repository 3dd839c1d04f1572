//! Avatar and attachment uploads

use std::path::Path;
use std::sync::Arc;

use crate::ports::{Clock, ObjectStorage, StorageError};

pub const AVATAR_BUCKET: &str = "avatars";
pub const ATTACHMENT_BUCKET: &str = "attachments";

/// Lowercased file extension, `bin` when there is none
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string())
}

/// `{userId}/avatar.{ext}`
pub fn avatar_path(user_id: &str, file_name: &str) -> String {
    format!("{}/avatar.{}", user_id, file_extension(file_name))
}

/// `{questionId}/{unix_millis}.{ext}`
pub fn attachment_path(question_id: &str, file_name: &str, unix_millis: i128) -> String {
    format!(
        "{}/{}.{}",
        question_id,
        unix_millis,
        file_extension(file_name)
    )
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Uploads files into the avatar and attachment buckets
pub struct MediaService {
    storage: Arc<dyn ObjectStorage>,
    clock: Arc<dyn Clock>,
}

impl MediaService {
    pub fn new(storage: Arc<dyn ObjectStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Replace the user's avatar and return its public URL
    pub async fn upload_avatar(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let path = avatar_path(user_id, file_name);
        let content_type = content_type_for(&file_extension(file_name));
        tracing::info!(
            bucket = AVATAR_BUCKET,
            path = %path,
            size = bytes.len(),
            "Uploading avatar"
        );
        self.storage
            .upload(AVATAR_BUCKET, &path, bytes, content_type, true)
            .await
    }

    /// Store an attachment for a question and return its public URL
    pub async fn upload_attachment(
        &self,
        question_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let millis = self.clock.now().unix_timestamp_nanos() / 1_000_000;
        let path = attachment_path(question_id, file_name, millis);
        let content_type = content_type_for(&file_extension(file_name));
        tracing::info!(
            bucket = ATTACHMENT_BUCKET,
            path = %path,
            size = bytes.len(),
            "Uploading attachment"
        );
        self.storage
            .upload(ATTACHMENT_BUCKET, &path, bytes, content_type, false)
            .await
    }
}
