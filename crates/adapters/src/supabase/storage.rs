//! Object storage for avatars and attachments

use async_trait::async_trait;
use connectum_domain::{ObjectStorage, StorageError};

use super::SupabaseGateway;

impl SupabaseGateway {
    /// Public URL of an object in a public bucket
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseGateway {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<String, StorageError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let size = bytes.len();

        let response = self
            .authorize(self.client.post(url))
            .header("Content-Type", content_type)
            .header("cache-control", "3600")
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload(format!("{} {}", status.as_u16(), body)));
        }

        tracing::info!(bucket, path, size, "Object uploaded");
        Ok(self.public_url(bucket, path))
    }
}
