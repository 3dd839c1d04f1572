//! Credential-free translator

use async_trait::async_trait;
use connectum_domain::{TranslateError, Translator};

use super::normalize_target;

/// Returns the input wrapped in a clearly marked label
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyText);
        }
        Ok(format!(
            "[Mock Translation to {}]: {}",
            normalize_target(target_lang),
            text
        ))
    }
}
