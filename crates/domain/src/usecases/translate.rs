//! Translation with a bounded cache and labeled fallback

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::lock;
use crate::model::{TranslatedText, TranslationOrigin};
use crate::ports::{LocalStore, TranslateError, Translator};

/// Local store collection holding persisted cache entries
pub const TRANSLATIONS_COLLECTION: &str = "translations";

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Characters of source text that make up a cache key
const KEY_PREFIX_CHARS: usize = 100;

const SUPPORTED_LANGUAGES: [&str; 12] = [
    "EN", "DE", "FR", "ES", "IT", "PT", "RU", "JA", "ZH", "UK", "NL", "PL",
];

/// Target language for a locale such as `de-AT`, `EN` if unsupported
pub fn user_language(locale: &str) -> String {
    let primary = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    if SUPPORTED_LANGUAGES.contains(&primary.as_str()) {
        primary
    } else {
        "EN".to_string()
    }
}

/// Text shown when translation fails
pub fn placeholder(original: &str) -> String {
    format!("[Translation unavailable]: {}", original)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    text: String,
}

/// Insertion-ordered translation cache with oldest-first eviction
#[derive(Debug, Clone)]
pub struct TranslationCache {
    capacity: usize,
    entries: VecDeque<CacheEntry>,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// `{TARGET}:{first 100 chars of text}`
    pub fn key(text: &str, target_lang: &str) -> String {
        let prefix: String = text.chars().take(KEY_PREFIX_CHARS).collect();
        format!("{}:{}", target_lang.to_ascii_uppercase(), prefix)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.text.as_str())
    }

    /// Insert or overwrite; an overwrite keeps the entry's age
    pub fn insert(&mut self, key: String, text: String) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.text = text;
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(CacheEntry { key, text });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_records(&self) -> Vec<serde_json::Value> {
        self.entries
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect()
    }

    fn load_records(&mut self, records: Vec<serde_json::Value>) {
        for record in records {
            match serde_json::from_value::<CacheEntry>(record) {
                Ok(entry) => self.insert(entry.key, entry.text),
                Err(error) => tracing::warn!(error = %error, "Skipping malformed cache entry"),
            }
        }
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Translates through a [`Translator`], caching successes
pub struct TranslationService {
    translator: Arc<dyn Translator>,
    cache: Mutex<TranslationCache>,
    store: Option<Arc<dyn LocalStore>>,
}

impl TranslationService {
    pub fn new(translator: Arc<dyn Translator>, capacity: usize) -> Self {
        Self {
            translator,
            cache: Mutex::new(TranslationCache::new(capacity)),
            store: None,
        }
    }

    /// Persist the cache into `store` after every insert
    pub fn with_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Load previously persisted entries
    pub async fn restore(&self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.read_all(TRANSLATIONS_COLLECTION).await {
            Ok(records) => {
                let mut cache = lock(&self.cache);
                cache.load_records(records);
                tracing::debug!(entries = cache.len(), "Restored translation cache");
            }
            Err(error) => tracing::warn!(error = %error, "Failed to restore translation cache"),
        }
    }

    pub fn cached_entries(&self) -> usize {
        lock(&self.cache).len()
    }

    /// Translate `text` into `target_lang`
    ///
    /// Only empty input is an error. Upstream failures come back as a
    /// placeholder-labeled [`TranslatedText`] and are not cached.
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
    ) -> Result<TranslatedText, TranslateError> {
        if text.trim().is_empty() {
            return Err(TranslateError::EmptyText);
        }
        let target = target_lang.trim().to_ascii_uppercase();
        let key = TranslationCache::key(text, &target);

        let cached = lock(&self.cache).get(&key).map(String::from);
        if let Some(text) = cached {
            tracing::debug!(target_lang = %target, "Translation served from cache");
            return Ok(TranslatedText {
                text,
                target_lang: target,
                origin: TranslationOrigin::Cache,
            });
        }

        match self.translator.translate(text, &target).await {
            Ok(translated) => {
                lock(&self.cache).insert(key, translated.clone());
                self.persist().await;
                tracing::info!(target_lang = %target, "Translation complete");
                Ok(TranslatedText {
                    text: translated,
                    target_lang: target,
                    origin: TranslationOrigin::Upstream,
                })
            }
            Err(error) => {
                tracing::warn!(target_lang = %target, error = %error, "Translation failed");
                Ok(TranslatedText {
                    text: placeholder(text),
                    target_lang: target,
                    origin: TranslationOrigin::Placeholder,
                })
            }
        }
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let records = lock(&self.cache).to_records();
        if let Err(error) = store.write_all(TRANSLATIONS_COLLECTION, &records).await {
            tracing::warn!(error = %error, "Failed to persist translation cache");
        }
    }
}
