//! Wiring of adapters into the feed engine

use anyhow::{Context, Result, bail};
use connectum_adapters::store::{InMemoryLocalStore, SqliteLocalStore};
use connectum_adapters::translate::{DeepLTranslator, MockTranslator, ProxyTranslator};
use connectum_adapters::{InMemoryBackend, SupabaseGateway};
use connectum_domain::ledger::XpRewards;
use connectum_domain::usecases::{
    Feed, FeedConfig, ReconcilerConfig, TranslationService, XpLedger,
};
use connectum_domain::{
    Clock, LocalStore, Notice, NoticeKind, ObjectStorage, ProfileStore, RemoteGateway, Session,
    SystemClock, Translator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::{AppConfig, TranslationConfig, load_secret};

/// Ports resolved for one backend
pub struct Backend {
    pub gateway: Arc<dyn RemoteGateway>,
    pub profiles: Arc<dyn ProfileStore>,
    pub storage: Option<Arc<dyn ObjectStorage>>,
}

/// Everything a command needs, built from configuration
pub struct App {
    pub config: AppConfig,
    pub feed: Arc<Feed>,
    pub translations: Arc<TranslationService>,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub clock: Arc<dyn Clock>,
    notices: broadcast::Receiver<Notice>,
}

impl App {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let backend = build_backend(&config, Arc::clone(&clock))?;
        let local = build_local_store(&config).await?;

        let translator = build_translator(&config.translation)?;
        let translations = Arc::new(
            TranslationService::new(translator, config.translation.cache_capacity)
                .with_store(Arc::clone(&local)),
        );
        translations.restore().await;

        let notices = Feed::notice_channel();
        let ledger = Arc::new(XpLedger::new(
            backend.profiles,
            Arc::clone(&local),
            Arc::clone(&clock),
            notices.clone(),
        ));

        let feed_config = FeedConfig {
            rewards: XpRewards {
                question: config.gamification.question_xp,
                answer: config.gamification.answer_xp,
                best_answer: config.gamification.best_answer_xp,
            },
            degraded_notice_every: config.gamification.degraded_notice_every,
            default_language: config.general.default_language.clone(),
        };

        let receiver = notices.subscribe();
        let feed = Feed::new(
            backend.gateway,
            local,
            ledger,
            Arc::clone(&clock),
            notices,
            feed_config,
        )
        .with_session(session_from_config(&config))
        .with_translations(Arc::clone(&translations));

        tracing::debug!(
            backend = %config.backend.kind,
            local_store = %config.general.local_store,
            translation = %config.translation.provider,
            "Application wired"
        );

        Ok(Self {
            config,
            feed: Arc::new(feed),
            translations,
            storage: backend.storage,
            clock,
            notices: receiver,
        })
    }

    pub fn require_session(&self) -> Result<Session> {
        match self.feed.session() {
            Some(session) => Ok(session.clone()),
            None => bail!("No session configured. Set [session] user_id in the config file"),
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            base_backoff: Duration::from_secs(self.config.backend.reconnect_base_secs.max(1)),
            ..ReconcilerConfig::default()
        }
    }

    /// Print every notice emitted so far to stderr
    pub fn flush_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            print_notice(&notice);
        }
    }
}

pub fn print_notice(notice: &Notice) {
    let label = match notice.kind {
        NoticeKind::Success => "ok",
        NoticeKind::Error => "error",
        NoticeKind::Xp => "xp",
        NoticeKind::Degraded => "offline",
    };
    eprintln!("[{}] {}", label, notice.message);
}

pub fn session_from_config(config: &AppConfig) -> Option<Session> {
    let user_id = config.session.user_id.clone().filter(|id| !id.trim().is_empty())?;
    Some(Session {
        display_name: config
            .session
            .display_name
            .clone()
            .unwrap_or_else(|| user_id.clone()),
        avatar_url: config.session.avatar_url.clone(),
        user_id,
    })
}

pub fn build_backend(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Backend> {
    match config.backend.kind.as_str() {
        "memory" => {
            let backend = Arc::new(InMemoryBackend::with_demo_data(clock));
            Ok(Backend {
                gateway: backend.clone(),
                profiles: backend,
                storage: None,
            })
        }
        "supabase" => {
            let gateway = Arc::new(build_supabase(config)?);
            Ok(Backend {
                gateway: gateway.clone(),
                profiles: gateway.clone(),
                storage: Some(gateway),
            })
        }
        other => bail!("Unknown backend kind: {}", other),
    }
}

pub fn build_supabase(config: &AppConfig) -> Result<SupabaseGateway> {
    let backend = &config.backend;
    if backend.url.trim().is_empty() {
        bail!("backend.url is not set");
    }
    let api_key = load_secret(&backend.api_key_env).with_context(|| {
        format!(
            "Environment variable {} is not set (backend API key)",
            backend.api_key_env
        )
    })?;

    Ok(SupabaseGateway::new(&backend.url, api_key)
        .with_access_token(load_secret(&backend.access_token_env))
        .with_poll_interval(Duration::from_secs(backend.poll_interval_secs.max(1))))
}

pub async fn build_local_store(config: &AppConfig) -> Result<Arc<dyn LocalStore>> {
    match config.general.local_store.as_str() {
        "memory" => Ok(Arc::new(InMemoryLocalStore::new())),
        "sqlite" => {
            let store = SqliteLocalStore::new(&config.general.local_db_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to open local store at {}",
                        config.general.local_db_path.display()
                    )
                })?;
            Ok(Arc::new(store))
        }
        other => bail!("Unknown local store: {}", other),
    }
}

pub fn build_translator(config: &TranslationConfig) -> Result<Arc<dyn Translator>> {
    match config.provider.as_str() {
        "proxy" => Ok(Arc::new(ProxyTranslator::new(&config.proxy_url))),
        "deepl" => {
            let key = load_secret(&config.deepl_api_key_env).with_context(|| {
                format!(
                    "Environment variable {} is not set (DeepL API key)",
                    config.deepl_api_key_env
                )
            })?;
            Ok(Arc::new(DeepLTranslator::with_base_url(
                key,
                config.deepl_base_url.clone(),
            )))
        }
        "mock" => Ok(Arc::new(MockTranslator)),
        other => bail!("Unknown translation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.backend.kind = "memory".to_string();
        config.general.local_store = "memory".to_string();
        config.translation.provider = "mock".to_string();
        config
    }

    #[test]
    fn blank_user_id_means_anonymous() {
        let mut config = memory_config();
        config.session.user_id = Some("  ".to_string());
        assert!(session_from_config(&config).is_none());

        config.session.user_id = Some("u1".to_string());
        let session = session_from_config(&config).unwrap();
        assert_eq!(session.display_name, "u1");
    }

    #[test]
    fn supabase_requires_url() {
        let config = AppConfig::default();
        let err = build_supabase(&config).err().unwrap();
        assert!(err.to_string().contains("backend.url"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut config = TranslationConfig::default();
        config.provider = "babelfish".to_string();
        assert!(build_translator(&config).is_err());
    }

    #[tokio::test]
    async fn memory_app_loads_demo_feed() {
        let app = App::build(memory_config()).await.unwrap();
        app.feed.load().await.unwrap();
        assert_eq!(app.feed.snapshot().questions.len(), 3);
        assert!(app.storage.is_none());
    }
}
