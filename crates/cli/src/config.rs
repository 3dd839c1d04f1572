//! Configuration loading and management

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub gamification: GamificationConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// `sqlite` or `memory`
    #[serde(default = "default_local_store")]
    pub local_store: String,

    #[serde(default = "default_local_db_path")]
    pub local_db_path: PathBuf,

    /// Locale used to pick the default translation target
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Language stored on questions posted without one
    #[serde(default = "default_language")]
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `supabase` or `memory`
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    #[serde(default)]
    pub url: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_base_backoff")]
    pub reconnect_base_secs: u64,
}

/// Identity handed over by the external identity provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamificationConfig {
    #[serde(default = "default_question_xp")]
    pub question_xp: u32,

    #[serde(default = "default_answer_xp")]
    pub answer_xp: u32,

    #[serde(default = "default_best_answer_xp")]
    pub best_answer_xp: u32,

    #[serde(default = "default_degraded_notice_every")]
    pub degraded_notice_every: u32,

    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// `proxy`, `deepl` or `mock`
    #[serde(default = "default_translation_provider")]
    pub provider: String,

    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    #[serde(default = "default_deepl_api_key_env")]
    pub deepl_api_key_env: String,

    #[serde(default = "default_deepl_base_url")]
    pub deepl_base_url: String,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

// Default value functions
fn default_local_store() -> String {
    "sqlite".to_string()
}

fn default_local_db_path() -> PathBuf {
    PathBuf::from("./connectum.sqlite")
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_backend_kind() -> String {
    "supabase".to_string()
}

fn default_api_key_env() -> String {
    "SUPABASE_ANON_KEY".to_string()
}

fn default_access_token_env() -> String {
    "SUPABASE_ACCESS_TOKEN".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_base_backoff() -> u64 {
    5
}

fn default_question_xp() -> u32 {
    50
}

fn default_answer_xp() -> u32 {
    10
}

fn default_best_answer_xp() -> u32 {
    25
}

fn default_degraded_notice_every() -> u32 {
    3
}

fn default_leaderboard_limit() -> usize {
    10
}

fn default_translation_provider() -> String {
    "proxy".to_string()
}

fn default_proxy_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_deepl_api_key_env() -> String {
    "DEEPL_API_KEY".to_string()
}

fn default_deepl_base_url() -> String {
    connectum_adapters::translate::DEFAULT_DEEPL_URL.to_string()
}

fn default_cache_capacity() -> usize {
    connectum_domain::usecases::translate::DEFAULT_CACHE_CAPACITY
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            local_store: default_local_store(),
            local_db_path: default_local_db_path(),
            locale: default_locale(),
            default_language: default_language(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            url: String::new(),
            api_key_env: default_api_key_env(),
            access_token_env: default_access_token_env(),
            poll_interval_secs: default_poll_interval(),
            reconnect_base_secs: default_base_backoff(),
        }
    }
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self {
            question_xp: default_question_xp(),
            answer_xp: default_answer_xp(),
            best_answer_xp: default_best_answer_xp(),
            degraded_notice_every: default_degraded_notice_every(),
            leaderboard_limit: default_leaderboard_limit(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: default_translation_provider(),
            proxy_url: default_proxy_url(),
            deepl_api_key_env: default_deepl_api_key_env(),
            deepl_base_url: default_deepl_base_url(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Read a secret from the environment variable named `env_name`
///
/// Unset and empty variables both count as missing.
pub fn load_secret(env_name: &str) -> Option<SecretString> {
    if env_name.is_empty() {
        return None;
    }
    std::env::var(env_name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./connectum.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("CONNECTUM")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# connectum configuration

[general]
local_store = "sqlite"  # sqlite, memory
local_db_path = "./connectum.sqlite"
locale = "en-US"
default_language = "English"

[backend]
kind = "supabase"  # supabase, memory
url = "https://your-project.supabase.co"
api_key_env = "SUPABASE_ANON_KEY"
access_token_env = "SUPABASE_ACCESS_TOKEN"
poll_interval_secs = 5
reconnect_base_secs = 5

[session]
# user_id = "00000000-0000-0000-0000-000000000000"
# display_name = "Olena"
# avatar_url = "https://example.com/me.png"

[gamification]
question_xp = 50
answer_xp = 10
best_answer_xp = 25
degraded_notice_every = 3
leaderboard_limit = 10

[translation]
provider = "proxy"  # proxy, deepl, mock
proxy_url = "http://127.0.0.1:3001"
deepl_api_key_env = "DEEPL_API_KEY"
deepl_base_url = "https://api-free.deepl.com"
cache_capacity = 100

[server]
bind = "127.0.0.1:3001"
request_timeout_secs = 30
"#
        .to_string()
    }
}
